//! Document-store abstraction.
//!
//! The evaluator only needs three operations against a document-oriented
//! store; the concrete technology lives behind this trait. An in-memory
//! implementation is provided for tests and single-process deployments.

use crate::{Result, SimevalError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Minimal document store contract.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document and return its generated id.
    async fn insert(&self, doc: Value) -> Result<String>;

    /// Merge the given top-level fields into the document with this id,
    /// as a single atomic update.
    async fn update_by_key(&self, key: &str, fields: Value) -> Result<()>;

    /// Fetch a document by id.
    async fn find_by_key(&self, key: &str) -> Result<Option<Value>>;
}

/// In-memory document store backed by a `HashMap`.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, doc: Value) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut docs =
            self.docs.write().map_err(|_| SimevalError::Store("store lock poisoned".into()))?;
        docs.insert(id.clone(), doc);
        Ok(id)
    }

    async fn update_by_key(&self, key: &str, fields: Value) -> Result<()> {
        let mut docs =
            self.docs.write().map_err(|_| SimevalError::Store("store lock poisoned".into()))?;
        let doc = docs
            .get_mut(key)
            .ok_or_else(|| SimevalError::Store(format!("no document with id {key}")))?;

        match (doc, fields) {
            (Value::Object(existing), Value::Object(updates)) => {
                for (k, v) in updates {
                    existing.insert(k, v);
                }
                Ok(())
            }
            _ => Err(SimevalError::Store("documents and updates must be JSON objects".into())),
        }
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Value>> {
        let docs =
            self.docs.read().map_err(|_| SimevalError::Store("store lock poisoned".into()))?;
        Ok(docs.get(key).cloned())
    }
}
