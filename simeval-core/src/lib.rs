//! # simeval-core
//!
//! Core data model, error taxonomy and collaborator traits for the simeval
//! protocol-adherence evaluator.
//!
//! The evaluation pipeline itself lives in `simeval-eval`; concrete
//! external-service clients live in `simeval-model`. This crate defines what
//! they all share: the canonical [`Turn`]/[`Protocol`] model, the
//! [`SimevalError`] taxonomy, and the traits behind which the completion
//! service, the entity-extraction service, the document store and the
//! upstream transcript tooling sit.

pub mod error;
pub mod model;
pub mod store;
pub mod transcript;
pub mod types;

pub use error::{Result, SimevalError};
pub use model::{CompletionModel, EntityExtractor, ExtractedEntity};
pub use store::{DocumentStore, InMemoryDocumentStore};
pub use transcript::{ConversationFormatter, EventTranscriptFormatter, ProtocolBuilder};
pub use types::{
    Context, ContextEntry, ExpectedFunction, FunctionCall, Protocol, ProtocolStep, Turn,
};
