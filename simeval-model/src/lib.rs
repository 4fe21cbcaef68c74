//! # simeval-model
//!
//! Concrete service clients behind the `simeval-core` traits: an
//! OpenAI-compatible completion client, an HTTP entity-extraction client,
//! and scripted doubles for tests.

pub mod extraction;
pub mod mock;
pub mod openai_compatible;

pub use extraction::{ExtractionClient, ExtractionConfig};
pub use mock::{FailingCompletionModel, MockCompletionModel, StaticEntityExtractor};
pub use openai_compatible::{CompletionConfig, OpenAiCompatibleClient};
