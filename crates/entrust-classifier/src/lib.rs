//! entrust-classifier: Case-to-EPA classifier backends.
//!
//! Implements the `CaseClassifier` trait for OpenAI-compatible APIs and an
//! offline keyword table, plus the configuration that selects between them.

pub mod config;
pub mod mock;
pub mod openai;

pub use config::{create_classifier, load_config, load_config_from, ClassifierConfig, EntrustConfig};
pub use entrust_core::error::ClassifierError;
pub use mock::MockClassifier;
pub use openai::OpenAiClassifier;
