//! Raw event records to canonical activities: validators, the candidate-table
//! field mapper, the conversion engine and its diagnostics recorder.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod mapping;
pub mod validators;

use thiserror::Error;

pub use config::{EngineConfig, FieldWeights};
pub use diagnostics::{
    ConversionDiagnostics, DiagnosticsRecorder, EventTrace, ExtractionDiagnostics, ExtractionTrace,
};
pub use engine::{ConversionEngine, ConversionResult, EVENT_CONTAINER_KEYS};
pub use mapping::{CanonicalField, FieldMapper, FieldResolution, MappingTable, FIELD_RULES};
pub use validators::FieldFamily;

pub const CRATE_NAME: &str = "evnorm-convert";

/// Structural failures. Field-level problems are never reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("record has no event content (expected one of: {})", EVENT_CONTAINER_KEYS.join(", "))]
    NoEventContent,
    #[error("event container `{0}` holds no event objects")]
    EmptyEventList(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown canonical field `{0}`")]
    UnknownField(String),
}
