//! Error taxonomy of the warehouse pipeline.
//!
//! Store internals work with `anyhow::Result`; every component boundary maps
//! failures into one of these variants so the run report can name the kind
//! of failure per relation.

use thiserror::Error;

pub type EtlResult<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Error)]
pub enum EtlError {
    /// Unknown relation or a live table whose shape does not match the registry.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Source unreadable or malformed.
    #[error("Load error on {relation}: {reason} ({rejected} rejected records)")]
    Load {
        relation: String,
        reason: String,
        rejected: usize,
    },

    /// A dimension builder could not process its input.
    #[error("Transform error on {relation}: {reason}; sample: [{}]", .sample.join(" | "))]
    Transform {
        relation: String,
        reason: String,
        sample: Vec<String>,
    },

    /// Fact construction received structurally invalid input.
    #[error("Join error: {0}")]
    Join(String),

    /// Destination write failed for a reason other than the expected conflict.
    #[error("Sink error on {relation}: {reason}")]
    Sink { relation: String, reason: String },

    /// A dimension key maps to conflicting attribute values.
    #[error("Integrity error on {relation}: key {key} has conflicting values {first} and {second}")]
    Integrity {
        relation: String,
        key: String,
        first: String,
        second: String,
    },
}

/// Maximum number of offending rows carried by a `Transform` error.
pub const SAMPLE_SIZE: usize = 5;

impl EtlError {
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Schema(_) => "SchemaError",
            EtlError::Load { .. } => "LoadError",
            EtlError::Transform { .. } => "TransformError",
            EtlError::Join(_) => "JoinError",
            EtlError::Sink { .. } => "SinkError",
            EtlError::Integrity { .. } => "IntegrityError",
        }
    }

    pub fn sink(relation: &str, err: anyhow::Error) -> Self {
        EtlError::Sink {
            relation: relation.to_string(),
            reason: format!("{:#}", err),
        }
    }

    pub fn schema(err: anyhow::Error) -> Self {
        EtlError::Schema(format!("{:#}", err))
    }

    pub fn transform<I, T>(relation: &str, reason: impl Into<String>, offending: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: std::fmt::Debug,
    {
        EtlError::Transform {
            relation: relation.to_string(),
            reason: reason.into(),
            sample: offending
                .into_iter()
                .take(SAMPLE_SIZE)
                .map(|row| format!("{:?}", row))
                .collect(),
        }
    }
}
