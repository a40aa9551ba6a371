//! Error types for the kinship-engine crate.

use thiserror::Error;

use kinship_core::GraphError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// An integrity or referential rejection.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Store error: {0}")]
    Store(#[from] kinship_graph::StoreError),

    #[error("Audit error: {0}")]
    Audit(#[from] kinship_audit::AuditError),

    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    #[error("Computation timeout: exceeded {max_seconds}s limit")]
    Timeout { max_seconds: u64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl EngineError {
    /// The graph rejection, when this error is one.
    pub fn as_graph(&self) -> Option<&GraphError> {
        match self {
            EngineError::Graph(e) => Some(e),
            _ => None,
        }
    }

    /// Stable machine-readable tag.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Graph(e) => e.code(),
            EngineError::Store(_) => "store_error",
            EngineError::Audit(_) => "audit_error",
            EngineError::Cancelled { .. } => "cancelled",
            EngineError::Timeout { .. } => "timeout",
            EngineError::Serialization(_) => "serialization_error",
            EngineError::Join(_) => "task_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
