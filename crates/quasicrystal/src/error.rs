//! Error type shared by configuration and session control.

use thiserror::Error;

/// Errors surfaced synchronously by `configure`/`start`.
///
/// Sampling itself is infallible: projection and acceptance are total
/// functions over finite inputs, so nothing inside the worker loop reports
/// an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("invalid generation params: {reason}")]
    InvalidConfig { reason: String },
    #[error("unknown structure `{name}`")]
    UnknownStructure { name: String },
    #[error("generator has no params; call configure first")]
    NotConfigured,
    #[error("cannot allocate a point buffer for {requested} points")]
    ResourceExhausted { requested: usize },
    #[error("failed to spawn worker thread: {reason}")]
    WorkerSpawn { reason: String },
}

impl GenerationError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
