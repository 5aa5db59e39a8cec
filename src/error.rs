use thiserror::Error;

/// Failure taxonomy surfaced by the actor facade.
///
/// Only [`ActorError::AssetMissing`] and [`ActorError::Gpu`] abort actor
/// initialization. The remaining variants are reported to callers that want to
/// inspect them, but the actor has already logged them and fallen back to a
/// safe default by the time they are returned.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("{kind} '{id}' is not available")]
    AssetMissing { kind: AssetKind, id: String },
    #[error("scene node '{0}' not found")]
    NodeNotFound(String),
    #[error("animation '{id}' not found (available: {})", available.join(", "))]
    ClipNotFound { id: String, available: Vec<String> },
    #[error("unknown direction '{0}'")]
    UnknownDirection(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("GPU setup failed: {0}")]
    Gpu(String),
    #[error("actor state (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Model,
    Shader,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetKind::Model => f.write_str("model"),
            AssetKind::Shader => f.write_str("shader"),
        }
    }
}

impl ActorError {
    pub fn missing_model(id: impl Into<String>) -> Self {
        ActorError::AssetMissing { kind: AssetKind::Model, id: id.into() }
    }

    pub fn missing_shader(id: impl Into<String>) -> Self {
        ActorError::AssetMissing { kind: AssetKind::Shader, id: id.into() }
    }

    /// Converts GPU/setup plumbing errors, preserving `AssetMissing` when the
    /// chain carries one.
    pub fn from_setup(err: anyhow::Error) -> Self {
        match err.downcast::<ActorError>() {
            Ok(actor_err) => actor_err,
            Err(other) => ActorError::Gpu(format!("{other:#}")),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ActorError::AssetMissing { .. } | ActorError::Gpu(_))
    }
}

pub type ActorResult<T> = std::result::Result<T, ActorError>;
