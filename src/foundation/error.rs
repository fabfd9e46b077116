/// Convenience result type used across cutframe.
pub type EditorResult<T> = Result<T, EditorError>;

/// Top-level error taxonomy used by engine APIs.
///
/// Timeline mutators never return these: an edit that would break an invariant is rejected by
/// returning `false` / `None`. Errors are reserved for IO, media and resource boundaries.
#[derive(thiserror::Error, Debug)]
pub enum EditorError {
    /// Invalid user-provided or project data.
    #[error("validation error: {0}")]
    Validation(String),

    /// A media element or image decode failed.
    #[error("media error: {0}")]
    Media(String),

    /// A seek did not complete before the configured timeout.
    #[error("seek timeout: clip '{clip}' at {target:.3}s")]
    SeekTimeout {
        /// Clip whose element was seeking.
        clip: String,
        /// Requested source time in seconds.
        target: f64,
    },

    /// A surface, bitmap or other render resource could not be created.
    #[error("resource error: {0}")]
    Resource(String),

    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EditorError {
    /// Build a [`EditorError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`EditorError::Media`] value.
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Build a [`EditorError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`EditorError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`EditorError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` for failures that callers should retry on a later pass instead of surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SeekTimeout { .. } | Self::Media(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
