/// Result alias that carries the custom [`LoopscapeError`] type.
pub type Result<T> = std::result::Result<T, LoopscapeError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LoopscapeError {
    /// Free-form message used by collaborators that have no better category.
    #[error("{0}")]
    Message(String),
    /// Invalid static configuration. Raised once at startup, never per frame.
    #[error("configuration error: {0}")]
    Config(String),
    /// A shape outline file could not be loaded.
    #[error("failed to load asset `{path}`: {reason}")]
    Asset { path: String, reason: String },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl LoopscapeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn asset(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Asset {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for LoopscapeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LoopscapeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
