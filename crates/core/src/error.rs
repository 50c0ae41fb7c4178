use std::path::PathBuf;

/// Result alias that carries the custom [`MorphError`] type.
pub type Result<T> = std::result::Result<T, MorphError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MorphError {
    /// Free-form error used where no more specific variant applies.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or export files that are not valid JSON.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A tessellated cube needs at least one grid cell per face edge.
    #[error("subdivisions must be at least 1, got {0}")]
    InvalidSubdivisions(u32),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Vertex sets that are not co-indexed, or edges pointing past them.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// The track could not be read or decoded.
    #[error("failed to load audio from `{path}`: {reason}")]
    AudioLoad { path: PathBuf, reason: String },
    #[error("unsupported audio format `{0}`")]
    UnsupportedFormat(String),
    /// The output device refused to start, dropped the stream or was poisoned.
    #[error("audio device error: {0}")]
    Device(String),
}

impl MorphError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn audio_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::AudioLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for MorphError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MorphError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
