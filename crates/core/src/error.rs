/// Result alias that carries the custom [`ArDancerError`] type.
pub type Result<T> = std::result::Result<T, ArDancerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum ArDancerError {
    /// Free-form failure, mostly used for poisoned locks and joins.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A caller handed over data the subsystem cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The microphone could not be acquired or configured. Always fatal.
    #[error("audio device error: {0}")]
    AudioDevice(String),
    /// A character visual could not be produced. Always fatal.
    #[error("missing asset `{0}`")]
    MissingAsset(String),
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The session event queue has no consumer any more.
    #[error("session event queue is closed")]
    QueueClosed,
}

impl ArDancerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates an [`ArDancerError::AudioDevice`] from the provided message.
    pub fn audio<T: Into<String>>(msg: T) -> Self {
        Self::AudioDevice(msg.into())
    }

    /// Whether the error belongs to the unrecoverable class that must end
    /// the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AudioDevice(_) | Self::MissingAsset(_))
    }
}

impl From<&str> for ArDancerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ArDancerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
