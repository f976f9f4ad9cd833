use thiserror::Error;

#[derive(Error, Debug)]
pub enum JuggleError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

/// Rejected observations. The caller skips the frame for that hand and keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("identity must not be empty")]
    EmptyIdentity,

    #[error("non-finite position ({x}, {y}) for '{identity}'")]
    NonFinitePosition { identity: String, x: f64, y: f64 },

    #[error("no landmarks supplied for '{identity}'")]
    NoLandmarks { identity: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    ExitStatus { program: String, status: String },

    #[error("Action task failed: {details}")]
    Task { details: String },
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: timestamp {value} is not a usable number of seconds")]
    InvalidTimestamp { line: usize, value: f64 },

    #[error("line {line}: hand entry needs either x/y or landmarks")]
    MissingPosition { line: usize },

    #[error("line {line}: {source}")]
    Input {
        line: usize,
        #[source]
        source: InputError,
    },

    #[error("Feed read failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JuggleError>;
