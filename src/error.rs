/// Error types for the background core
use thiserror::Error;

/// Everything that can go wrong while talking to the browser or the store.
///
/// None of these are fatal: event handlers log them and carry on with the
/// next event.
#[derive(Error, Debug)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("rule engine error: {0}")]
    Rules(String),

    #[error("tabs error: {0}")]
    Tabs(String),

    #[error("notification error: {0}")]
    Notification(String),

    #[error("alarm error: {0}")]
    Alarm(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message not delivered after {attempts} attempts: {last}")]
    Messaging { attempts: u32, last: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
