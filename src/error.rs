use std::time::Duration;

/// Failure talking to the mailbox. Callers degrade this to "no results".
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mailbox unavailable: {0}")]
    Unavailable(String),

    #[error("mailbox call timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure sending to the chat platform. Logged, never retried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("bot API rejected request: {0}")]
    Api(String),

    #[error("request timed out")]
    Timeout,
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeliveryError::Timeout
        } else {
            DeliveryError::Http(e.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
