use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database call timed out")]
    Timeout,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request timed out")]
    Timeout,
    #[error("completion request failed: {0}")]
    Http(reqwest::Error),
    #[error("completion API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("completion API returned no text")]
    EmptyReply,
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(e)
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),
}
