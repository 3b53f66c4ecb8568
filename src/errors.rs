use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Secret fetch failed for {path}: {source}")]
    SecretFetch {
        path: String,
        #[source]
        source: SecretError,
    },
    #[error("Unable to parse client config: {0}")]
    ConfigParse(String),
    #[error("Unable to decode token: {0}")]
    TokenDecode(String),
    #[error("Authorization code exchange failed: {0}")]
    WebExchange(String),
    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),
    #[error("Listing messages failed: {0}")]
    PageFetch(String),
    #[error("Fetching message {id} failed: {reason}")]
    MessageFetch { id: String, reason: String },
    #[error("Unable to archive messages: {0}")]
    BatchModify(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Failure modes of a secret-store lookup.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not found")]
    NotFound,
    #[error("malformed response: {0}")]
    Malformed(String),
}
