use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfirmationsError>;

/// Protocol-level failures. Whether a failure is worth retrying is decided
/// where the protocol state is known, not here.
#[derive(Error, Debug)]
pub enum ConfirmationsError {
    #[error("Network error: {0}")]
    Network(#[from] confirmations_net::NetError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] challenge_bypass::TokenError),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response is missing field: {field}")]
    MissingField { field: &'static str },

    #[error("Response id does not match the request")]
    IdMismatch,

    #[error("No unblinded tokens available")]
    EmptyStore,

    #[error("Invalid wallet: {0}")]
    Wallet(String),
}
