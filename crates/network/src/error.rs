use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetError>;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(String),
}
