use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("failed to decode base64 value")]
    Base64,

    #[error("decoded value has wrong length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("point decompression failed")]
    PointDecompression,

    #[error("scalar is not in canonical form")]
    ScalarFormat,

    #[error("batch DLEQ proof verification failed")]
    ProofInvalid,

    #[error("mismatched batch lengths")]
    LengthMismatch,
}
