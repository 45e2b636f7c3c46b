//! Blinded-token primitives over the Ristretto group.
//!
//! Implements the client and server sides of a Privacy Pass-style blind
//! signature scheme:
//!
//! 1. Client: generate a [`Token`], send its [`BlindedToken`] to the server
//! 2. Server: sign the blinded token with its [`SigningKey`], returning a
//!    [`SignedToken`] and a [`BatchDleqProof`] over the whole batch
//! 3. Client: [`BatchDleqProof::verify_and_unblind`] checks the proof against
//!    the server's [`PublicKey`] and yields redeemable [`UnblindedToken`]s
//! 4. Redemption: both sides derive the same [`VerificationKey`] from an
//!    unblinded token and MAC request payloads with it
//!
//! All types round-trip through padded standard base64 and serialize as
//! base64 strings.

pub mod dleq;
mod encoding;
pub mod error;
pub mod keys;
pub mod token;
pub mod verification;

pub use dleq::BatchDleqProof;
pub use error::TokenError;
pub use keys::{PublicKey, SigningKey};
pub use token::{BlindedToken, SignedToken, Token, TokenPreimage, UnblindedToken};
pub use verification::{VerificationKey, VerificationSignature};

pub type Result<T> = std::result::Result<T, TokenError>;
