//! Anonymous ad-confirmation redemption.
//!
//! An engine that spends blinded confirmation tokens to report ad events
//! without linking them to a wallet, collects blinded payment tokens in
//! return, and periodically cashes those out. All network and disk access
//! goes through injected seams, so the whole protocol runs against mocks in
//! tests.

pub mod config;
pub mod confirmation;
pub mod confirmations;
pub mod error;
pub mod redeem_unblinded_payment_tokens;
pub mod redeem_unblinded_token;
pub mod refill_unblinded_tokens;
pub mod requests;
pub mod retry_timer;
pub mod state;
pub mod timer;
pub mod unblinded_tokens;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_util;

pub use config::Config;
pub use confirmation::{ConfirmationInfo, ConfirmationType};
pub use confirmations::Confirmations;
pub use error::{ConfirmationsError, Result};
pub use redeem_unblinded_payment_tokens::PayoutResult;
pub use redeem_unblinded_token::RedeemOutcome;
pub use refill_unblinded_tokens::RefillResult;
pub use retry_timer::RetryTimer;
pub use state::ConfirmationsState;
pub use timer::Timer;
pub use unblinded_tokens::{UnblindedTokenInfo, UnblindedTokens};
pub use wallet::WalletInfo;
