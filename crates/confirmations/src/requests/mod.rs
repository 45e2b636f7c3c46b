//! Builders for every confirmations endpoint. Pure functions from protocol
//! data to [`UrlRequest`], plus the matching response parsers.

pub mod create_confirmation;
pub mod fetch_payment_token;
pub mod get_signed_tokens;
pub mod redeem_payment_tokens;
pub mod request_signed_tokens;
