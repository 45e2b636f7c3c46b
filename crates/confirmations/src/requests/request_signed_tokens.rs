//! `POST /v1/confirmation/token/{payment_id}`
//!
//! Sends a batch of blinded tokens for signing. The response is a nonce the
//! client presents later to collect the signed batch.

use challenge_bypass::BlindedToken;
use confirmations_net::{UrlMethod, UrlRequest};
use serde::{Deserialize, Serialize};

use crate::error::{ConfirmationsError, Result};
use crate::wallet::WalletInfo;

#[derive(Serialize)]
struct RequestBody<'a> {
    #[serde(rename = "blindedTokens")]
    blinded_tokens: &'a [BlindedToken],
}

#[derive(Deserialize)]
struct ResponseBody {
    nonce: Option<String>,
}

pub fn build_request(
    base_url: &str,
    wallet: &WalletInfo,
    blinded_tokens: &[BlindedToken],
) -> Result<UrlRequest> {
    let body = serde_json::to_string(&RequestBody { blinded_tokens })?;
    let headers = wallet.sign_request_headers(&body)?;

    let url = format!("{}/v1/confirmation/token/{}", base_url, wallet.payment_id);
    let mut request = UrlRequest::new(UrlMethod::Post, url)
        .with_header("accept", "application/json")
        .with_json_body(body);
    request.headers.extend(headers);
    Ok(request)
}

pub fn parse_response(body: &str) -> Result<String> {
    let parsed: ResponseBody = serde_json::from_str(body)?;
    parsed
        .nonce
        .ok_or(ConfirmationsError::MissingField { field: "nonce" })
}
