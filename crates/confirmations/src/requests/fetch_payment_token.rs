//! `GET /v1/confirmation/{id}/paymentToken`

use challenge_bypass::{BatchDleqProof, PublicKey, SignedToken};
use confirmations_net::{UrlMethod, UrlRequest};
use serde::Deserialize;

use crate::error::{ConfirmationsError, Result};

#[derive(Deserialize)]
struct ResponseBody {
    id: Option<String>,
    #[serde(rename = "paymentToken")]
    payment_token: Option<PaymentTokenBody>,
}

#[derive(Deserialize)]
struct PaymentTokenBody {
    #[serde(rename = "publicKey")]
    public_key: Option<String>,
    #[serde(rename = "batchProof")]
    batch_proof: Option<String>,
    #[serde(rename = "signedTokens")]
    signed_tokens: Option<Vec<String>>,
}

/// The decoded payment-token grant for one confirmation.
#[derive(Debug)]
pub struct PaymentTokenResponse {
    pub id: String,
    pub public_key: PublicKey,
    pub batch_proof: BatchDleqProof,
    pub signed_tokens: Vec<SignedToken>,
}

pub fn build_request(base_url: &str, confirmation_id: &str) -> UrlRequest {
    let url = format!(
        "{}/v1/confirmation/{}/paymentToken",
        base_url, confirmation_id
    );
    UrlRequest::new(UrlMethod::Get, url).with_header("accept", "application/json")
}

/// Schema-validates the 200 body. Every absent field is reported by name;
/// malformed base64 surfaces as a crypto error.
pub fn parse_response(body: &str) -> Result<PaymentTokenResponse> {
    let parsed: ResponseBody = serde_json::from_str(body)?;

    let id = parsed
        .id
        .ok_or(ConfirmationsError::MissingField { field: "id" })?;
    let payment_token = parsed.payment_token.ok_or(ConfirmationsError::MissingField {
        field: "paymentToken",
    })?;
    let public_key = payment_token
        .public_key
        .ok_or(ConfirmationsError::MissingField {
            field: "paymentToken.publicKey",
        })?;
    let batch_proof = payment_token
        .batch_proof
        .ok_or(ConfirmationsError::MissingField {
            field: "paymentToken.batchProof",
        })?;
    let signed_tokens = payment_token
        .signed_tokens
        .ok_or(ConfirmationsError::MissingField {
            field: "paymentToken.signedTokens",
        })?;

    Ok(PaymentTokenResponse {
        id,
        public_key: PublicKey::decode_base64(&public_key)?,
        batch_proof: BatchDleqProof::decode_base64(&batch_proof)?,
        signed_tokens: signed_tokens
            .iter()
            .map(|t| SignedToken::decode_base64(t))
            .collect::<challenge_bypass::Result<_>>()?,
    })
}
