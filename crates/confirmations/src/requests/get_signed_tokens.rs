//! `GET /v1/confirmation/token/{payment_id}?nonce={nonce}`

use challenge_bypass::{BatchDleqProof, PublicKey, SignedToken};
use confirmations_net::{UrlMethod, UrlRequest};
use serde::Deserialize;

use crate::error::{ConfirmationsError, Result};
use crate::wallet::WalletInfo;

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(rename = "batchProof")]
    batch_proof: Option<String>,
    #[serde(rename = "signedTokens")]
    signed_tokens: Option<Vec<String>>,
    #[serde(rename = "publicKey")]
    public_key: Option<String>,
}

#[derive(Debug)]
pub struct SignedTokensResponse {
    pub batch_proof: BatchDleqProof,
    pub signed_tokens: Vec<SignedToken>,
    pub public_key: PublicKey,
}

pub fn build_request(base_url: &str, wallet: &WalletInfo, nonce: &str) -> UrlRequest {
    let url = format!(
        "{}/v1/confirmation/token/{}?nonce={}",
        base_url, wallet.payment_id, nonce
    );
    UrlRequest::new(UrlMethod::Get, url).with_header("accept", "application/json")
}

pub fn parse_response(body: &str) -> Result<SignedTokensResponse> {
    let parsed: ResponseBody = serde_json::from_str(body)?;

    let batch_proof = parsed.batch_proof.ok_or(ConfirmationsError::MissingField {
        field: "batchProof",
    })?;
    let signed_tokens = parsed
        .signed_tokens
        .ok_or(ConfirmationsError::MissingField {
            field: "signedTokens",
        })?;
    let public_key = parsed.public_key.ok_or(ConfirmationsError::MissingField {
        field: "publicKey",
    })?;

    Ok(SignedTokensResponse {
        batch_proof: BatchDleqProof::decode_base64(&batch_proof)?,
        signed_tokens: signed_tokens
            .iter()
            .map(|t| SignedToken::decode_base64(t))
            .collect::<challenge_bypass::Result<_>>()?,
        public_key: PublicKey::decode_base64(&public_key)?,
    })
}
