//! `POST /v1/confirmation/{id}/{credential}`
//!
//! The credential in the URL is a base64 envelope binding the request body
//! to an unblinded token the server signed. The server can rederive the same
//! verification key from the revealed preimage and check the MAC without
//! learning which signing session produced the token.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use challenge_bypass::{BlindedToken, TokenPreimage, VerificationSignature};
use confirmations_net::{UrlMethod, UrlRequest};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::confirmation::{ConfirmationInfo, ConfirmationType};
use crate::error::Result;

// Field order is the canonical (alphabetical) key order of the signed
// payload. The credential signature covers this exact string.
#[derive(Serialize, Deserialize)]
struct PayloadDto {
    #[serde(rename = "blindedPaymentToken")]
    blinded_payment_token: BlindedToken,
    #[serde(rename = "buildChannel")]
    build_channel: String,
    #[serde(rename = "creativeInstanceId")]
    creative_instance_id: String,
    payload: serde_json::Map<String, serde_json::Value>,
    platform: String,
    #[serde(rename = "type")]
    kind: ConfirmationType,
}

#[derive(Serialize, Deserialize)]
struct CredentialEnvelope {
    payload: String,
    signature: String,
    t: String,
}

pub fn build_payload_json(confirmation: &ConfirmationInfo, config: &Config) -> Result<String> {
    let dto = PayloadDto {
        blinded_payment_token: confirmation.blinded_payment_token.clone(),
        build_channel: config.build_channel.clone(),
        creative_instance_id: confirmation.creative_instance_id.clone(),
        payload: serde_json::Map::new(),
        platform: config.platform.clone(),
        kind: confirmation.kind,
    };
    Ok(serde_json::to_string(&dto)?)
}

/// Signs the payload with the token's verification key and wraps it in the
/// base64 envelope `{"payload", "signature", "t"}`.
pub fn build_credential(confirmation: &ConfirmationInfo, config: &Config) -> Result<String> {
    let payload = build_payload_json(confirmation, config)?;

    let verification_key = confirmation
        .token_info
        .unblinded_token
        .derive_verification_key();
    let signature = verification_key.sign(payload.as_bytes());

    let envelope = CredentialEnvelope {
        payload,
        signature: signature.encode_base64(),
        t: confirmation
            .token_info
            .unblinded_token
            .preimage()
            .encode_base64(),
    };
    Ok(BASE64.encode(serde_json::to_string(&envelope)?))
}

/// Re-checks the stored credential locally: the envelope must carry this
/// confirmation's preimage and a signature its verification key accepts.
pub fn verify_credential(confirmation: &ConfirmationInfo) -> bool {
    let Ok(envelope_json) = BASE64.decode(&confirmation.credential) else {
        return false;
    };
    let Ok(envelope) = serde_json::from_slice::<CredentialEnvelope>(&envelope_json) else {
        return false;
    };
    let Ok(signature) = VerificationSignature::decode_base64(&envelope.signature) else {
        return false;
    };
    let Ok(preimage) = TokenPreimage::decode_base64(&envelope.t) else {
        return false;
    };

    let unblinded_token = &confirmation.token_info.unblinded_token;
    if preimage != *unblinded_token.preimage() {
        return false;
    }
    unblinded_token
        .derive_verification_key()
        .verify(&signature, envelope.payload.as_bytes())
}

pub fn build_request(
    base_url: &str,
    confirmation: &ConfirmationInfo,
    config: &Config,
) -> Result<UrlRequest> {
    let url = format!(
        "{}/v1/confirmation/{}/{}",
        base_url, confirmation.id, confirmation.credential
    );
    Ok(UrlRequest::new(UrlMethod::Post, url)
        .with_header("accept", "application/json")
        .with_json_body(build_payload_json(confirmation, config)?))
}
