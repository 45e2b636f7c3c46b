//! `PUT /v1/confirmation/payment/{payment_id}`
//!
//! Cashes out the whole payment-token pool. Each token contributes a
//! credential: its preimage plus a verification-key signature over the
//! payload, alongside the issuer key it was signed under.

use confirmations_net::{UrlMethod, UrlRequest};
use serde::Serialize;

use crate::error::Result;
use crate::unblinded_tokens::UnblindedTokenInfo;
use crate::wallet::WalletInfo;

#[derive(Serialize)]
struct PayloadDto<'a> {
    #[serde(rename = "paymentId")]
    payment_id: &'a str,
}

#[derive(Serialize)]
struct CredentialDto {
    signature: String,
    t: String,
}

#[derive(Serialize)]
struct PaymentCredentialDto {
    credential: CredentialDto,
    #[serde(rename = "publicKey")]
    public_key: String,
}

#[derive(Serialize)]
struct RequestBody {
    payload: String,
    #[serde(rename = "paymentCredentials")]
    payment_credentials: Vec<PaymentCredentialDto>,
}

pub fn build_request(
    base_url: &str,
    wallet: &WalletInfo,
    tokens: &[UnblindedTokenInfo],
) -> Result<UrlRequest> {
    // The payload travels as a JSON string and every credential signs that
    // exact string.
    let payload = serde_json::to_string(&PayloadDto {
        payment_id: &wallet.payment_id,
    })?;

    let payment_credentials = tokens
        .iter()
        .map(|info| {
            let verification_key = info.unblinded_token.derive_verification_key();
            PaymentCredentialDto {
                credential: CredentialDto {
                    signature: verification_key.sign(payload.as_bytes()).encode_base64(),
                    t: info.unblinded_token.preimage().encode_base64(),
                },
                public_key: info.public_key.encode_base64(),
            }
        })
        .collect();

    let body = serde_json::to_string(&RequestBody {
        payload,
        payment_credentials,
    })?;
    let headers = wallet.sign_request_headers(&body)?;

    let url = format!(
        "{}/v1/confirmation/payment/{}",
        base_url, wallet.payment_id
    );
    let mut request = UrlRequest::new(UrlMethod::Put, url)
        .with_header("accept", "application/json")
        .with_json_body(body);
    request.headers.extend(headers);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use challenge_bypass::{SigningKey, Token};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn body_carries_one_credential_per_token() {
        let mut rng = StdRng::seed_from_u64(9);
        let key = SigningKey::random(&mut rng);
        let tokens: Vec<UnblindedTokenInfo> = (0..3)
            .map(|_| {
                let token = Token::random(&mut rng);
                let signed = key.sign(&token.blinded()).unwrap();
                UnblindedTokenInfo {
                    unblinded_token: token.unblind(&signed).unwrap(),
                    public_key: key.public_key(),
                }
            })
            .collect();
        let wallet = WalletInfo::new("wallet-id", &hex::encode([7u8; 32]));

        let request = build_request("https://example.com", &wallet, &tokens).unwrap();
        assert_eq!(request.method, UrlMethod::Put);
        assert_eq!(
            request.url,
            "https://example.com/v1/confirmation/payment/wallet-id"
        );

        let body: serde_json::Value =
            serde_json::from_str(request.content.as_deref().unwrap()).unwrap();
        assert_eq!(body["payload"], "{\"paymentId\":\"wallet-id\"}");
        let credentials = body["paymentCredentials"].as_array().unwrap();
        assert_eq!(credentials.len(), 3);
        for (credential, info) in credentials.iter().zip(&tokens) {
            assert_eq!(
                credential["publicKey"],
                key.public_key().encode_base64()
            );
            assert_eq!(
                credential["credential"]["t"],
                info.unblinded_token.preimage().encode_base64()
            );
        }
    }
}
