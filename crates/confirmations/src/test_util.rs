//! Shared fixtures for unit and integration tests.

use challenge_bypass::{BatchDleqProof, SigningKey, Token};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::Config;
use crate::confirmation::{ConfirmationInfo, ConfirmationType};
use crate::unblinded_tokens::UnblindedTokenInfo;
use crate::wallet::WalletInfo;

pub const CREATIVE_INSTANCE_ID: &str = "546fe7b0-5047-4f28-a11c-81f14edcf0f6";

pub fn test_config() -> Config {
    Config::default()
        .with_build_channel("test")
        .with_platform("test")
}

pub fn test_wallet() -> WalletInfo {
    WalletInfo::new("d4ed0b92-0b28-4ec9-bc4b-2cf84d0b9b44", &hex::encode([7u8; 32]))
}

/// The key that signs confirmation tokens in fixtures.
pub fn test_issuer_key() -> SigningKey {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    SigningKey::random(&mut rng)
}

pub fn test_token_info(rng: &mut StdRng) -> UnblindedTokenInfo {
    let issuer = test_issuer_key();
    let token = Token::random(rng);
    let signed = issuer.sign(&token.blinded()).unwrap();
    UnblindedTokenInfo {
        unblinded_token: token.unblind(&signed).unwrap(),
        public_key: issuer.public_key(),
    }
}

pub fn test_confirmation(config: &Config) -> ConfirmationInfo {
    let mut rng = StdRng::seed_from_u64(0xAD5);
    let token_info = test_token_info(&mut rng);
    ConfirmationInfo::build(
        &mut rng,
        CREATIVE_INSTANCE_ID,
        ConfirmationType::View,
        token_info,
        config,
    )
    .unwrap()
}

/// Builds a valid 200 body for the payment-token fetch: signs the
/// confirmation's blinded payment token with a fixed payment issuer key and
/// proves it.
pub fn payment_token_response_body(confirmation: &ConfirmationInfo) -> String {
    let mut rng = StdRng::seed_from_u64(0x9A4);
    let key = SigningKey::random(&mut rng);

    let blinded = vec![confirmation.blinded_payment_token.clone()];
    let signed = vec![key.sign(&blinded[0]).unwrap()];
    let proof = BatchDleqProof::new(&mut rng, &blinded, &signed, &key).unwrap();

    serde_json::json!({
        "id": confirmation.id,
        "paymentToken": {
            "publicKey": key.public_key().encode_base64(),
            "batchProof": proof.encode_base64(),
            "signedTokens": [signed[0].encode_base64()],
        }
    })
    .to_string()
}
