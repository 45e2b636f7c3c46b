//! Confirmation data model.

use std::time::{SystemTime, UNIX_EPOCH};

use challenge_bypass::{BlindedToken, Token};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::requests::create_confirmation;
use crate::unblinded_tokens::UnblindedTokenInfo;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationType {
    View,
    Click,
    Dismiss,
    Landed,
    Flagged,
    Upvoted,
    Downvoted,
    Conversion,
}

impl std::fmt::Display for ConfirmationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfirmationType::View => "view",
            ConfirmationType::Click => "click",
            ConfirmationType::Dismiss => "dismiss",
            ConfirmationType::Landed => "landed",
            ConfirmationType::Flagged => "flagged",
            ConfirmationType::Upvoted => "upvoted",
            ConfirmationType::Downvoted => "downvoted",
            ConfirmationType::Conversion => "conversion",
        };
        f.write_str(s)
    }
}

/// Everything needed to redeem one ad event: the spent unblinded token, a
/// fresh payment token pair awaiting the server's signature, and the signed
/// credential that proves token ownership without identifying the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationInfo {
    pub id: String,
    pub creative_instance_id: String,
    #[serde(rename = "type")]
    pub kind: ConfirmationType,
    pub token_info: UnblindedTokenInfo,
    pub payment_token: Token,
    pub blinded_payment_token: BlindedToken,
    pub credential: String,
    pub created: bool,
    pub timestamp_in_seconds: u64,
}

impl ConfirmationInfo {
    /// Mints a confirmation: new id, fresh payment token pair, signed
    /// credential. `created` starts false and flips once the create request
    /// has been accepted by the server.
    pub fn build<R: RngCore + CryptoRng>(
        rng: &mut R,
        creative_instance_id: &str,
        kind: ConfirmationType,
        token_info: UnblindedTokenInfo,
        config: &Config,
    ) -> Result<Self> {
        let payment_token = Token::random(rng);
        let blinded_payment_token = payment_token.blinded();

        let mut confirmation = Self {
            id: Uuid::new_v4().to_string(),
            creative_instance_id: creative_instance_id.to_string(),
            kind,
            token_info,
            payment_token,
            blinded_payment_token,
            credential: String::new(),
            created: false,
            timestamp_in_seconds: now_in_seconds(),
        };
        confirmation.credential = create_confirmation::build_credential(&confirmation, config)?;
        Ok(confirmation)
    }
}

pub(crate) fn now_in_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
