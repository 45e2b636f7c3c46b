//! Periodic payout: cashes the payment-token pool in one PUT.

use std::sync::Arc;

use confirmations_net::UrlLoader;
use tracing::{info, warn};

use crate::requests::redeem_payment_tokens;
use crate::unblinded_tokens::UnblindedTokenInfo;
use crate::wallet::WalletInfo;

#[derive(Debug, PartialEq, Eq)]
pub enum PayoutResult {
    /// Nothing in the pool; the caller just reschedules.
    NothingToRedeem,
    /// The server accepted the batch; the redeemed tokens can be dropped.
    Redeemed { count: usize },
    /// Transient failure; the caller arms backoff retry.
    Failed,
}

pub struct RedeemUnblindedPaymentTokens {
    url_loader: Arc<dyn UrlLoader>,
    base_url: String,
    wallet: WalletInfo,
}

impl RedeemUnblindedPaymentTokens {
    pub fn new(url_loader: Arc<dyn UrlLoader>, base_url: &str, wallet: WalletInfo) -> Self {
        Self {
            url_loader,
            base_url: base_url.to_string(),
            wallet,
        }
    }

    pub async fn redeem(&self, tokens: &[UnblindedTokenInfo]) -> PayoutResult {
        if tokens.is_empty() {
            return PayoutResult::NothingToRedeem;
        }

        let request =
            match redeem_payment_tokens::build_request(&self.base_url, &self.wallet, tokens) {
                Ok(request) => request,
                Err(e) => {
                    warn!("failed to build payment redemption request: {}", e);
                    return PayoutResult::Failed;
                }
            };

        let response = match self.url_loader.load(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("redeem payment tokens failed: {}", e);
                return PayoutResult::Failed;
            }
        };

        match response.status_code {
            200 | 201 => {
                info!(count = tokens.len(), "payment tokens redeemed");
                PayoutResult::Redeemed {
                    count: tokens.len(),
                }
            }
            code => {
                warn!(code, "unexpected redeem payment tokens status");
                PayoutResult::Failed
            }
        }
    }
}
