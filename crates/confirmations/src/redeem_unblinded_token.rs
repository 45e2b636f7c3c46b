//! The create-then-fetch redemption state machine for one confirmation.

use std::sync::Arc;

use confirmations_net::UrlLoader;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::confirmation::ConfirmationInfo;
use crate::error::ConfirmationsError;
use crate::requests::{create_confirmation, fetch_payment_token};
use crate::unblinded_tokens::UnblindedTokenInfo;

/// The single terminal result of a redeem attempt. Every call to
/// [`RedeemUnblindedToken::redeem`] resolves to exactly one of these.
#[derive(Debug)]
pub enum RedeemOutcome {
    /// The server answered the create with 418: the confirmation was
    /// delivered but no payment token will ever be granted for it.
    Sent(ConfirmationInfo),
    /// Redemption completed; the payment token is ready for the payout pool.
    Redeemed {
        confirmation: ConfirmationInfo,
        unblinded_payment_token: UnblindedTokenInfo,
    },
    /// Redemption failed. `should_retry` tells the caller whether to
    /// re-queue the confirmation or drop it.
    Failed {
        confirmation: ConfirmationInfo,
        should_retry: bool,
    },
}

pub struct RedeemUnblindedToken {
    url_loader: Arc<dyn UrlLoader>,
    base_url: String,
    config: Config,
}

impl RedeemUnblindedToken {
    pub fn new(url_loader: Arc<dyn UrlLoader>, base_url: &str, config: Config) -> Self {
        Self {
            url_loader,
            base_url: base_url.to_string(),
            config,
        }
    }

    pub async fn redeem(&self, mut confirmation: ConfirmationInfo) -> RedeemOutcome {
        if !confirmation.created {
            match self.create(&mut confirmation).await {
                CreateStep::Proceed => {}
                CreateStep::Sent => return RedeemOutcome::Sent(confirmation),
                CreateStep::Retry => {
                    return RedeemOutcome::Failed {
                        confirmation,
                        should_retry: true,
                    }
                }
            }
        }

        self.fetch_payment_token(confirmation).await
    }

    async fn create(&self, confirmation: &mut ConfirmationInfo) -> CreateStep {
        let request =
            match create_confirmation::build_request(&self.base_url, confirmation, &self.config) {
                Ok(request) => request,
                Err(e) => {
                    warn!(id = %confirmation.id, "failed to build create request: {}", e);
                    return CreateStep::Retry;
                }
            };

        let response = match self.url_loader.load(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(id = %confirmation.id, "create confirmation failed: {}", e);
                return CreateStep::Retry;
            }
        };

        match response.status_code {
            // I'm a teapot: the confirmation went through, but the server
            // will never grant a payment token for it.
            418 => {
                info!(id = %confirmation.id, "confirmation sent, no token granted");
                CreateStep::Sent
            }
            400 => {
                // The confirmation may already exist server-side; try the
                // fetch without trusting that the create succeeded.
                debug!(id = %confirmation.id, "create rejected with 400, fetching anyway");
                CreateStep::Proceed
            }
            code => {
                debug!(id = %confirmation.id, code, "confirmation created");
                confirmation.created = true;
                CreateStep::Proceed
            }
        }
    }

    async fn fetch_payment_token(&self, mut confirmation: ConfirmationInfo) -> RedeemOutcome {
        let request = fetch_payment_token::build_request(&self.base_url, &confirmation.id);
        let response = match self.url_loader.load(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(id = %confirmation.id, "fetch payment token failed: {}", e);
                return RedeemOutcome::Failed {
                    confirmation,
                    should_retry: true,
                };
            }
        };

        match response.status_code {
            200 => self.parse_payment_token(confirmation, &response.body),
            404 => {
                // The server has never seen this confirmation. If the
                // credential is sound, recreate it on the next attempt;
                // otherwise it can never succeed.
                if !create_confirmation::verify_credential(&confirmation) {
                    warn!(id = %confirmation.id, "credential failed local verification");
                    return RedeemOutcome::Failed {
                        confirmation,
                        should_retry: false,
                    };
                }
                debug!(id = %confirmation.id, "confirmation unknown to server, will recreate");
                confirmation.created = false;
                RedeemOutcome::Failed {
                    confirmation,
                    should_retry: true,
                }
            }
            400 => {
                warn!(id = %confirmation.id, "fetch payment token rejected");
                RedeemOutcome::Failed {
                    confirmation,
                    should_retry: false,
                }
            }
            202 => {
                debug!(id = %confirmation.id, "payment token not ready yet");
                RedeemOutcome::Failed {
                    confirmation,
                    should_retry: true,
                }
            }
            code => {
                warn!(id = %confirmation.id, code, "unexpected fetch payment token status");
                RedeemOutcome::Failed {
                    confirmation,
                    should_retry: true,
                }
            }
        }
    }

    fn parse_payment_token(&self, confirmation: ConfirmationInfo, body: &str) -> RedeemOutcome {
        let parsed = match fetch_payment_token::parse_response(body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(id = %confirmation.id, "malformed payment token response: {}", e);
                return RedeemOutcome::Failed {
                    confirmation,
                    should_retry: true,
                };
            }
        };

        if parsed.id != confirmation.id {
            warn!(
                id = %confirmation.id,
                response_id = %parsed.id,
                "{}",
                ConfirmationsError::IdMismatch
            );
            return RedeemOutcome::Failed {
                confirmation,
                should_retry: false,
            };
        }

        let unblinded = match parsed.batch_proof.verify_and_unblind(
            std::slice::from_ref(&confirmation.payment_token),
            std::slice::from_ref(&confirmation.blinded_payment_token),
            &parsed.signed_tokens,
            &parsed.public_key,
        ) {
            Ok(mut unblinded) if unblinded.len() == 1 => unblinded.remove(0),
            Ok(_) | Err(_) => {
                warn!(id = %confirmation.id, "payment token proof verification failed");
                return RedeemOutcome::Failed {
                    confirmation,
                    should_retry: true,
                };
            }
        };

        info!(id = %confirmation.id, "confirmation redeemed");
        RedeemOutcome::Redeemed {
            confirmation,
            unblinded_payment_token: UnblindedTokenInfo {
                unblinded_token: unblinded,
                public_key: parsed.public_key,
            },
        }
    }
}

enum CreateStep {
    Proceed,
    Sent,
    Retry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{payment_token_response_body, test_confirmation, test_config};
    use confirmations_net::{MockUrlLoader, UrlMethod};
    use rand::SeedableRng;

    fn machine(loader: MockUrlLoader) -> RedeemUnblindedToken {
        RedeemUnblindedToken::new(Arc::new(loader), "https://example.com", test_config())
    }

    #[tokio::test]
    async fn create_then_fetch_redeems_the_confirmation() {
        let config = test_config();
        let confirmation = test_confirmation(&config);
        let body = payment_token_response_body(&confirmation);

        let loader = MockUrlLoader::new()
            .on(
                UrlMethod::Post,
                &format!("/v1/confirmation/{}/", confirmation.id),
                201,
                "{}",
            )
            .on(UrlMethod::Get, "/paymentToken", 200, &body);
        let machine = machine(loader);

        match machine.redeem(confirmation).await {
            RedeemOutcome::Redeemed { confirmation, .. } => assert!(confirmation.created),
            outcome => panic!("expected Redeemed, got {:?}", outcome),
        }
    }

    #[tokio::test]
    async fn teapot_short_circuits_without_fetching() {
        let config = test_config();
        let confirmation = test_confirmation(&config);

        let loader = Arc::new(MockUrlLoader::new().on(
            UrlMethod::Post,
            "/v1/confirmation/",
            418,
            "",
        ));
        let machine =
            RedeemUnblindedToken::new(loader.clone(), "https://example.com", config);

        let outcome = machine.redeem(confirmation).await;
        assert!(matches!(outcome, RedeemOutcome::Sent(_)));

        let requests = loader.requests();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].url.contains("paymentToken"));
    }

    #[tokio::test]
    async fn create_400_still_fetches_but_does_not_mark_created() {
        let config = test_config();
        let confirmation = test_confirmation(&config);

        let loader = MockUrlLoader::new()
            .on(UrlMethod::Post, "/v1/confirmation/", 400, "")
            .on(UrlMethod::Get, "/paymentToken", 202, "");
        let machine = machine(loader);

        match machine.redeem(confirmation).await {
            RedeemOutcome::Failed {
                confirmation,
                should_retry,
            } => {
                assert!(should_retry);
                assert!(!confirmation.created);
            }
            outcome => panic!("expected Failed, got {:?}", outcome),
        }
    }

    #[tokio::test]
    async fn fetch_404_with_valid_credential_retries_and_recreates() {
        let config = test_config();
        let mut confirmation = test_confirmation(&config);
        confirmation.created = true;

        let loader = MockUrlLoader::new().on(UrlMethod::Get, "/paymentToken", 404, "");
        let machine = machine(loader);

        match machine.redeem(confirmation).await {
            RedeemOutcome::Failed {
                confirmation,
                should_retry,
            } => {
                assert!(should_retry);
                assert!(!confirmation.created);
            }
            outcome => panic!("expected Failed, got {:?}", outcome),
        }
    }

    #[tokio::test]
    async fn fetch_404_with_bad_credential_is_terminal() {
        let config = test_config();
        let mut confirmation = test_confirmation(&config);
        confirmation.created = true;
        confirmation.credential = "bm90IGEgY3JlZGVudGlhbA==".to_string();

        let loader = MockUrlLoader::new().on(UrlMethod::Get, "/paymentToken", 404, "");
        let machine = machine(loader);

        match machine.redeem(confirmation).await {
            RedeemOutcome::Failed { should_retry, .. } => assert!(!should_retry),
            outcome => panic!("expected Failed, got {:?}", outcome),
        }
    }

    #[tokio::test]
    async fn fetch_400_is_terminal() {
        let config = test_config();
        let mut confirmation = test_confirmation(&config);
        confirmation.created = true;

        let loader = MockUrlLoader::new().on(UrlMethod::Get, "/paymentToken", 400, "");
        let machine = machine(loader);

        match machine.redeem(confirmation).await {
            RedeemOutcome::Failed { should_retry, .. } => assert!(!should_retry),
            outcome => panic!("expected Failed, got {:?}", outcome),
        }
    }

    #[tokio::test]
    async fn fetch_500_is_retryable() {
        let config = test_config();
        let mut confirmation = test_confirmation(&config);
        confirmation.created = true;

        let loader = MockUrlLoader::new().on(UrlMethod::Get, "/paymentToken", 500, "");
        let machine = machine(loader);

        match machine.redeem(confirmation).await {
            RedeemOutcome::Failed { should_retry, .. } => assert!(should_retry),
            outcome => panic!("expected Failed, got {:?}", outcome),
        }
    }

    #[tokio::test]
    async fn malformed_200_body_is_retryable() {
        let config = test_config();
        let mut confirmation = test_confirmation(&config);
        confirmation.created = true;

        for body in ["not json", "{}", r#"{"id":"x"}"#] {
            let loader = MockUrlLoader::new().on(UrlMethod::Get, "/paymentToken", 200, body);
            let machine = RedeemUnblindedToken::new(
                Arc::new(loader),
                "https://example.com",
                test_config(),
            );
            match machine.redeem(confirmation.clone()).await {
                RedeemOutcome::Failed { should_retry, .. } => assert!(should_retry),
                outcome => panic!("expected Failed for {:?}, got {:?}", body, outcome),
            }
        }
    }

    #[tokio::test]
    async fn wrong_signed_token_count_is_retryable() {
        let config = test_config();
        let mut confirmation = test_confirmation(&config);
        confirmation.created = true;

        let valid: serde_json::Value =
            serde_json::from_str(&payment_token_response_body(&confirmation)).unwrap();
        let signed = valid["paymentToken"]["signedTokens"][0].clone();

        for tokens in [
            serde_json::json!([]),
            serde_json::json!([signed.clone(), signed.clone()]),
        ] {
            let mut value = valid.clone();
            value["paymentToken"]["signedTokens"] = tokens.clone();
            let body = value.to_string();

            let loader = MockUrlLoader::new().on(UrlMethod::Get, "/paymentToken", 200, &body);
            let machine = RedeemUnblindedToken::new(
                Arc::new(loader),
                "https://example.com",
                test_config(),
            );
            match machine.redeem(confirmation.clone()).await {
                RedeemOutcome::Failed { should_retry, .. } => assert!(should_retry),
                outcome => panic!("expected Failed for {}, got {:?}", tokens, outcome),
            }
        }
    }

    #[tokio::test]
    async fn response_id_mismatch_is_terminal() {
        let config = test_config();
        let mut confirmation = test_confirmation(&config);
        confirmation.created = true;

        let mut other = confirmation.clone();
        other.id = "00000000-0000-0000-0000-000000000000".to_string();
        let body = payment_token_response_body(&other);

        let loader = MockUrlLoader::new().on(UrlMethod::Get, "/paymentToken", 200, &body);
        let machine = machine(loader);

        match machine.redeem(confirmation).await {
            RedeemOutcome::Failed { should_retry, .. } => assert!(!should_retry),
            outcome => panic!("expected Failed, got {:?}", outcome),
        }
    }

    #[tokio::test]
    async fn invalid_proof_is_retryable() {
        let config = test_config();
        let mut confirmation = test_confirmation(&config);
        confirmation.created = true;

        // Swap the public key for a fresh one so the proof cannot verify.
        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        let other = challenge_bypass::SigningKey::random(&mut rng);
        let mut value: serde_json::Value =
            serde_json::from_str(&payment_token_response_body(&confirmation)).unwrap();
        value["paymentToken"]["publicKey"] =
            serde_json::Value::String(other.public_key().encode_base64());
        let body = value.to_string();

        let loader = MockUrlLoader::new().on(UrlMethod::Get, "/paymentToken", 200, &body);
        let machine = machine(loader);

        match machine.redeem(confirmation).await {
            RedeemOutcome::Failed { should_retry, .. } => assert!(should_retry),
            outcome => panic!("expected Failed, got {:?}", outcome),
        }
    }
}
