//! Keeps the confirmation-token pool topped up.
//!
//! A refill is a two-step exchange: post a batch of blinded tokens, then
//! collect the signed batch with the nonce the server returned. The
//! in-progress batch and nonce survive across retries, so a failure between
//! the two steps resumes at the collect step instead of minting new tokens.

use std::sync::{Arc, Mutex};

use challenge_bypass::{BlindedToken, PublicKey, Token};
use confirmations_net::UrlLoader;
use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::requests::{get_signed_tokens, request_signed_tokens};
use crate::unblinded_tokens::UnblindedTokenInfo;
use crate::wallet::WalletInfo;

struct Attempt {
    tokens: Vec<Token>,
    blinded: Vec<BlindedToken>,
    nonce: Option<String>,
}

#[derive(Debug)]
pub enum RefillResult {
    /// The pool already holds at least the minimum.
    NotNeeded,
    /// Freshly signed tokens, ready for the pool.
    Refilled(Vec<UnblindedTokenInfo>),
    Failed {
        should_retry: bool,
    },
}

pub struct RefillUnblindedTokens {
    url_loader: Arc<dyn UrlLoader>,
    base_url: String,
    wallet: WalletInfo,
    issuer_public_key: PublicKey,
    config: Config,
    attempt: Mutex<Option<Attempt>>,
}

impl RefillUnblindedTokens {
    pub fn new(
        url_loader: Arc<dyn UrlLoader>,
        base_url: &str,
        wallet: WalletInfo,
        issuer_public_key: PublicKey,
        config: Config,
    ) -> Self {
        Self {
            url_loader,
            base_url: base_url.to_string(),
            wallet,
            issuer_public_key,
            config,
            attempt: Mutex::new(None),
        }
    }

    /// Runs one refill attempt if the pool is below the minimum. The caller
    /// owns retry scheduling; a `Failed { should_retry: true }` keeps the
    /// attempt state for resumption.
    pub async fn refill(&self, current_count: usize) -> RefillResult {
        if current_count >= self.config.min_unblinded_tokens {
            return RefillResult::NotNeeded;
        }

        let (blinded, nonce) = {
            let mut attempt = self.attempt.lock().unwrap();
            let attempt = attempt.get_or_insert_with(|| {
                let needed = self.config.max_unblinded_tokens - current_count;
                debug!(needed, "minting refill batch");
                let tokens: Vec<Token> =
                    (0..needed).map(|_| Token::random(&mut OsRng)).collect();
                let blinded = tokens.iter().map(Token::blinded).collect();
                Attempt {
                    tokens,
                    blinded,
                    nonce: None,
                }
            });
            (attempt.blinded.clone(), attempt.nonce.clone())
        };

        let nonce = match nonce {
            Some(nonce) => nonce,
            None => match self.request_signed_tokens(&blinded).await {
                Ok(nonce) => {
                    self.set_nonce(&nonce);
                    nonce
                }
                Err(retryable) => {
                    if !retryable {
                        *self.attempt.lock().unwrap() = None;
                    }
                    return RefillResult::Failed {
                        should_retry: retryable,
                    };
                }
            },
        };

        match self.collect_signed_tokens(&nonce).await {
            Ok(tokens) => {
                *self.attempt.lock().unwrap() = None;
                info!(count = tokens.len(), "token pool refilled");
                RefillResult::Refilled(tokens)
            }
            Err(retryable) => {
                if !retryable {
                    *self.attempt.lock().unwrap() = None;
                }
                RefillResult::Failed {
                    should_retry: retryable,
                }
            }
        }
    }

    fn set_nonce(&self, nonce: &str) {
        if let Some(attempt) = self.attempt.lock().unwrap().as_mut() {
            attempt.nonce = Some(nonce.to_string());
        }
    }

    // Err(true) = retryable, Err(false) = terminal for the attempt.
    async fn request_signed_tokens(
        &self,
        blinded: &[BlindedToken],
    ) -> std::result::Result<String, bool> {
        let request =
            request_signed_tokens::build_request(&self.base_url, &self.wallet, blinded).map_err(
                |e| {
                    warn!("failed to build signed-tokens request: {}", e);
                    true
                },
            )?;

        let response = self.url_loader.load(request).await.map_err(|e| {
            warn!("request signed tokens failed: {}", e);
            true
        })?;

        if response.status_code != 201 {
            warn!(
                code = response.status_code,
                "unexpected request signed tokens status"
            );
            return Err(true);
        }

        request_signed_tokens::parse_response(&response.body).map_err(|e| {
            warn!("malformed signed-tokens response: {}", e);
            true
        })
    }

    async fn collect_signed_tokens(
        &self,
        nonce: &str,
    ) -> std::result::Result<Vec<UnblindedTokenInfo>, bool> {
        let request = get_signed_tokens::build_request(&self.base_url, &self.wallet, nonce);
        let response = self.url_loader.load(request).await.map_err(|e| {
            warn!("get signed tokens failed: {}", e);
            true
        })?;

        if response.status_code != 200 {
            warn!(
                code = response.status_code,
                "unexpected get signed tokens status"
            );
            return Err(true);
        }

        let parsed = get_signed_tokens::parse_response(&response.body).map_err(|e| {
            warn!("malformed get signed tokens response: {}", e);
            true
        })?;

        // Tokens signed under an unknown issuer key can never be redeemed;
        // the whole batch is discarded.
        if parsed.public_key != self.issuer_public_key {
            warn!("issuer public key mismatch, discarding batch");
            return Err(false);
        }

        let attempt = self.attempt.lock().unwrap();
        let Some(attempt) = attempt.as_ref() else {
            return Err(true);
        };

        let unblinded = parsed
            .batch_proof
            .verify_and_unblind(
                &attempt.tokens,
                &attempt.blinded,
                &parsed.signed_tokens,
                &parsed.public_key,
            )
            .map_err(|e| {
                warn!("batch proof verification failed: {}", e);
                true
            })?;

        Ok(unblinded
            .into_iter()
            .map(|unblinded_token| UnblindedTokenInfo {
                unblinded_token,
                public_key: parsed.public_key.clone(),
            })
            .collect())
    }
}
