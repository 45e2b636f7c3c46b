//! The engine: owns the token pools, the retry queue and the schedulers.
//!
//! All dependencies are injected, so two engines with different stores and
//! loaders can coexist in one process. Locks are never held across awaits;
//! every state mutation is followed by a persist.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use challenge_bypass::PublicKey;
use confirmations_net::{StateStore, UrlLoader};
use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::confirmation::{now_in_seconds, ConfirmationInfo, ConfirmationType};
use crate::error::{ConfirmationsError, Result};
use crate::redeem_unblinded_payment_tokens::{PayoutResult, RedeemUnblindedPaymentTokens};
use crate::redeem_unblinded_token::{RedeemOutcome, RedeemUnblindedToken};
use crate::refill_unblinded_tokens::{RefillResult, RefillUnblindedTokens};
use crate::retry_timer::RetryTimer;
use crate::state::ConfirmationsState;
use crate::timer::Timer;
use crate::unblinded_tokens::UnblindedTokens;
use crate::wallet::WalletInfo;

struct Inner {
    unblinded_tokens: UnblindedTokens,
    unblinded_payment_tokens: UnblindedTokens,
    failed_confirmations: VecDeque<ConfirmationInfo>,
    next_token_redemption_at: Option<u64>,
}

pub struct Confirmations {
    state_store: Arc<dyn StateStore>,
    config: Config,
    redeemer: RedeemUnblindedToken,
    refiller: RefillUnblindedTokens,
    payout: RedeemUnblindedPaymentTokens,
    inner: Mutex<Inner>,
    refill_retry_timer: RetryTimer,
    redeem_retry_timer: RetryTimer,
    failed_confirmations_timer: RetryTimer,
    payout_timer: Timer,
}

impl Confirmations {
    pub fn new(
        url_loader: Arc<dyn UrlLoader>,
        state_store: Arc<dyn StateStore>,
        base_url: &str,
        wallet: WalletInfo,
        issuer_public_key: PublicKey,
        config: Config,
    ) -> Self {
        Self {
            redeemer: RedeemUnblindedToken::new(url_loader.clone(), base_url, config.clone()),
            refiller: RefillUnblindedTokens::new(
                url_loader.clone(),
                base_url,
                wallet.clone(),
                issuer_public_key,
                config.clone(),
            ),
            payout: RedeemUnblindedPaymentTokens::new(url_loader, base_url, wallet),
            state_store,
            inner: Mutex::new(Inner {
                unblinded_tokens: UnblindedTokens::new(),
                unblinded_payment_tokens: UnblindedTokens::new(),
                failed_confirmations: VecDeque::new(),
                next_token_redemption_at: None,
            }),
            refill_retry_timer: RetryTimer::new(config.max_backoff_delay),
            redeem_retry_timer: RetryTimer::new(config.max_backoff_delay),
            failed_confirmations_timer: RetryTimer::new(config.max_backoff_delay),
            payout_timer: Timer::new(),
            config,
        }
    }

    /// Loads persisted state and schedules the first payout if none is
    /// pending.
    pub async fn initialize(&self) -> Result<()> {
        let state = ConfirmationsState::load(self.state_store.as_ref()).await;

        let needs_schedule = {
            let mut inner = self.inner.lock().unwrap();
            inner.unblinded_tokens.set_from_list(state.unblinded_tokens);
            inner
                .unblinded_payment_tokens
                .set_from_list(state.unblinded_payment_tokens);
            inner.failed_confirmations = state.failed_confirmations.into();
            inner.next_token_redemption_at = state.next_token_redemption_at;

            if inner.next_token_redemption_at.is_none() {
                inner.next_token_redemption_at =
                    Some(now_in_seconds() + self.config.token_redemption_period.as_secs());
                true
            } else {
                false
            }
        };

        if needs_schedule {
            self.save_state().await?;
        }
        info!(
            unblinded_tokens = self.unblinded_token_count(),
            payment_tokens = self.payment_token_count(),
            failed_confirmations = self.failed_confirmation_count(),
            "confirmations initialized"
        );
        Ok(())
    }

    /// Arms the background schedulers: the payout timer and, when work is
    /// already queued, refill and failed-confirmation processing.
    pub fn start(self: &Arc<Self>) {
        self.schedule_token_redemption();
        self.spawn_refill();
        if self.failed_confirmation_count() > 0 {
            self.schedule_failed_confirmation_retry();
        }
    }

    /// Confirms an ad event: spends one unblinded token, redeems the
    /// confirmation, and banks the granted payment token. The spent token is
    /// removed before any network traffic so it can never be double-spent.
    pub async fn confirm(
        self: &Arc<Self>,
        creative_instance_id: &str,
        kind: ConfirmationType,
    ) -> Result<RedeemOutcome> {
        let token_info = {
            let mut inner = self.inner.lock().unwrap();
            let token_info = inner
                .unblinded_tokens
                .get_token()
                .cloned()
                .ok_or(ConfirmationsError::EmptyStore)?;
            inner.unblinded_tokens.remove_token(&token_info);
            token_info
        };
        self.save_state().await?;
        self.spawn_refill();

        let confirmation = ConfirmationInfo::build(
            &mut OsRng,
            creative_instance_id,
            kind,
            token_info,
            &self.config,
        )?;
        debug!(id = %confirmation.id, %kind, "confirming ad event");

        let outcome = self.redeemer.redeem(confirmation).await;
        self.apply_outcome(&outcome);
        self.save_state().await?;
        Ok(outcome)
    }

    /// Retries the oldest failed confirmation, if any.
    pub async fn process_failed_confirmations(self: &Arc<Self>) -> Result<Option<RedeemOutcome>> {
        let confirmation = {
            let mut inner = self.inner.lock().unwrap();
            inner.failed_confirmations.pop_front()
        };
        let Some(confirmation) = confirmation else {
            return Ok(None);
        };
        self.save_state().await?;

        debug!(id = %confirmation.id, "retrying failed confirmation");
        let outcome = self.redeemer.redeem(confirmation).await;
        self.apply_outcome(&outcome);
        self.save_state().await?;
        Ok(Some(outcome))
    }

    /// Tops up the unblinded-token pool when it is below the minimum. Arms
    /// backoff retry on transient failure.
    pub async fn maybe_refill(self: &Arc<Self>) -> Result<RefillResult> {
        let count = self.unblinded_token_count();
        let result = self.refiller.refill(count).await;
        match &result {
            RefillResult::Refilled(tokens) => {
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.unblinded_tokens.add_tokens(tokens.clone());
                }
                self.save_state().await?;
                self.refill_retry_timer.stop();
            }
            RefillResult::Failed { should_retry: true } => {
                let this = self.clone();
                self.refill_retry_timer
                    .start_with_backoff(self.config.refill_retry_delay, async move {
                        if let Err(e) = this.maybe_refill_boxed().await {
                            warn!("refill retry failed: {}", e);
                        }
                    });
            }
            RefillResult::Failed {
                should_retry: false,
            } => self.refill_retry_timer.stop(),
            RefillResult::NotNeeded => {}
        }
        Ok(result)
    }

    /// Runs the payout if it is due. Returns `None` when not yet due.
    pub async fn maybe_redeem_payment_tokens(self: &Arc<Self>) -> Result<Option<PayoutResult>> {
        let due = {
            let inner = self.inner.lock().unwrap();
            inner
                .next_token_redemption_at
                .is_some_and(|at| at <= now_in_seconds())
        };
        if !due {
            return Ok(None);
        }

        let tokens = {
            let inner = self.inner.lock().unwrap();
            inner.unblinded_payment_tokens.as_list()
        };
        let result = self.payout.redeem(&tokens).await;

        match result {
            PayoutResult::Redeemed { .. } | PayoutResult::NothingToRedeem => {
                {
                    let mut inner = self.inner.lock().unwrap();
                    if matches!(result, PayoutResult::Redeemed { .. }) {
                        inner.unblinded_payment_tokens.remove_all_tokens();
                    }
                    inner.next_token_redemption_at =
                        Some(now_in_seconds() + self.config.token_redemption_period.as_secs());
                }
                self.save_state().await?;
                self.redeem_retry_timer.stop();
                self.schedule_token_redemption();
            }
            PayoutResult::Failed => {
                let this = self.clone();
                self.redeem_retry_timer
                    .start_with_backoff(self.config.redeem_retry_delay, async move {
                        if let Err(e) = this.maybe_redeem_payment_tokens_boxed().await {
                            warn!("payout retry failed: {}", e);
                        }
                    });
            }
        }
        Ok(Some(result))
    }

    pub fn unblinded_token_count(&self) -> usize {
        self.inner.lock().unwrap().unblinded_tokens.count()
    }

    pub fn payment_token_count(&self) -> usize {
        self.inner.lock().unwrap().unblinded_payment_tokens.count()
    }

    pub fn failed_confirmation_count(&self) -> usize {
        self.inner.lock().unwrap().failed_confirmations.len()
    }

    pub fn next_token_redemption_at(&self) -> Option<u64> {
        self.inner.lock().unwrap().next_token_redemption_at
    }

    fn apply_outcome(self: &Arc<Self>, outcome: &RedeemOutcome) {
        let queued_retry = {
            let mut inner = self.inner.lock().unwrap();
            match outcome {
                RedeemOutcome::Redeemed {
                    unblinded_payment_token,
                    ..
                } => {
                    inner
                        .unblinded_payment_tokens
                        .add_tokens([unblinded_payment_token.clone()]);
                    false
                }
                RedeemOutcome::Failed {
                    confirmation,
                    should_retry: true,
                } => {
                    debug!(id = %confirmation.id, "queueing confirmation for retry");
                    inner.failed_confirmations.push_back(confirmation.clone());
                    true
                }
                RedeemOutcome::Failed {
                    confirmation,
                    should_retry: false,
                } => {
                    warn!(id = %confirmation.id, "dropping unredeemable confirmation");
                    false
                }
                RedeemOutcome::Sent(_) => false,
            }
        };
        // When the retry task itself queued the failure, its timer is still
        // running and re-arms on return.
        if queued_retry && !self.failed_confirmations_timer.is_running() {
            self.schedule_failed_confirmation_retry();
        }
    }

    async fn save_state(&self) -> Result<()> {
        let state = {
            let inner = self.inner.lock().unwrap();
            ConfirmationsState {
                failed_confirmations: inner.failed_confirmations.iter().cloned().collect(),
                unblinded_tokens: inner.unblinded_tokens.as_list(),
                unblinded_payment_tokens: inner.unblinded_payment_tokens.as_list(),
                next_token_redemption_at: inner.next_token_redemption_at,
            }
        };
        state.save(self.state_store.as_ref()).await
    }

    fn spawn_refill(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.maybe_refill_boxed().await {
                warn!("refill failed: {}", e);
            }
        });
    }

    fn schedule_token_redemption(self: &Arc<Self>) {
        // A corrupt stored timestamp must not push the payout out further
        // than one redemption period.
        let delay = self
            .next_token_redemption_at()
            .map(|at| Duration::from_secs(at.saturating_sub(now_in_seconds())))
            .unwrap_or(self.config.token_redemption_period)
            .min(self.config.token_redemption_period);

        let this = self.clone();
        self.payout_timer.start(delay, async move {
            if let Err(e) = this.maybe_redeem_payment_tokens_boxed().await {
                warn!("scheduled payout failed: {}", e);
            }
        });
    }

    fn schedule_failed_confirmation_retry(self: &Arc<Self>) {
        let this = self.clone();
        self.failed_confirmations_timer.start_with_backoff(
            self.config.failed_confirmation_retry_delay,
            async move {
                match this.clone().process_failed_confirmations_boxed().await {
                    // Still failing: keep backing off.
                    Ok(Some(RedeemOutcome::Failed {
                        should_retry: true, ..
                    }))
                    | Err(_) => this.schedule_failed_confirmation_retry(),
                    Ok(Some(_)) => {
                        this.failed_confirmations_timer.stop();
                        if this.failed_confirmation_count() > 0 {
                            this.schedule_failed_confirmation_retry();
                        }
                    }
                    Ok(None) => this.failed_confirmations_timer.stop(),
                }
            },
        );
    }

    // Boxed indirection so retry tasks can re-enter these operations without
    // creating infinitely recursive future types.
    fn maybe_refill_boxed(
        self: Arc<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<RefillResult>> + Send>> {
        Box::pin(async move { (&self).maybe_refill().await })
    }

    fn maybe_redeem_payment_tokens_boxed(
        self: Arc<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<PayoutResult>>> + Send>> {
        Box::pin(async move { (&self).maybe_redeem_payment_tokens().await })
    }

    fn process_failed_confirmations_boxed(
        self: Arc<Self>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<RedeemOutcome>>> + Send>> {
        Box::pin(async move { (&self).process_failed_confirmations().await })
    }
}
