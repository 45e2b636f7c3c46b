use std::time::Duration;

pub const MIN_UNBLINDED_TOKENS: usize = 20;
pub const MAX_UNBLINDED_TOKENS: usize = 50;

#[derive(Clone, Debug)]
pub struct Config {
    pub build_channel: String,
    pub platform: String,
    pub min_unblinded_tokens: usize,
    pub max_unblinded_tokens: usize,
    pub refill_retry_delay: Duration,
    pub redeem_retry_delay: Duration,
    pub failed_confirmation_retry_delay: Duration,
    pub token_redemption_period: Duration,
    pub max_backoff_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            build_channel: "release".to_string(),
            platform: "windows".to_string(),
            min_unblinded_tokens: MIN_UNBLINDED_TOKENS,
            max_unblinded_tokens: MAX_UNBLINDED_TOKENS,
            refill_retry_delay: Duration::from_secs(15),
            redeem_retry_delay: Duration::from_secs(60),
            failed_confirmation_retry_delay: Duration::from_secs(5 * 60),
            token_redemption_period: Duration::from_secs(24 * 60 * 60),
            max_backoff_delay: Duration::from_secs(60 * 60),
        }
    }
}

impl Config {
    pub fn with_build_channel(mut self, channel: &str) -> Self {
        self.build_channel = channel.to_string();
        self
    }

    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        self
    }

    pub fn with_refill_retry_delay(mut self, delay: Duration) -> Self {
        self.refill_retry_delay = delay;
        self
    }

    pub fn with_redeem_retry_delay(mut self, delay: Duration) -> Self {
        self.redeem_retry_delay = delay;
        self
    }

    pub fn with_token_redemption_period(mut self, period: Duration) -> Self {
        self.token_redemption_period = period;
        self
    }

    pub fn with_max_backoff_delay(mut self, delay: Duration) -> Self {
        self.max_backoff_delay = delay;
        self
    }
}
