//! Durable engine state.

use confirmations_net::StateStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::confirmation::ConfirmationInfo;
use crate::error::Result;
use crate::unblinded_tokens::UnblindedTokenInfo;

pub const STATE_KEY: &str = "confirmations.json";

/// Everything that must survive a restart: the retry queue, both token
/// pools and the next scheduled payout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationsState {
    #[serde(default)]
    pub failed_confirmations: Vec<ConfirmationInfo>,
    #[serde(default)]
    pub unblinded_tokens: Vec<UnblindedTokenInfo>,
    #[serde(default)]
    pub unblinded_payment_tokens: Vec<UnblindedTokenInfo>,
    #[serde(default)]
    pub next_token_redemption_at: Option<u64>,
}

impl ConfirmationsState {
    /// Loads persisted state. Absent or corrupt state resets to defaults so
    /// a bad blob can never wedge the client.
    pub async fn load(store: &dyn StateStore) -> Self {
        match store.load(STATE_KEY).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(state) => {
                    debug!("loaded persisted state");
                    state
                }
                Err(e) => {
                    warn!("persisted state is corrupt, resetting: {}", e);
                    Self::default()
                }
            },
            Ok(None) => {
                debug!("no persisted state, starting fresh");
                Self::default()
            }
            Err(e) => {
                warn!("failed to load persisted state, resetting: {}", e);
                Self::default()
            }
        }
    }

    pub async fn save(&self, store: &dyn StateStore) -> Result<()> {
        let json = serde_json::to_string(self)?;
        store.save(STATE_KEY, &json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confirmations_net::MemoryStateStore;

    #[tokio::test]
    async fn roundtrips_through_the_store() {
        let store = MemoryStateStore::new();
        let state = ConfirmationsState {
            next_token_redemption_at: Some(1_700_000_000),
            ..Default::default()
        };

        state.save(&store).await.unwrap();
        assert_eq!(ConfirmationsState::load(&store).await, state);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn corrupt_state_resets_to_defaults() {
        let store = MemoryStateStore::new();
        store.save(STATE_KEY, "{not json").await.unwrap();
        assert_eq!(
            ConfirmationsState::load(&store).await,
            ConfirmationsState::default()
        );
    }

    #[tokio::test]
    async fn absent_state_is_default() {
        let store = MemoryStateStore::new();
        assert_eq!(
            ConfirmationsState::load(&store).await,
            ConfirmationsState::default()
        );
    }
}
