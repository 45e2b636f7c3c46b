//! The in-memory pool of spendable unblinded tokens.

use challenge_bypass::{PublicKey, UnblindedToken};
use serde::{Deserialize, Serialize};

/// An unblinded token together with the issuer key that signed it. The key
/// travels with the token because payouts must name the key each token was
/// signed under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnblindedTokenInfo {
    pub unblinded_token: UnblindedToken,
    pub public_key: PublicKey,
}

/// Ordered token pool. Persistence is owned by the caller: every mutation
/// here is followed by a state save at the engine layer.
#[derive(Clone, Debug, Default)]
pub struct UnblindedTokens {
    tokens: Vec<UnblindedTokenInfo>,
}

impl UnblindedTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next token to spend, oldest first. Does not remove it.
    pub fn get_token(&self) -> Option<&UnblindedTokenInfo> {
        self.tokens.first()
    }

    pub fn get_all_tokens(&self) -> &[UnblindedTokenInfo] {
        &self.tokens
    }

    /// Appends tokens the pool does not already hold. Duplicates within the
    /// batch or against the pool are dropped.
    pub fn add_tokens(&mut self, tokens: impl IntoIterator<Item = UnblindedTokenInfo>) {
        for token in tokens {
            if !self.token_exists(&token) {
                self.tokens.push(token);
            }
        }
    }

    pub fn set_tokens(&mut self, tokens: Vec<UnblindedTokenInfo>) {
        self.tokens = tokens;
    }

    /// Removes the token if present. Removing an absent token is a no-op.
    pub fn remove_token(&mut self, token: &UnblindedTokenInfo) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|t| t != token);
        self.tokens.len() != before
    }

    pub fn remove_all_tokens(&mut self) {
        self.tokens.clear();
    }

    pub fn token_exists(&self, token: &UnblindedTokenInfo) -> bool {
        self.tokens.contains(token)
    }

    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn as_list(&self) -> Vec<UnblindedTokenInfo> {
        self.tokens.clone()
    }

    pub fn set_from_list(&mut self, list: Vec<UnblindedTokenInfo>) {
        self.tokens = list;
    }
}
