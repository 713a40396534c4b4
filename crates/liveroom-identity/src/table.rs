//! An in-memory token table.

use std::collections::HashMap;
use std::sync::RwLock;

use liveroom_protocol::UserId;

use crate::{Authenticator, IdentityError};

/// [`Authenticator`] backed by a token → user map.
///
/// Tokens are registered by whatever issued them; the table only answers
/// lookups. Useful for tests and single-process setups.
#[derive(Default)]
pub struct TokenTable {
    tokens: RwLock<HashMap<String, UserId>>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `token` with `user_id`, replacing any previous owner.
    pub fn register(&self, token: impl Into<String>, user_id: UserId) {
        let token = token.into();
        match self.tokens.write() {
            Ok(mut tokens) => {
                tokens.insert(token, user_id);
                tracing::debug!(%user_id, "token registered");
            }
            Err(_) => tracing::error!(%user_id, "token table lock poisoned"),
        }
    }

    /// Forgets a token. Returns the user it belonged to, if any.
    pub fn revoke(&self, token: &str) -> Option<UserId> {
        self.tokens.write().ok()?.remove(token)
    }

    fn lookup(&self, token: &str) -> Result<UserId, IdentityError> {
        let tokens = self.tokens.read().map_err(|_| {
            IdentityError::Unauthorized("token table unavailable".into())
        })?;
        tokens
            .get(token)
            .copied()
            .ok_or_else(|| IdentityError::Unauthorized("unknown token".into()))
    }
}

impl Authenticator for TokenTable {
    async fn authenticate(&self, token: &str) -> Result<UserId, IdentityError> {
        self.lookup(token)
    }
}
