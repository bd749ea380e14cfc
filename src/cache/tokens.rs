//! In-memory registry of issued session tokens.
//!
//! Tokens live until the process exits. Each subject holds at most one live
//! token: issuing again for the same subject replaces its previous token.
//! Nothing evicts subjects, so the registry grows with every distinct account
//! that signs up or logs in and is only reclaimed by a restart.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use thiserror::Error;
use uuid::Uuid;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::tokens";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("unauthenticated")]
    Unauthenticated,
}

/// Opaque bearer token handed to clients.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: SessionToken,
    pub subject_id: i64,
}

#[derive(Default)]
struct TokenIndex {
    by_token: HashMap<String, i64>,
    by_subject: HashMap<i64, String>,
}

#[derive(Default)]
pub struct TokenRegistry {
    index: RwLock<TokenIndex>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new token for `subject_id`.
    pub fn issue(&self, subject_id: i64) -> Credential {
        let token = SessionToken::generate();
        let mut index = rw_write(&self.index, SOURCE, "issue");
        if let Some(previous) = index.by_subject.insert(subject_id, token.0.clone()) {
            index.by_token.remove(&previous);
        }
        index.by_token.insert(token.0.clone(), subject_id);

        Credential { token, subject_id }
    }

    /// Resolve a presented token to the subject it was issued for.
    pub fn validate(&self, presented: &str) -> Result<i64, TokenError> {
        rw_read(&self.index, SOURCE, "validate")
            .by_token
            .get(presented)
            .copied()
            .ok_or(TokenError::Unauthenticated)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.index, SOURCE, "len").by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
