//! Local session state.
//!
//! Placing a bet is a two-transaction flow: the first initializes and
//! delegates the bet account under a fresh request id, the second places the
//! deposit and prediction inside the TEE. The request id must survive a
//! crash between the two, so it is persisted to a small JSON file keyed by
//! pool address.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::errors::{ConsoleError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBet {
    pub request_id: String,
    /// Unix seconds when the bet account was initialized.
    pub created_at: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionState {
    /// Pool address (base58) to the bet awaiting its second transaction.
    pending_bets: HashMap<String, PendingBet>,
    last_token_mint: Option<String>,
}

pub struct SessionStore {
    path: PathBuf,
    state: SessionState,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)
                .map_err(|e| ConsoleError::Config(format!("corrupt session file: {e}")))?
        } else {
            SessionState::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    pub fn pending_bet(&self, pool: &Pubkey) -> Option<&PendingBet> {
        self.state.pending_bets.get(&pool.to_string())
    }

    pub fn record_pending_bet(&mut self, pool: &Pubkey, request_id: &str, now: i64) -> Result<()> {
        self.state.pending_bets.insert(
            pool.to_string(),
            PendingBet {
                request_id: request_id.to_string(),
                created_at: now,
            },
        );
        self.persist()
    }

    /// Forget the pending bet once its second transaction confirmed.
    pub fn clear_pending_bet(&mut self, pool: &Pubkey) -> Result<()> {
        if self.state.pending_bets.remove(&pool.to_string()).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    pub fn last_token_mint(&self) -> Option<Pubkey> {
        self.state
            .last_token_mint
            .as_deref()
            .and_then(|s| s.parse().ok())
    }

    pub fn remember_token_mint(&mut self, mint: &Pubkey) -> Result<()> {
        self.state.last_token_mint = Some(mint.to_string());
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.state)
            .map_err(|e| ConsoleError::Config(format!("session serialization failed: {e}")))?;
        std::fs::write(&self.path, raw)?;
        debug!(path = %self.path.display(), "session state persisted");
        Ok(())
    }
}

/// Fresh request id for a new bet: current nanos in base58, unique enough
/// for one wallet and short enough for a seed.
pub fn new_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    bs58::encode(nanos.to_le_bytes()).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_bet_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let pool = Pubkey::new_unique();

        {
            let mut store = SessionStore::open(&path).unwrap();
            store.record_pending_bet(&pool, "req-1", 1_700_000_000).unwrap();
        }

        let store = SessionStore::open(&path).unwrap();
        let pending = store.pending_bet(&pool).unwrap();
        assert_eq!(pending.request_id, "req-1");
        assert_eq!(pending.created_at, 1_700_000_000);
    }

    #[test]
    fn clearing_removes_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let pool = Pubkey::new_unique();

        let mut store = SessionStore::open(&path).unwrap();
        store.record_pending_bet(&pool, "req-1", 0).unwrap();
        store.clear_pending_bet(&pool).unwrap();
        assert!(store.pending_bet(&pool).is_none());

        let reopened = SessionStore::open(&path).unwrap();
        assert!(reopened.pending_bet(&pool).is_none());
    }

    #[test]
    fn remembered_mint_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mint = Pubkey::new_unique();

        let mut store = SessionStore::open(&path).unwrap();
        assert!(store.last_token_mint().is_none());
        store.remember_token_mint(&mint).unwrap();

        let reopened = SessionStore::open(&path).unwrap();
        assert_eq!(reopened.last_token_mint(), Some(mint));
    }

    #[test]
    fn request_ids_are_distinct() {
        let a = new_request_id();
        let b = new_request_id();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }
}
