//! TEE endpoint access.
//!
//! The TEE validators expose the regular ledger RPC surface but only to
//! holders of a bearer token, obtained by signing a server-issued challenge
//! with the connected wallet. Tokens have no advertised lifetime; when one
//! stops working the session is invalidated and the operator signs again.

use std::cell::RefCell;

use serde::Deserialize;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info};

use crate::errors::{ConsoleError, Result};
use crate::rpc::{LedgerEndpoint, RetryPolicy};
use crate::wallet::Wallet;

/// One selectable TEE deployment with its delegation validator identity.
#[derive(Debug, Clone)]
pub struct TeeRegion {
    pub label: String,
    pub url: String,
    pub validator: Pubkey,
}

#[derive(Deserialize)]
struct ChallengeResponse {
    challenge: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

pub struct TeeSession {
    region: TeeRegion,
    commitment: CommitmentConfig,
    retry: RetryPolicy,
    http: reqwest::blocking::Client,
    token: RefCell<Option<String>>,
}

impl TeeSession {
    pub fn new(region: TeeRegion, commitment: CommitmentConfig, retry: RetryPolicy) -> Self {
        Self {
            region,
            commitment,
            retry,
            http: reqwest::blocking::Client::new(),
            token: RefCell::new(None),
        }
    }

    pub fn region(&self) -> &TeeRegion {
        &self.region
    }

    pub fn validator(&self) -> Pubkey {
        self.region.validator
    }

    /// Drop the cached token; the next call re-runs the challenge exchange.
    pub fn invalidate(&self) {
        self.token.borrow_mut().take();
    }

    /// Run the challenge/sign/token exchange regardless of any cached token.
    pub fn authenticate<W: Wallet + ?Sized>(&self, wallet: &W) -> Result<String> {
        let pubkey = wallet.pubkey();
        let challenge: ChallengeResponse = self
            .http
            .get(format!("{}/auth/challenge", self.region.url))
            .query(&[("pubkey", pubkey.to_string())])
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| ConsoleError::TeeAuth(format!("challenge request failed: {e}")))?;
        debug!(region = %self.region.label, "received auth challenge");

        let signature = wallet.sign_message(challenge.challenge.as_bytes())?;

        let token: TokenResponse = self
            .http
            .post(format!("{}/auth/token", self.region.url))
            .json(&serde_json::json!({
                "pubkey": pubkey.to_string(),
                "challenge": challenge.challenge,
                "signature": bs58::encode(signature.as_ref()).into_string(),
            }))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| ConsoleError::TeeAuth(format!("token exchange failed: {e}")))?;

        info!(region = %self.region.label, "tee session authenticated");
        self.token.borrow_mut().replace(token.token.clone());
        Ok(token.token)
    }

    fn token<W: Wallet + ?Sized>(&self, wallet: &W) -> Result<String> {
        if let Some(token) = self.token.borrow().clone() {
            return Ok(token);
        }
        self.authenticate(wallet)
    }

    /// Authenticated RPC endpoint for this region.
    pub fn endpoint<W: Wallet + ?Sized>(&self, wallet: &W) -> Result<LedgerEndpoint> {
        let token = self.token(wallet)?;
        Ok(LedgerEndpoint::new(
            format!("{}?token={token}", self.region.url),
            self.commitment,
            self.retry,
        ))
    }
}
