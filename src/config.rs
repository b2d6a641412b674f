//! Console configuration.
//!
//! A single TOML file holds the base RPC URL, the signing keypair path, the
//! retry policy and the TEE region catalog. Running without a file uses the
//! built-in devnet defaults, which match the deployed protocol.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::errors::{ConsoleError, Result};
use crate::rpc::{LedgerEndpoint, RetryPolicy};
use crate::tee::{TeeRegion, TeeSession};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeeRegionConfig {
    pub label: String,
    pub url: String,
    /// Delegation validator identity for this region, base58.
    pub validator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc_url: String,
    /// `processed`, `confirmed` or `finalized`.
    pub commitment: String,
    pub keypair_path: String,
    /// Where pending two-step bets and other session state are kept.
    pub session_path: String,
    /// Permission program for private bet access control, base58.
    pub permission_program: String,
    pub retry: RetryPolicy,
    pub regions: Vec<TeeRegionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            commitment: "confirmed".to_string(),
            keypair_path: "~/.config/solana/id.json".to_string(),
            session_path: "swiv-session.json".to_string(),
            permission_program: crate::constants::PERMISSION_PROGRAM_ID.to_string(),
            retry: RetryPolicy::default(),
            regions: vec![
                TeeRegionConfig {
                    label: "eu".to_string(),
                    url: "https://devnet-eu.magicblock.app".to_string(),
                    validator: "MEUGGrYPxKk17hCr7wpT6s8dtNokZj5U2L57vjYMS8e".to_string(),
                },
                TeeRegionConfig {
                    label: "as".to_string(),
                    url: "https://devnet-as.magicblock.app".to_string(),
                    validator: "MAS1Dt9qreoRMQ14YQuhg8UTZMMzDdKhmkZMECCzk57".to_string(),
                },
                TeeRegionConfig {
                    label: "us".to_string(),
                    url: "https://devnet-us.magicblock.app".to_string(),
                    validator: "MUS3hc9TCw4cGC12vHNoYcCGzJG1txjgQLZWVoeNHNd".to_string(),
                },
            ],
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| ConsoleError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw =
            toml::to_string_pretty(self).map_err(|e| ConsoleError::Config(e.to_string()))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Keypair path with a leading `~` expanded against `$HOME`.
    pub fn keypair_path(&self) -> std::path::PathBuf {
        expand_home(&self.keypair_path)
    }

    pub fn session_path(&self) -> std::path::PathBuf {
        expand_home(&self.session_path)
    }

    pub fn commitment(&self) -> Result<CommitmentConfig> {
        CommitmentConfig::from_str(&self.commitment)
            .map_err(|_| ConsoleError::Config(format!("unknown commitment {:?}", self.commitment)))
    }

    pub fn permission_program(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.permission_program).map_err(|_| {
            ConsoleError::Config(format!(
                "invalid permission program {:?}",
                self.permission_program
            ))
        })
    }

    /// Base-ledger endpoint from this config.
    pub fn base_endpoint(&self) -> Result<LedgerEndpoint> {
        Ok(LedgerEndpoint::new(
            self.rpc_url.clone(),
            self.commitment()?,
            self.retry,
        ))
    }

    /// TEE session for the named region, or the first region when `label` is
    /// `None`.
    pub fn tee_session(&self, label: Option<&str>) -> Result<TeeSession> {
        let entry = match label {
            Some(wanted) => self
                .regions
                .iter()
                .find(|r| r.label.eq_ignore_ascii_case(wanted))
                .ok_or_else(|| ConsoleError::Config(format!("unknown tee region {wanted:?}")))?,
            None => self
                .regions
                .first()
                .ok_or_else(|| ConsoleError::Config("no tee regions configured".to_string()))?,
        };
        let validator = Pubkey::from_str(&entry.validator).map_err(|_| {
            ConsoleError::Config(format!(
                "invalid validator key {:?} for region {:?}",
                entry.validator, entry.label
            ))
        })?;
        Ok(TeeSession::new(
            TeeRegion {
                label: entry.label.clone(),
                url: entry.url.clone(),
                validator,
            },
            self.commitment()?,
            self.retry,
        ))
    }
}

fn expand_home(path: &str) -> std::path::PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    std::path::PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_well_formed() {
        let config = Config::default();
        assert!(config.commitment().is_ok());
        assert!(config.permission_program().is_ok());
        assert_eq!(config.regions.len(), 3);
        for region in &config.regions {
            assert!(Pubkey::from_str(&region.validator).is_ok(), "{}", region.label);
        }
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.toml");

        let mut config = Config::default();
        config.rpc_url = "http://localhost:8899".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.rpc_url, "http://localhost:8899");
        assert_eq!(loaded.regions.len(), 3);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let loaded = Config::load(Path::new("/nonexistent/console.toml")).unwrap();
        assert_eq!(loaded.rpc_url, Config::default().rpc_url);
    }

    #[test]
    fn region_lookup_is_case_insensitive() {
        let config = Config::default();
        assert!(config.tee_session(Some("EU")).is_ok());
        assert!(config.tee_session(Some("mars")).is_err());
        assert_eq!(config.tee_session(None).unwrap().region().label, "eu");
    }
}
