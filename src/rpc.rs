//! Ledger endpoint plumbing shared by the base chain and the TEE.
//!
//! Both surfaces speak the same JSON-RPC dialect; the TEE one just carries a
//! bearer token in its URL (see [`crate::tee`]). Transaction submission uses
//! versioned (v0) transactions and an explicit retry policy instead of
//! implicit transport defaults.

use std::thread::sleep;
use std::time::Duration;

use anchor_lang::{AccountDeserialize, Discriminator};
use serde::{Deserialize, Serialize};
use solana_account_decoder::UiAccountEncoding;
use solana_client::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcAccountInfoConfig, RpcProgramAccountsConfig, RpcSendTransactionConfig,
};
use solana_client::rpc_filter::{Memcmp, RpcFilterType};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, info};

use crate::accounts::RawAccount;
use crate::errors::{ConsoleError, DecodeError, Result};
use crate::state::{Pool, Protocol, UserBet};
use crate::wallet::Wallet;

/// Explicit submission/confirmation policy, configured rather than implied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Transport-level resubmissions of an already-signed transaction.
    pub send_retries: usize,
    /// How many times to poll for confirmation before giving up.
    pub confirm_attempts: u32,
    pub confirm_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            send_retries: 3,
            confirm_attempts: 30,
            confirm_interval_ms: 1_000,
        }
    }
}

pub struct LedgerEndpoint {
    client: RpcClient,
    retry: RetryPolicy,
}

impl LedgerEndpoint {
    pub fn new(url: impl ToString, commitment: CommitmentConfig, retry: RetryPolicy) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url.to_string(), commitment),
            retry,
        }
    }

    pub fn url(&self) -> String {
        self.client.url()
    }

    /// Compile, sign, submit and confirm one v0 transaction.
    pub fn submit<W: Wallet + ?Sized>(
        &self,
        wallet: &W,
        instructions: &[Instruction],
    ) -> Result<Signature> {
        let blockhash = self.client.get_latest_blockhash()?;
        let message = v0::Message::try_compile(&wallet.pubkey(), instructions, &[], blockhash)
            .map_err(|e| ConsoleError::Compile(e.to_string()))?;
        let message = VersionedMessage::V0(message);
        let signature = wallet.sign_transaction(&message)?;
        let tx = VersionedTransaction {
            signatures: vec![signature],
            message,
        };

        let sig = self.client.send_transaction_with_config(
            &tx,
            RpcSendTransactionConfig {
                skip_preflight: false,
                max_retries: Some(self.retry.send_retries),
                ..RpcSendTransactionConfig::default()
            },
        )?;
        debug!(%sig, endpoint = %self.url(), "transaction sent");
        self.confirm(&sig)?;
        info!(%sig, "transaction confirmed");
        Ok(sig)
    }

    fn confirm(&self, sig: &Signature) -> Result<()> {
        for _ in 0..self.retry.confirm_attempts {
            let statuses = self.client.get_signature_statuses(&[*sig])?;
            if let Some(status) = statuses.value.into_iter().flatten().next() {
                if let Some(err) = status.err {
                    return Err(ConsoleError::TransactionFailed {
                        signature: *sig,
                        reason: err.to_string(),
                    });
                }
                if status.satisfies_commitment(self.client.commitment()) {
                    return Ok(());
                }
            }
            sleep(Duration::from_millis(self.retry.confirm_interval_ms));
        }
        Err(ConsoleError::ConfirmationTimeout(*sig))
    }

    pub fn account_exists(&self, address: &Pubkey) -> Result<bool> {
        let resp = self
            .client
            .get_account_with_commitment(address, self.client.commitment())?;
        Ok(resp.value.is_some())
    }

    fn typed_account<T: AccountDeserialize>(
        &self,
        address: &Pubkey,
        kind: &'static str,
    ) -> Result<Option<T>> {
        let resp = self
            .client
            .get_account_with_commitment(address, self.client.commitment())?;
        match resp.value {
            None => Ok(None),
            Some(account) => {
                let decoded = T::try_deserialize(&mut account.data.as_slice()).map_err(|e| {
                    DecodeError::Corrupt {
                        kind,
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(decoded))
            }
        }
    }

    /// `None` means the protocol was never initialized, which callers treat
    /// as a state rather than an error.
    pub fn protocol(&self) -> Result<Option<Protocol>> {
        let (address, _) = crate::pda::protocol();
        self.typed_account(&address, "Protocol")
    }

    pub fn pool(&self, address: &Pubkey) -> Result<Option<Pool>> {
        self.typed_account(address, "Pool")
    }

    pub fn user_bet(&self, address: &Pubkey) -> Result<Option<UserBet>> {
        self.typed_account(address, "UserBet")
    }

    /// All pools of the program on this ledger.
    pub fn pools(&self) -> Result<Vec<(Pubkey, Pool)>> {
        let raws = self.program_accounts(
            &crate::ID,
            vec![RpcFilterType::Memcmp(Memcmp::new_raw_bytes(
                0,
                Pool::DISCRIMINATOR.to_vec(),
            ))],
        )?;
        let mut pools = Vec::with_capacity(raws.len());
        for raw in raws {
            let pool = Pool::try_deserialize(&mut raw.data.as_slice()).map_err(|e| {
                DecodeError::Corrupt {
                    kind: "Pool",
                    reason: e.to_string(),
                }
            })?;
            pools.push((raw.address, pool));
        }
        Ok(pools)
    }

    /// Raw bet accounts of one pool under the given owner program. During
    /// delegation the same addresses show up under the delegation program.
    pub fn pool_bets(&self, owner_program: &Pubkey, pool: &Pubkey) -> Result<Vec<RawAccount>> {
        self.program_accounts(
            owner_program,
            vec![
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(0, UserBet::DISCRIMINATOR.to_vec())),
                RpcFilterType::Memcmp(Memcmp::new_raw_bytes(40, pool.to_bytes().to_vec())),
            ],
        )
    }

    fn program_accounts(
        &self,
        owner_program: &Pubkey,
        filters: Vec<RpcFilterType>,
    ) -> Result<Vec<RawAccount>> {
        let accounts = self.client.get_program_accounts_with_config(
            owner_program,
            RpcProgramAccountsConfig {
                filters: Some(filters),
                account_config: RpcAccountInfoConfig {
                    encoding: Some(UiAccountEncoding::Base64),
                    ..RpcAccountInfoConfig::default()
                },
                ..RpcProgramAccountsConfig::default()
            },
        )?;
        Ok(accounts
            .into_iter()
            .map(|(address, account)| RawAccount {
                address,
                owner_program: account.owner,
                data: account.data,
            })
            .collect())
    }
}
