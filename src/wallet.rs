//! Signing seam.
//!
//! The browser build of this console delegated all signing to a wallet
//! adapter; here the same surface is a trait so the CLI can run off a local
//! keypair while tests stub it out. Private key material never crosses this
//! boundary.

use std::path::Path;

use solana_sdk::message::VersionedMessage;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;

use crate::errors::{ConsoleError, Result};

pub trait Wallet {
    fn pubkey(&self) -> Pubkey;

    /// Sign an arbitrary byte message (TEE auth challenges).
    fn sign_message(&self, message: &[u8]) -> Result<Signature>;

    /// Sign a compiled transaction message.
    fn sign_transaction(&self, message: &VersionedMessage) -> Result<Signature>;
}

pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let keypair = solana_sdk::signature::read_keypair_file(path)
            .map_err(|e| ConsoleError::Wallet(format!("cannot read keypair {path:?}: {e}")))?;
        Ok(Self { keypair })
    }
}

impl Wallet for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign_message(&self, message: &[u8]) -> Result<Signature> {
        self.keypair
            .try_sign_message(message)
            .map_err(|e| ConsoleError::Wallet(e.to_string()))
    }

    fn sign_transaction(&self, message: &VersionedMessage) -> Result<Signature> {
        self.sign_message(&message.serialize())
    }
}
