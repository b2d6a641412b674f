//! Instruction builders.
//!
//! Each function serializes arguments for one instruction of the external
//! swiv privacy program and lays out the account metas the way the program's
//! `Accounts` structs expect them. Nothing here talks to the network.

pub mod admin;
pub mod delegation;
pub mod pool;

use anchor_lang::AnchorSerialize;
use solana_sdk::hash::hash;

use crate::errors::{ConsoleError, Result};

/// Anchor instruction discriminator: first 8 bytes of
/// sha256("global:<name>").
pub(crate) fn anchor_sighash(name: &str) -> [u8; 8] {
    let digest = hash(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest.to_bytes()[..8]);
    out
}

/// Sighash followed by borsh-encoded arguments.
pub(crate) fn encode<T: AnchorSerialize>(name: &str, args: &T) -> Result<Vec<u8>> {
    let mut out = anchor_sighash(name).to_vec();
    args.serialize(&mut out)
        .map_err(|e| ConsoleError::Compile(format!("cannot encode {name} args: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use anchor_lang::prelude::borsh;

    use super::*;

    #[test]
    fn sighash_is_stable_per_name() {
        let a = anchor_sighash("finalize_weights");
        assert_eq!(a, anchor_sighash("finalize_weights"));
        assert_ne!(a, anchor_sighash("resolve_pool"));
    }

    #[test]
    fn encode_prefixes_sighash() {
        #[derive(anchor_lang::AnchorSerialize)]
        struct Args {
            value: u64,
        }
        let data = encode("resolve_pool", &Args { value: 200_500_000 }).unwrap();
        assert_eq!(&data[..8], &anchor_sighash("resolve_pool"));
        assert_eq!(&data[8..], &200_500_000u64.to_le_bytes());
    }
}
