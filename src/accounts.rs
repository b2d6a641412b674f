//! Typed decoding of raw program accounts.
//!
//! The old dashboard decoded account bytes by name string through the IDL
//! coder; here the discriminator picks the variant and a failed decode is a
//! `DecodeError`, not a silently skipped row.

use std::collections::HashSet;

use anchor_lang::{AccountDeserialize, Discriminator};
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use crate::errors::DecodeError;
use crate::state::{Pool, Protocol, UserBet};

/// An account as returned by an RPC scan, before decoding.
#[derive(Debug, Clone)]
pub struct RawAccount {
    pub address: Pubkey,
    /// Program that currently owns the account on the queried ledger. While a
    /// bet is delegated this is the delegation program, not ours.
    pub owner_program: Pubkey,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgramAccount {
    Protocol(Protocol),
    Pool(Pool),
    UserBet(UserBet),
}

pub fn decode(data: &[u8]) -> Result<ProgramAccount, DecodeError> {
    if data.len() < 8 {
        return Err(DecodeError::TooShort(data.len()));
    }
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&data[..8]);

    if disc.as_slice() == Protocol::DISCRIMINATOR {
        decode_as("Protocol", data).map(ProgramAccount::Protocol)
    } else if disc.as_slice() == Pool::DISCRIMINATOR {
        decode_as("Pool", data).map(ProgramAccount::Pool)
    } else if disc.as_slice() == UserBet::DISCRIMINATOR {
        decode_as("UserBet", data).map(ProgramAccount::UserBet)
    } else {
        Err(DecodeError::UnknownDiscriminator(disc))
    }
}

fn decode_as<T: AccountDeserialize>(kind: &'static str, data: &[u8]) -> Result<T, DecodeError> {
    T::try_deserialize(&mut &data[..]).map_err(|e| DecodeError::Corrupt {
        kind,
        reason: e.to_string(),
    })
}

/// A decoded bet plus where we found it.
#[derive(Debug, Clone)]
pub struct BetWithAddress {
    pub address: Pubkey,
    pub bet: UserBet,
    /// True when the authoritative copy currently lives under the delegation
    /// program, i.e. the value shown from the base ledger is a shadow.
    pub delegated: bool,
}

/// Merge bet scans from the standard program and from the delegation program
/// into one logical list.
///
/// The same bet can surface twice during settlement (shadow on the base
/// ledger, live copy under the delegation program); entries are deduplicated
/// by address with the base-ledger copy taking precedence. Corrupt accounts
/// are logged and skipped.
pub fn merge_bet_accounts(base: &[RawAccount], delegated: &[RawAccount]) -> Vec<BetWithAddress> {
    let mut seen: HashSet<Pubkey> = HashSet::new();
    let mut merged = Vec::with_capacity(base.len() + delegated.len());

    for (raw, is_delegated) in base
        .iter()
        .map(|r| (r, false))
        .chain(delegated.iter().map(|r| (r, true)))
    {
        if !seen.insert(raw.address) {
            continue;
        }
        match decode_as::<UserBet>("UserBet", &raw.data) {
            Ok(bet) => merged.push(BetWithAddress {
                address: raw.address,
                bet,
                delegated: is_delegated,
            }),
            Err(e) => warn!(address = %raw.address, error = %e, "skipping undecodable bet account"),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BetStatus;
    use anchor_lang::AccountSerialize;

    fn bet_bytes(owner: Pubkey, pool: Pubkey, deposit: u64) -> Vec<u8> {
        let bet = UserBet {
            owner,
            pool,
            deposit,
            prediction: 0,
            calculated_weight: 0,
            is_weight_added: false,
            creation_ts: 0,
            update_count: 0,
            status: BetStatus::Active,
            bump: 255,
        };
        let mut out = Vec::new();
        bet.try_serialize(&mut out).unwrap();
        out
    }

    #[test]
    fn decode_dispatches_on_discriminator() {
        let data = bet_bytes(Pubkey::new_unique(), Pubkey::new_unique(), 5);
        assert!(matches!(decode(&data), Ok(ProgramAccount::UserBet(_))));

        assert_eq!(decode(&[1, 2, 3]), Err(DecodeError::TooShort(3)));
        assert!(matches!(
            decode(&[9u8; 16]),
            Err(DecodeError::UnknownDiscriminator(_))
        ));
    }

    #[test]
    fn bet_fields_sit_at_scan_offsets() {
        let owner = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let data = bet_bytes(owner, pool, 1);
        assert_eq!(&data[8..40], owner.as_ref());
        assert_eq!(&data[40..72], pool.as_ref());
    }

    #[test]
    fn merge_prefers_base_ledger_copy() {
        let pool = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let addr = Pubkey::new_unique();

        let base = vec![RawAccount {
            address: addr,
            owner_program: crate::ID,
            data: bet_bytes(owner, pool, 100),
        }];
        let shadow = vec![
            RawAccount {
                address: addr,
                owner_program: Pubkey::new_unique(),
                data: bet_bytes(owner, pool, 999),
            },
            RawAccount {
                address: Pubkey::new_unique(),
                owner_program: Pubkey::new_unique(),
                data: bet_bytes(owner, pool, 42),
            },
        ];

        let merged = merge_bet_accounts(&base, &shadow);
        assert_eq!(merged.len(), 2);
        let kept = merged.iter().find(|b| b.address == addr).unwrap();
        assert_eq!(kept.bet.deposit, 100);
        assert!(!kept.delegated);
        assert!(merged.iter().any(|b| b.delegated && b.bet.deposit == 42));
    }

    #[test]
    fn merge_skips_corrupt_accounts() {
        let base = vec![RawAccount {
            address: Pubkey::new_unique(),
            owner_program: crate::ID,
            data: vec![0u8; 4],
        }];
        assert!(merge_bet_accounts(&base, &[]).is_empty());
    }
}
