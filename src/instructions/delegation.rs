//! Delegation plumbing: handing accounts to the TEE validator and flushing
//! them back to the base ledger.

use anchor_lang::prelude::{borsh, AnchorSerialize};
use ephemeral_rollups_sdk::consts::{DELEGATION_PROGRAM_ID, MAGIC_CONTEXT_ID, MAGIC_PROGRAM_ID};
use ephemeral_rollups_sdk::pda::{
    delegate_buffer_pda_from_delegated_account_and_owner_program,
    delegation_metadata_pda_from_delegated_account, delegation_record_pda_from_delegated_account,
};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

use super::encode;
use crate::errors::Result;
use crate::pda;

/// The trio of delegation-program accounts every delegate instruction needs
/// for a given delegated account.
fn delegation_metas(delegated: &Pubkey, owner_program: &Pubkey) -> [AccountMeta; 3] {
    [
        AccountMeta::new(
            delegate_buffer_pda_from_delegated_account_and_owner_program(delegated, owner_program),
            false,
        ),
        AccountMeta::new(delegation_record_pda_from_delegated_account(delegated), false),
        AccountMeta::new(delegation_metadata_pda_from_delegated_account(delegated), false),
    ]
}

#[derive(AnchorSerialize)]
struct DelegatePoolArgs {
    pool_id: u64,
}

/// Settlement step 1: hand the pool account to the TEE validator.
pub fn delegate_pool(
    admin: &Pubkey,
    pool: &Pubkey,
    pool_id: u64,
    validator: &Pubkey,
) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    let mut accounts = vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new_readonly(protocol, false),
        AccountMeta::new(*pool, false),
        AccountMeta::new_readonly(*validator, false),
    ];
    accounts.extend(delegation_metas(pool, &crate::ID));
    accounts.push(AccountMeta::new_readonly(crate::ID, false));
    accounts.push(AccountMeta::new_readonly(DELEGATION_PROGRAM_ID, false));
    accounts.push(AccountMeta::new_readonly(system_program::ID, false));

    Ok(Instruction {
        program_id: crate::ID,
        accounts,
        data: encode("delegate_pool", &DelegatePoolArgs { pool_id })?,
    })
}

#[derive(AnchorSerialize)]
struct RequestIdArgs {
    request_id: String,
}

pub fn delegate_bet(
    user: &Pubkey,
    pool: &Pubkey,
    validator: &Pubkey,
    request_id: &str,
) -> Result<Instruction> {
    let (user_bet, _) = pda::user_bet(pool, user, request_id);
    let mut accounts = vec![
        AccountMeta::new(*user, true),
        AccountMeta::new_readonly(*pool, false),
        AccountMeta::new(user_bet, false),
        AccountMeta::new_readonly(*validator, false),
    ];
    accounts.extend(delegation_metas(&user_bet, &crate::ID));
    accounts.push(AccountMeta::new_readonly(crate::ID, false));
    accounts.push(AccountMeta::new_readonly(DELEGATION_PROGRAM_ID, false));
    accounts.push(AccountMeta::new_readonly(system_program::ID, false));

    Ok(Instruction {
        program_id: crate::ID,
        accounts,
        data: encode(
            "delegate_bet",
            &RequestIdArgs {
                request_id: request_id.to_string(),
            },
        )?,
    })
}

/// Create the permission record that lets the bet owner keep authority over
/// the bet while it sits inside the TEE.
pub fn create_bet_permission(
    payer: &Pubkey,
    user: &Pubkey,
    pool: &Pubkey,
    permission_program: &Pubkey,
    request_id: &str,
) -> Result<Instruction> {
    let (user_bet, _) = pda::user_bet(pool, user, request_id);
    let (permission, _) = pda::permission(&user_bet, permission_program);
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new_readonly(*user, false),
            AccountMeta::new_readonly(user_bet, false),
            AccountMeta::new_readonly(*pool, false),
            AccountMeta::new(permission, false),
            AccountMeta::new_readonly(*permission_program, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: encode(
            "create_bet_permission",
            &RequestIdArgs {
                request_id: request_id.to_string(),
            },
        )?,
    })
}

/// Delegate the permission record itself, so the TEE honors it.
pub fn delegate_bet_permission(
    user: &Pubkey,
    pool: &Pubkey,
    validator: &Pubkey,
    permission_program: &Pubkey,
    request_id: &str,
) -> Result<Instruction> {
    let (user_bet, _) = pda::user_bet(pool, user, request_id);
    let (permission, _) = pda::permission(&user_bet, permission_program);
    let mut accounts = vec![
        AccountMeta::new(*user, true),
        AccountMeta::new_readonly(*pool, false),
        AccountMeta::new_readonly(user_bet, false),
        AccountMeta::new(permission, false),
    ];
    accounts.extend(delegation_metas(&permission, permission_program));
    accounts.push(AccountMeta::new_readonly(*validator, false));
    accounts.push(AccountMeta::new_readonly(*permission_program, false));
    accounts.push(AccountMeta::new_readonly(DELEGATION_PROGRAM_ID, false));
    accounts.push(AccountMeta::new_readonly(system_program::ID, false));

    Ok(Instruction {
        program_id: crate::ID,
        accounts,
        data: encode(
            "delegate_bet_permission",
            &RequestIdArgs {
                request_id: request_id.to_string(),
            },
        )?,
    })
}

#[derive(AnchorSerialize)]
struct NoArgs {}

/// Settlement step 4a, submitted to the TEE: commit every bet account back
/// to the base ledger.
pub fn batch_undelegate_bets(payer: &Pubkey, pool: &Pubkey, bets: &[Pubkey]) -> Result<Instruction> {
    let mut accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(*pool, false),
        AccountMeta::new(MAGIC_CONTEXT_ID, false),
        AccountMeta::new_readonly(MAGIC_PROGRAM_ID, false),
    ];
    accounts.extend(bets.iter().map(|b| AccountMeta::new(*b, false)));
    Ok(Instruction {
        program_id: crate::ID,
        accounts,
        data: encode("batch_undelegate_bets", &NoArgs {})?,
    })
}

/// Settlement step 4b, submitted to the TEE: commit the pool account itself.
pub fn undelegate_pool(admin: &Pubkey, pool: &Pubkey) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(protocol, false),
            AccountMeta::new(*pool, false),
            AccountMeta::new(MAGIC_CONTEXT_ID, false),
            AccountMeta::new_readonly(MAGIC_PROGRAM_ID, false),
        ],
        data: encode("undelegate_pool", &NoArgs {})?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::anchor_sighash;

    #[test]
    fn delegate_pool_references_validator_and_delegation_program() {
        let admin = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let validator = Pubkey::new_unique();
        let ix = delegate_pool(&admin, &pool, 7, &validator).unwrap();

        assert_eq!(&ix.data[..8], &anchor_sighash("delegate_pool"));
        assert_eq!(&ix.data[8..], &7u64.to_le_bytes());
        assert!(ix.accounts.iter().any(|m| m.pubkey == validator));
        assert!(ix.accounts.iter().any(|m| m.pubkey == DELEGATION_PROGRAM_ID));
    }

    #[test]
    fn batch_undelegate_lists_bets_after_magic_accounts() {
        let payer = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let bets: Vec<Pubkey> = (0..3).map(|_| Pubkey::new_unique()).collect();
        let ix = batch_undelegate_bets(&payer, &pool, &bets).unwrap();

        assert_eq!(ix.accounts[2].pubkey, MAGIC_CONTEXT_ID);
        assert_eq!(ix.accounts[3].pubkey, MAGIC_PROGRAM_ID);
        assert_eq!(ix.accounts.len(), 4 + bets.len());
    }
}
