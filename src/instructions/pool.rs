//! Pool lifecycle and betting instructions.

use anchor_lang::prelude::{borsh, AnchorSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;
use solana_sdk::sysvar;
use spl_associated_token_account::get_associated_token_address;

use super::encode;
use crate::errors::Result;
use crate::pda;

#[derive(AnchorSerialize)]
struct CreatePoolArgs {
    pool_id: u64,
    name: String,
    metadata: Option<String>,
    start_time: i64,
    end_time: i64,
    max_accuracy_buffer: u64,
    conviction_bonus_bps: u64,
}

#[allow(clippy::too_many_arguments)]
pub fn create_pool(
    admin: &Pubkey,
    pool_id: u64,
    name: String,
    metadata: Option<String>,
    start_time: i64,
    end_time: i64,
    max_accuracy_buffer: u64,
    conviction_bonus_bps: u64,
    token_mint: &Pubkey,
) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    let (pool, _) = pda::pool(admin, pool_id);
    let (vault, _) = pda::pool_vault(&pool);
    let admin_token_account = get_associated_token_address(admin, token_mint);

    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(protocol, false),
            AccountMeta::new(pool, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(*token_mint, false),
            AccountMeta::new(*admin, true),
            AccountMeta::new(admin_token_account, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data: encode(
            "create_pool",
            &CreatePoolArgs {
                pool_id,
                name,
                metadata,
                start_time,
                end_time,
                max_accuracy_buffer,
                conviction_bonus_bps,
            },
        )?,
    })
}

#[derive(AnchorSerialize)]
struct InitBetArgs {
    amount: u64,
    request_id: String,
}

/// First half of the two-transaction bet flow: moves the deposit into the
/// vault and creates the bet account on the base ledger.
pub fn init_bet(
    user: &Pubkey,
    pool: &Pubkey,
    token_mint: &Pubkey,
    amount: u64,
    request_id: &str,
) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    let (vault, _) = pda::pool_vault(pool);
    let (user_bet, _) = pda::user_bet(pool, user, request_id);
    let user_token_account = get_associated_token_address(user, token_mint);

    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new_readonly(protocol, false),
            AccountMeta::new(*pool, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(user_token_account, false),
            AccountMeta::new(user_bet, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data: encode(
            "init_bet",
            &InitBetArgs {
                amount,
                request_id: request_id.to_string(),
            },
        )?,
    })
}

#[derive(AnchorSerialize)]
struct PlaceBetArgs {
    prediction: u64,
    request_id: String,
}

/// Second half of the bet flow, submitted to the TEE once the bet account is
/// delegated: records the private prediction.
pub fn place_bet(
    user: &Pubkey,
    pool: &Pubkey,
    prediction: u64,
    request_id: &str,
) -> Result<Instruction> {
    let (user_bet, _) = pda::user_bet(pool, user, request_id);
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new_readonly(*pool, false),
            AccountMeta::new(user_bet, false),
        ],
        data: encode(
            "place_bet",
            &PlaceBetArgs {
                prediction,
                request_id: request_id.to_string(),
            },
        )?,
    })
}

#[derive(AnchorSerialize)]
struct UpdateBetArgs {
    new_prediction_target: u64,
}

pub fn update_bet(
    user: &Pubkey,
    pool: &Pubkey,
    user_bet: &Pubkey,
    new_prediction_target: u64,
) -> Result<Instruction> {
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new(*user_bet, false),
            AccountMeta::new_readonly(*pool, false),
        ],
        data: encode("update_bet", &UpdateBetArgs { new_prediction_target })?,
    })
}

#[derive(AnchorSerialize)]
struct ResolvePoolArgs {
    final_outcome: u64,
}

/// Settlement step 2, submitted to the TEE. `final_outcome` is already
/// scaled by 1e6.
pub fn resolve_pool(admin: &Pubkey, pool: &Pubkey, final_outcome: u64) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(protocol, false),
            AccountMeta::new(*pool, false),
        ],
        data: encode("resolve_pool", &ResolvePoolArgs { final_outcome })?,
    })
}

#[derive(AnchorSerialize)]
struct BatchCalculateWeightsArgs {}

/// Settlement step 3, submitted to the TEE with every open bet attached as a
/// writable remaining account.
pub fn batch_calculate_weights(
    admin: &Pubkey,
    pool: &Pubkey,
    bets: &[Pubkey],
) -> Result<Instruction> {
    let mut accounts = vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new(*pool, false),
    ];
    accounts.extend(bets.iter().map(|b| AccountMeta::new(*b, false)));
    Ok(Instruction {
        program_id: crate::ID,
        accounts,
        data: encode("batch_calculate_weights", &BatchCalculateWeightsArgs {})?,
    })
}

#[derive(AnchorSerialize)]
struct FinalizeWeightsArgs {}

/// Settlement step 5 on the base ledger: moves the protocol fee to the
/// treasury token account and freezes the weights.
pub fn finalize_weights(
    admin: &Pubkey,
    pool: &Pubkey,
    token_mint: &Pubkey,
    treasury_wallet: &Pubkey,
) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    let (vault, _) = pda::pool_vault(pool);
    let treasury_token_account = get_associated_token_address(treasury_wallet, token_mint);

    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(protocol, false),
            AccountMeta::new(*pool, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(treasury_token_account, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ],
        data: encode("finalize_weights", &FinalizeWeightsArgs {})?,
    })
}

#[derive(AnchorSerialize)]
struct ClaimRewardArgs {}

pub fn claim_reward(
    user: &Pubkey,
    pool: &Pubkey,
    user_bet: &Pubkey,
    token_mint: &Pubkey,
) -> Result<Instruction> {
    let (vault, _) = pda::pool_vault(pool);
    let user_token_account = get_associated_token_address(user, token_mint);
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*user, true),
            AccountMeta::new(*pool, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(*user_bet, false),
            AccountMeta::new(user_token_account, false),
            AccountMeta::new_readonly(spl_token::ID, false),
        ],
        data: encode("claim_reward", &ClaimRewardArgs {})?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::anchor_sighash;

    #[test]
    fn resolve_pool_carries_scaled_price() {
        let admin = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let ix = resolve_pool(&admin, &pool, 200_500_000).unwrap();
        assert_eq!(&ix.data[..8], &anchor_sighash("resolve_pool"));
        assert_eq!(&ix.data[8..], &200_500_000u64.to_le_bytes());
        assert_eq!(ix.accounts.len(), 3);
    }

    #[test]
    fn batch_calculate_attaches_every_bet_writable() {
        let admin = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let bets: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        let ix = batch_calculate_weights(&admin, &pool, &bets).unwrap();
        assert_eq!(ix.accounts.len(), 2 + bets.len());
        for meta in &ix.accounts[2..] {
            assert!(meta.is_writable);
            assert!(!meta.is_signer);
        }
    }

    #[test]
    fn bet_instructions_agree_on_the_bet_address() {
        let user = Pubkey::new_unique();
        let pool = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let request_id = "bet_1700000000000";

        let init = init_bet(&user, &pool, &mint, 25_000_000, request_id).unwrap();
        let place = place_bet(&user, &pool, 199_000_000, request_id).unwrap();
        let (expected, _) = pda::user_bet(&pool, &user, request_id);
        assert_eq!(init.accounts[5].pubkey, expected);
        assert_eq!(place.accounts[2].pubkey, expected);
    }
}
