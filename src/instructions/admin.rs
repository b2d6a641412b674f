//! Protocol administration instructions.

use anchor_lang::prelude::{borsh, AnchorSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

use super::encode;
use crate::errors::Result;
use crate::pda;

#[derive(AnchorSerialize)]
struct InitializeProtocolArgs {
    protocol_fee_bps: u64,
}

pub fn initialize_protocol(
    admin: &Pubkey,
    treasury_wallet: &Pubkey,
    protocol_fee_bps: u64,
) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(protocol, false),
            AccountMeta::new(*admin, true),
            AccountMeta::new_readonly(*treasury_wallet, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: encode("initialize_protocol", &InitializeProtocolArgs { protocol_fee_bps })?,
    })
}

#[derive(AnchorSerialize)]
struct UpdateConfigArgs {
    new_treasury: Option<Pubkey>,
    new_protocol_fee_bps: Option<u64>,
}

pub fn update_config(
    admin: &Pubkey,
    new_treasury: Option<Pubkey>,
    new_protocol_fee_bps: Option<u64>,
) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(*admin, true),
            AccountMeta::new(protocol, false),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: encode(
            "update_config",
            &UpdateConfigArgs {
                new_treasury,
                new_protocol_fee_bps,
            },
        )?,
    })
}

#[derive(AnchorSerialize)]
struct SetPauseArgs {
    paused: bool,
}

pub fn set_pause(admin: &Pubkey, paused: bool) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new(protocol, false),
            AccountMeta::new_readonly(*admin, true),
        ],
        data: encode("set_pause", &SetPauseArgs { paused })?,
    })
}

#[derive(AnchorSerialize)]
struct TransferAdminArgs {
    new_admin: Pubkey,
}

pub fn transfer_admin(admin: &Pubkey, new_admin: Pubkey) -> Result<Instruction> {
    let (protocol, _) = pda::protocol();
    Ok(Instruction {
        program_id: crate::ID,
        accounts: vec![
            AccountMeta::new_readonly(*admin, true),
            AccountMeta::new(protocol, false),
        ],
        data: encode("transfer_admin", &TransferAdminArgs { new_admin })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::anchor_sighash;

    #[test]
    fn initialize_protocol_shape() {
        let admin = Pubkey::new_unique();
        let treasury = Pubkey::new_unique();
        let ix = initialize_protocol(&admin, &treasury, 500).unwrap();

        assert_eq!(ix.program_id, crate::ID);
        assert_eq!(&ix.data[..8], &anchor_sighash("initialize_protocol"));
        assert_eq!(&ix.data[8..], &500u64.to_le_bytes());
        assert!(ix.accounts[1].is_signer && ix.accounts[1].is_writable);
        assert_eq!(ix.accounts[0].pubkey, pda::protocol().0);
    }

    #[test]
    fn update_config_encodes_options() {
        let admin = Pubkey::new_unique();
        let ix = update_config(&admin, None, Some(250)).unwrap();
        // None tag, Some tag, then the u64.
        assert_eq!(ix.data[8], 0);
        assert_eq!(ix.data[9], 1);
        assert_eq!(&ix.data[10..], &250u64.to_le_bytes());
    }
}
