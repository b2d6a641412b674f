use anchor_lang::prelude::*;

#[account]
#[derive(Debug, PartialEq)]
pub struct Protocol {
    pub admin: Pubkey,
    pub treasury_wallet: Pubkey,
    pub protocol_fee_bps: u64,
    pub paused: bool,
    pub total_pools: u64,
    pub bump: u8,
}
