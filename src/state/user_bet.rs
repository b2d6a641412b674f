use anchor_lang::prelude::*;

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BetStatus {
    Initialized,
    Active,
    Calculated,
    Claimed,
}

/// `owner` sits at byte offset 8 and `pool` at byte offset 40; the program
/// account scans in [`crate::rpc`] memcmp against those offsets, so the field
/// order is part of the wire contract.
#[account]
#[derive(Debug, PartialEq)]
pub struct UserBet {
    pub owner: Pubkey,
    pub pool: Pubkey,

    pub deposit: u64,
    pub prediction: u64,

    pub calculated_weight: u128,
    pub is_weight_added: bool,

    pub creation_ts: i64,
    pub update_count: u32,

    pub status: BetStatus,

    pub bump: u8,
}

impl UserBet {
    /// A bet can be claimed once weights are final, it carries a winning
    /// weight and it has not been claimed before.
    pub fn is_claim_ready(&self, weight_finalized: bool) -> bool {
        weight_finalized && self.calculated_weight > 0 && self.status == BetStatus::Calculated
    }
}
