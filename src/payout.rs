//! Payout projection.
//!
//! Pure integer math over a pool snapshot and its bet records: group bets by
//! owner, subtract the protocol fee from the vault and split the remainder
//! proportionally to calculated weight. Division truncates, matching the
//! on-chain claim math, so the sum of projected payouts can undershoot the
//! net vault but never exceed it.

use std::collections::HashMap;

use solana_sdk::pubkey::Pubkey;

use crate::accounts::BetWithAddress;
use crate::constants::BPS_DENOMINATOR;
use crate::errors::PayoutError;
use crate::state::Pool;

/// What we can show for a single prediction. Bets resident in the TEE stay
/// hidden until the pool is flushed back or the operator runs an
/// authenticated reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionView {
    Hidden,
    Revealed(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantStatus {
    /// Weights not finalized yet; payout and profit are undefined.
    Pending,
    Won,
    Lost,
}

/// One row per unique owner.
#[derive(Debug, Clone)]
pub struct ParticipantSummary {
    pub owner: Pubkey,
    pub bet_count: usize,
    pub total_deposit: u64,
    pub predictions: Vec<PredictionView>,
    pub total_weight: u128,
    /// Any bet still resident under the delegation program.
    pub has_delegated_bets: bool,
    pub status: ParticipantStatus,
    /// Scaled token amount; `None` until weights are finalized.
    pub payout: Option<u64>,
    /// Payout minus deposits, scaled; `None` until weights are finalized.
    pub profit: Option<i128>,
}

/// Vault balance net of the protocol fee, truncating like the contract does.
pub fn net_distributable(vault_balance: u64, fee_bps: u64) -> u64 {
    let fee = (vault_balance as u128) * (fee_bps as u128) / (BPS_DENOMINATOR as u128);
    vault_balance.saturating_sub(fee as u64)
}

/// Build the participant table for a pool.
///
/// Rows come out in first-seen bet order, one per owner. Before
/// `weight_finalized` every row is `Pending` with no payout; afterwards a
/// non-zero accumulated weight marks the owner `Won` regardless of payout
/// magnitude.
pub fn aggregate(
    pool: &Pool,
    fee_bps: u64,
    bets: &[BetWithAddress],
) -> Result<Vec<ParticipantSummary>, PayoutError> {
    let net = net_distributable(pool.vault_balance, fee_bps) as u128;

    let mut index: HashMap<Pubkey, usize> = HashMap::new();
    let mut rows: Vec<ParticipantSummary> = Vec::new();

    for entry in bets {
        let i = match index.get(&entry.bet.owner) {
            Some(&i) => i,
            None => {
                index.insert(entry.bet.owner, rows.len());
                rows.push(ParticipantSummary {
                    owner: entry.bet.owner,
                    bet_count: 0,
                    total_deposit: 0,
                    predictions: Vec::new(),
                    total_weight: 0,
                    has_delegated_bets: false,
                    status: ParticipantStatus::Pending,
                    payout: None,
                    profit: None,
                });
                rows.len() - 1
            }
        };
        let row = &mut rows[i];

        row.bet_count += 1;
        row.total_deposit = row
            .total_deposit
            .checked_add(entry.bet.deposit)
            .ok_or(PayoutError::MathOverflow)?;
        row.total_weight = row
            .total_weight
            .checked_add(entry.bet.calculated_weight)
            .ok_or(PayoutError::MathOverflow)?;
        row.has_delegated_bets |= entry.delegated;

        // Predictions stay opaque while the live copy sits in the TEE and the
        // pool has not been finalized; a zero here would read as a real value.
        if pool.weight_finalized || !entry.delegated {
            row.predictions
                .push(PredictionView::Revealed(entry.bet.prediction));
        } else {
            row.predictions.push(PredictionView::Hidden);
        }
    }

    if pool.weight_finalized {
        for row in &mut rows {
            let payout = if pool.total_weight == 0 {
                0
            } else {
                let share = row
                    .total_weight
                    .checked_mul(net)
                    .ok_or(PayoutError::MathOverflow)?
                    / pool.total_weight;
                u64::try_from(share).map_err(|_| PayoutError::MathOverflow)?
            };
            row.payout = Some(payout);
            row.profit = Some(payout as i128 - row.total_deposit as i128);
            row.status = if row.total_weight > 0 {
                ParticipantStatus::Won
            } else {
                ParticipantStatus::Lost
            };
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BetStatus;
    use crate::state::UserBet;

    fn pool(vault: u64, total_weight: u128, finalized: bool) -> Pool {
        Pool {
            admin: Pubkey::new_unique(),
            pool_id: 0,
            name: "SOL above 200".into(),
            token_mint: Pubkey::new_unique(),
            start_time: 0,
            end_time: 100,
            vault_balance: vault,
            max_accuracy_buffer: 500_000_000,
            conviction_bonus_bps: 1_000,
            metadata: None,
            resolution_target: 200_000_000,
            is_resolved: finalized,
            resolution_ts: 0,
            total_weight,
            weight_finalized: finalized,
            bump: 255,
        }
    }

    fn bet(owner: Pubkey, deposit: u64, weight: u128, delegated: bool) -> BetWithAddress {
        BetWithAddress {
            address: Pubkey::new_unique(),
            bet: UserBet {
                owner,
                pool: Pubkey::new_unique(),
                deposit,
                prediction: 150_000_000,
                calculated_weight: weight,
                is_weight_added: weight > 0,
                creation_ts: 0,
                update_count: 0,
                status: BetStatus::Calculated,
                bump: 255,
            },
            delegated,
        }
    }

    #[test]
    fn fee_deduction_matches_contract_truncation() {
        // 1000 USDC vault at 500 bps leaves 950 USDC.
        assert_eq!(net_distributable(1_000_000_000, 500), 950_000_000);
        assert_eq!(net_distributable(0, 500), 0);
        assert_eq!(net_distributable(7, 10_000), 0);
        // Truncating: fee on 999 at 1 bps is 0.0999 -> 0.
        assert_eq!(net_distributable(999, 1), 999);
    }

    #[test]
    fn single_owner_takes_whole_net_vault() {
        let owner = Pubkey::new_unique();
        let p = pool(1_000_000_000, 100, true);
        let rows = aggregate(
            &p,
            500,
            &[bet(owner, 30_000_000, 30, false), bet(owner, 70_000_000, 70, false)],
        )
        .unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.bet_count, 2);
        assert_eq!(row.payout, Some(950_000_000));
        assert_eq!(row.profit, Some(950_000_000 - 100_000_000));
        assert_eq!(row.status, ParticipantStatus::Won);
    }

    #[test]
    fn zero_weight_owner_loses_with_zero_payout() {
        let winner = Pubkey::new_unique();
        let loser = Pubkey::new_unique();
        let p = pool(1_000_000_000, 100, true);
        let rows = aggregate(
            &p,
            500,
            &[bet(winner, 10, 100, false), bet(loser, 20, 0, false)],
        )
        .unwrap();

        let lost = rows.iter().find(|r| r.owner == loser).unwrap();
        assert_eq!(lost.status, ParticipantStatus::Lost);
        assert_eq!(lost.payout, Some(0));
        assert_eq!(lost.profit, Some(-20));
    }

    #[test]
    fn pending_pool_computes_no_payouts() {
        let p = pool(1_000_000_000, 0, false);
        let rows = aggregate(&p, 500, &[bet(Pubkey::new_unique(), 50, 0, false)]).unwrap();
        assert_eq!(rows[0].status, ParticipantStatus::Pending);
        assert_eq!(rows[0].payout, None);
        assert_eq!(rows[0].profit, None);
    }

    #[test]
    fn delegated_bets_stay_hidden_until_finalized() {
        let owner = Pubkey::new_unique();
        let open = pool(100, 0, false);
        let rows = aggregate(&open, 0, &[bet(owner, 10, 0, true)]).unwrap();
        assert_eq!(rows[0].predictions, vec![PredictionView::Hidden]);
        assert!(rows[0].has_delegated_bets);

        let done = pool(100, 10, true);
        let rows = aggregate(&done, 0, &[bet(owner, 10, 10, true)]).unwrap();
        assert_eq!(rows[0].predictions, vec![PredictionView::Revealed(150_000_000)]);
    }

    #[test]
    fn truncated_payouts_never_exceed_net() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let c = Pubkey::new_unique();
        let p = pool(1_000, 3, true);
        let rows = aggregate(
            &p,
            250,
            &[bet(a, 1, 1, false), bet(b, 1, 1, false), bet(c, 1, 1, false)],
        )
        .unwrap();

        let net = net_distributable(1_000, 250) as u128;
        let total: u128 = rows.iter().map(|r| r.payout.unwrap() as u128).sum();
        assert!(total <= net);
        for row in &rows {
            assert!((row.payout.unwrap() as u128) <= net);
        }
    }
}
