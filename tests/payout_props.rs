//! Property tests for the payout math: whatever the vault, fee and weight
//! distribution, projected payouts must stay inside the net vault.

use proptest::prelude::*;
use solana_sdk::pubkey::Pubkey;

use swiv_console::accounts::BetWithAddress;
use swiv_console::constants::BPS_DENOMINATOR;
use swiv_console::payout::{aggregate, net_distributable, ParticipantStatus};
use swiv_console::state::{BetStatus, Pool, UserBet};

fn pool(vault: u64, total_weight: u128, finalized: bool) -> Pool {
    Pool {
        admin: Pubkey::new_unique(),
        pool_id: 0,
        name: "prop".into(),
        token_mint: Pubkey::new_unique(),
        start_time: 0,
        end_time: 1,
        vault_balance: vault,
        max_accuracy_buffer: 500_000_000,
        conviction_bonus_bps: 1_000,
        metadata: None,
        resolution_target: 0,
        is_resolved: finalized,
        resolution_ts: 0,
        total_weight,
        weight_finalized: finalized,
        bump: 255,
    }
}

fn bet(owner: Pubkey, deposit: u64, weight: u128) -> BetWithAddress {
    BetWithAddress {
        address: Pubkey::new_unique(),
        bet: UserBet {
            owner,
            pool: Pubkey::new_unique(),
            deposit,
            prediction: 0,
            calculated_weight: weight,
            is_weight_added: weight > 0,
            creation_ts: 0,
            update_count: 0,
            status: BetStatus::Calculated,
            bump: 255,
        },
        delegated: false,
    }
}

proptest! {
    #[test]
    fn fee_never_exceeds_vault(vault in any::<u64>(), fee_bps in 0u64..=BPS_DENOMINATOR) {
        let net = net_distributable(vault, fee_bps);
        prop_assert!(net <= vault);
        if fee_bps == 0 {
            prop_assert_eq!(net, vault);
        }
        if fee_bps == BPS_DENOMINATOR {
            prop_assert_eq!(net, 0);
        }
    }

    #[test]
    fn payouts_stay_within_net_vault(
        vault in 0u64..=1_000_000_000_000,
        fee_bps in 0u64..=BPS_DENOMINATOR,
        weights in prop::collection::vec(0u128..=1_000_000_000, 1..12),
    ) {
        let total: u128 = weights.iter().sum();
        let p = pool(vault, total, true);
        let bets: Vec<BetWithAddress> = weights
            .iter()
            .map(|w| bet(Pubkey::new_unique(), 1_000, *w))
            .collect();

        let rows = aggregate(&p, fee_bps, &bets).unwrap();
        let net = net_distributable(vault, fee_bps) as u128;
        let paid: u128 = rows.iter().map(|r| r.payout.unwrap() as u128).sum();
        prop_assert!(paid <= net);

        for row in &rows {
            prop_assert!((row.payout.unwrap() as u128) <= net);
            match row.status {
                ParticipantStatus::Won => prop_assert!(row.total_weight > 0),
                ParticipantStatus::Lost => {
                    prop_assert_eq!(row.total_weight, 0);
                    prop_assert_eq!(row.payout, Some(0));
                }
                ParticipantStatus::Pending => prop_assert!(false, "finalized pool left a pending row"),
            }
        }
    }

    #[test]
    fn unfinalized_pools_never_project(
        vault in any::<u64>(),
        fee_bps in 0u64..=BPS_DENOMINATOR,
        weights in prop::collection::vec(0u128..=1_000_000, 1..8),
    ) {
        let p = pool(vault, weights.iter().sum(), false);
        let bets: Vec<BetWithAddress> = weights
            .iter()
            .map(|w| bet(Pubkey::new_unique(), 10, *w))
            .collect();
        let rows = aggregate(&p, fee_bps, &bets).unwrap();
        for row in rows {
            prop_assert_eq!(row.status, ParticipantStatus::Pending);
            prop_assert_eq!(row.payout, None);
            prop_assert_eq!(row.profit, None);
        }
    }

    #[test]
    fn whole_vault_goes_to_a_sole_winner(
        vault in 0u64..=1_000_000_000_000,
        weight in 1u128..=1_000_000_000,
    ) {
        let p = pool(vault, weight, true);
        let owner = Pubkey::new_unique();
        let rows = aggregate(&p, 0, &[bet(owner, 0, weight)]).unwrap();
        prop_assert_eq!(rows[0].payout, Some(vault));
    }
}
