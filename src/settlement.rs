//! Settlement workflow.
//!
//! Once a pool's betting window closes an operator walks it through five
//! ordered steps: delegate the pool to the TEE, resolve the outcome inside
//! the TEE, batch-calculate bet weights, flush pool and bets back to the
//! base ledger, and finalize weights (fee to treasury). Completion is always
//! re-derived from authoritative reads; the local ledger of flags is a cache
//! that exists so a step is never built twice and never built out of order.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account;
use tracing::{info, warn};

use ephemeral_rollups_sdk::consts::DELEGATION_PROGRAM_ID;
use ephemeral_rollups_sdk::pda::delegation_record_pda_from_delegated_account;

use crate::accounts::{merge_bet_accounts, BetWithAddress};
use crate::errors::{ConsoleError, Result, SettlementError};
use crate::instructions::{delegation, pool as pool_ix};
use crate::rpc::LedgerEndpoint;
use crate::state::Pool;
use crate::tee::TeeSession;
use crate::wallet::Wallet;

/// The five ordered settlement steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStep {
    Delegate,
    Resolve,
    CalculateWeights,
    Flush,
    Finalize,
}

impl SettlementStep {
    pub const ALL: [SettlementStep; 5] = [
        SettlementStep::Delegate,
        SettlementStep::Resolve,
        SettlementStep::CalculateWeights,
        SettlementStep::Flush,
        SettlementStep::Finalize,
    ];

    pub fn number(self) -> u8 {
        match self {
            SettlementStep::Delegate => 1,
            SettlementStep::Resolve => 2,
            SettlementStep::CalculateWeights => 3,
            SettlementStep::Flush => 4,
            SettlementStep::Finalize => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SettlementStep::Delegate => "delegate pool to TEE",
            SettlementStep::Resolve => "resolve outcome (TEE)",
            SettlementStep::CalculateWeights => "calculate weights (TEE)",
            SettlementStep::Flush => "flush accounts to base ledger",
            SettlementStep::Finalize => "finalize weights",
        }
    }

    fn index(self) -> usize {
        self.number() as usize - 1
    }
}

/// Completion flags and last-seen signatures, one slot per step.
///
/// Flags are rebuilt from chain reads on every refresh; signatures are only
/// known for steps submitted in this session.
#[derive(Debug, Clone, Default)]
pub struct StepLedger {
    done: [bool; 5],
    signatures: [Option<Signature>; 5],
}

impl StepLedger {
    pub fn is_done(&self, step: SettlementStep) -> bool {
        self.done[step.index()]
    }

    pub fn signature(&self, step: SettlementStep) -> Option<Signature> {
        self.signatures[step.index()]
    }

    pub fn record(&mut self, step: SettlementStep, signature: Signature) {
        self.done[step.index()] = true;
        self.signatures[step.index()] = Some(signature);
    }

    /// First step that is not yet complete, in order.
    pub fn next_actionable(&self) -> Option<SettlementStep> {
        SettlementStep::ALL.iter().copied().find(|s| !self.is_done(*s))
    }

    /// Reject re-running a finished step and running a step whose
    /// predecessors are incomplete. Callers check this before building any
    /// instruction, which is what makes every step idempotent-safe.
    pub fn ensure_actionable(&self, step: SettlementStep) -> std::result::Result<(), SettlementError> {
        if self.is_done(step) {
            return Err(SettlementError::AlreadyComplete(step.number()));
        }
        for earlier in SettlementStep::ALL.iter().take(step.index()) {
            if !self.is_done(*earlier) {
                return Err(SettlementError::PrerequisiteIncomplete {
                    step: step.number(),
                    missing: earlier.number(),
                });
            }
        }
        Ok(())
    }

    fn absorb_flags(&mut self, done: [bool; 5]) {
        self.done = done;
    }
}

/// Coarse pool lifecycle derived from a [`ChainView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStage {
    Open,
    Ended,
    Delegated,
    Resolved,
    WeightsCalculated,
    Flushed,
    Finalized,
}

/// Outcome of the authenticated TEE read for one pool.
#[derive(Debug, Clone)]
pub enum TeeView {
    /// Authentication or transport failed; TEE-side progress is unknown and
    /// must not be guessed at.
    Unavailable,
    /// The authenticated endpoint answered but does not serve the pool.
    NotServed,
    Served(Pool),
}

/// Snapshot of everything observable about one pool across both endpoints.
#[derive(Debug, Clone)]
pub struct ChainView {
    pub pool: Pool,
    /// A delegation record for the pool exists on the base ledger.
    pub delegated_on_base: bool,
    pub tee: TeeView,
}

impl ChainView {
    /// Derive step completion from on-chain facts.
    ///
    /// Steps 1, 4 and 5 are visible from the base ledger alone. Steps 2 and
    /// 3 live inside the TEE; when the authenticated endpoint answers but no
    /// longer serves a delegated pool, the pool has already been flushed and
    /// steps 2-4 are complete. A failed TEE read proves nothing and leaves
    /// those steps unset. A step observed complete implies every step before
    /// it ran, so completion is backfilled.
    pub fn derive_flags(&self) -> [bool; 5] {
        let mut done = [false; 5];
        done[0] = self.delegated_on_base;
        done[3] = self.pool.is_resolved && !self.delegated_on_base;
        done[4] = self.pool.weight_finalized;
        match &self.tee {
            TeeView::Served(tee) => {
                done[1] = tee.is_resolved;
                done[2] = tee.total_weight > 0;
            }
            TeeView::NotServed if done[0] => {
                done[1] = true;
                done[2] = true;
                done[3] = true;
            }
            TeeView::NotServed | TeeView::Unavailable => {}
        }
        if let Some(last) = (1..5).rev().find(|&step| done[step]) {
            for earlier in done.iter_mut().take(last) {
                *earlier = true;
            }
        }
        done
    }

    pub fn stage(&self, now: i64) -> PoolStage {
        let done = self.derive_flags();
        if done[4] {
            PoolStage::Finalized
        } else if done[3] {
            PoolStage::Flushed
        } else if done[2] {
            PoolStage::WeightsCalculated
        } else if done[1] {
            PoolStage::Resolved
        } else if done[0] {
            PoolStage::Delegated
        } else if self.pool.has_ended(now) {
            PoolStage::Ended
        } else {
            PoolStage::Open
        }
    }
}

fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Orchestrates one pool's settlement against the two endpoints.
pub struct SettlementRun<'a, W: Wallet> {
    base: &'a LedgerEndpoint,
    tee: &'a TeeSession,
    wallet: &'a W,
    pool_address: Pubkey,
    view: ChainView,
    bets: Vec<BetWithAddress>,
    ledger: StepLedger,
}

impl<'a, W: Wallet> SettlementRun<'a, W> {
    pub fn load(
        base: &'a LedgerEndpoint,
        tee: &'a TeeSession,
        wallet: &'a W,
        pool_address: Pubkey,
    ) -> Result<Self> {
        let (view, bets) = observe(base, tee, wallet, &pool_address)?;
        let mut ledger = StepLedger::default();
        ledger.absorb_flags(view.derive_flags());
        Ok(Self {
            base,
            tee,
            wallet,
            pool_address,
            view,
            bets,
            ledger,
        })
    }

    /// Re-read every authoritative source and rebuild completion flags.
    /// Signatures recorded in this session survive the refresh.
    pub fn refresh(&mut self) -> Result<()> {
        let (view, bets) = observe(self.base, self.tee, self.wallet, &self.pool_address)?;
        self.view = view;
        self.bets = bets;
        self.ledger.absorb_flags(self.view.derive_flags());
        Ok(())
    }

    pub fn view(&self) -> &ChainView {
        &self.view
    }

    pub fn bets(&self) -> &[BetWithAddress] {
        &self.bets
    }

    pub fn ledger(&self) -> &StepLedger {
        &self.ledger
    }

    pub fn stage(&self) -> PoolStage {
        self.view.stage(unix_now())
    }

    /// Step 1: delegate the pool account to the TEE validator (base ledger).
    pub fn delegate(&mut self) -> Result<Signature> {
        self.ledger.ensure_actionable(SettlementStep::Delegate)?;
        let now = unix_now();
        if !self.view.pool.has_ended(now) {
            return Err(SettlementError::PoolStillOpen {
                end_time: self.view.pool.end_time,
                now,
            }
            .into());
        }
        let ix = delegation::delegate_pool(
            &self.wallet.pubkey(),
            &self.pool_address,
            self.view.pool.pool_id,
            &self.tee.validator(),
        )?;
        let sig = self.base.submit(self.wallet, &[ix])?;
        self.finish_step(SettlementStep::Delegate, sig)?;
        Ok(sig)
    }

    /// Step 2: set the resolution price inside the TEE. `final_outcome` is
    /// the already-scaled fixed-point price.
    pub fn resolve(&mut self, final_outcome: u64) -> Result<Signature> {
        self.ledger.ensure_actionable(SettlementStep::Resolve)?;
        let ix = pool_ix::resolve_pool(&self.wallet.pubkey(), &self.pool_address, final_outcome)?;
        let endpoint = self.tee.endpoint(self.wallet)?;
        let sig = endpoint.submit(self.wallet, &[ix])?;
        self.finish_step(SettlementStep::Resolve, sig)?;
        Ok(sig)
    }

    /// Step 3: batch-calculate weights inside the TEE, attaching every known
    /// bet account.
    pub fn calculate_weights(&mut self) -> Result<Signature> {
        self.ledger.ensure_actionable(SettlementStep::CalculateWeights)?;
        if self.bets.is_empty() {
            warn!(pool = %self.pool_address, "calculating weights with no bet accounts");
        }
        let addresses: Vec<Pubkey> = self.bets.iter().map(|b| b.address).collect();
        let ix = pool_ix::batch_calculate_weights(
            &self.wallet.pubkey(),
            &self.pool_address,
            &addresses,
        )?;
        let endpoint = self.tee.endpoint(self.wallet)?;
        let sig = endpoint.submit(self.wallet, &[ix])?;
        self.finish_step(SettlementStep::CalculateWeights, sig)?;
        Ok(sig)
    }

    /// Step 4: flush bets, then the pool, back to the base ledger. Two
    /// transactions, both against the TEE.
    pub fn flush(&mut self) -> Result<(Signature, Signature)> {
        self.ledger.ensure_actionable(SettlementStep::Flush)?;
        let endpoint = self.tee.endpoint(self.wallet)?;

        let addresses: Vec<Pubkey> = self.bets.iter().map(|b| b.address).collect();
        let ix_bets =
            delegation::batch_undelegate_bets(&self.wallet.pubkey(), &self.pool_address, &addresses)?;
        let sig_bets = endpoint.submit(self.wallet, &[ix_bets])?;
        info!(%sig_bets, "bet accounts flushed");

        let ix_pool = delegation::undelegate_pool(&self.wallet.pubkey(), &self.pool_address)?;
        let sig_pool = endpoint.submit(self.wallet, &[ix_pool])?;
        self.finish_step(SettlementStep::Flush, sig_pool)?;
        Ok((sig_bets, sig_pool))
    }

    /// Step 5: finalize weights on the base ledger, creating the treasury
    /// token account first when it does not exist yet.
    pub fn finalize(&mut self) -> Result<Signature> {
        self.ledger.ensure_actionable(SettlementStep::Finalize)?;
        let protocol = self
            .base
            .protocol()?
            .ok_or_else(|| ConsoleError::AccountNotFound(crate::pda::protocol().0))?;

        let treasury_ata =
            get_associated_token_address(&protocol.treasury_wallet, &self.view.pool.token_mint);
        let mut ixs = Vec::with_capacity(2);
        if !self.base.account_exists(&treasury_ata)? {
            ixs.push(create_associated_token_account(
                &self.wallet.pubkey(),
                &protocol.treasury_wallet,
                &self.view.pool.token_mint,
                &spl_token::ID,
            ));
        }
        ixs.push(pool_ix::finalize_weights(
            &self.wallet.pubkey(),
            &self.pool_address,
            &self.view.pool.token_mint,
            &protocol.treasury_wallet,
        )?);

        let sig = self.base.submit(self.wallet, &ixs)?;
        self.finish_step(SettlementStep::Finalize, sig)?;
        Ok(sig)
    }

    /// Authenticated per-bet reveal: fetch each bet from the TEE and report
    /// its prediction, or `None` for bets the TEE keeps sealed.
    pub fn audit(&self) -> Result<Vec<(Pubkey, Option<u64>)>> {
        let endpoint = self.tee.endpoint(self.wallet)?;
        let mut out = Vec::with_capacity(self.bets.len());
        for bet in &self.bets {
            let revealed = endpoint
                .user_bet(&bet.address)
                .ok()
                .flatten()
                .map(|b| b.prediction);
            out.push((bet.address, revealed));
        }
        Ok(out)
    }

    fn finish_step(&mut self, step: SettlementStep, sig: Signature) -> Result<()> {
        info!(step = step.number(), label = step.label(), %sig, "settlement step complete");
        self.ledger.record(step, sig);
        self.refresh()?;
        // The refresh rebuilt flags from chain state; keep the step we just
        // confirmed marked done even if a lagging endpoint has not caught up.
        self.ledger.record(step, sig);
        Ok(())
    }
}

fn observe<W: Wallet + ?Sized>(
    base: &LedgerEndpoint,
    tee: &TeeSession,
    wallet: &W,
    pool_address: &Pubkey,
) -> Result<(ChainView, Vec<BetWithAddress>)> {
    let pool = base
        .pool(pool_address)?
        .ok_or(ConsoleError::AccountNotFound(*pool_address))?;
    let record = delegation_record_pda_from_delegated_account(pool_address);
    let delegated_on_base = base.account_exists(&record)?;

    // An authenticated read that finds no pool is evidence (the TEE flushed
    // it); a failed read is not, and must not be mistaken for one.
    let tee_view = match tee.endpoint(wallet) {
        Ok(endpoint) => match endpoint.pool(pool_address) {
            Ok(Some(served)) => TeeView::Served(served),
            Ok(None) => TeeView::NotServed,
            Err(e) => {
                warn!(error = %e, "tee pool read failed, tee-side progress unknown");
                TeeView::Unavailable
            }
        },
        Err(e) => {
            warn!(error = %e, "tee authentication failed, re-run to sign again");
            TeeView::Unavailable
        }
    };

    let std_raw = base.pool_bets(&crate::ID, pool_address)?;
    let del_raw = base.pool_bets(&DELEGATION_PROGRAM_ID, pool_address)?;
    let bets = merge_bet_accounts(&std_raw, &del_raw);

    Ok((
        ChainView {
            pool,
            delegated_on_base,
            tee: tee_view,
        },
        bets,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(end_time: i64, is_resolved: bool, total_weight: u128, finalized: bool) -> Pool {
        Pool {
            admin: Pubkey::new_unique(),
            pool_id: 1,
            name: "BTC close".into(),
            token_mint: Pubkey::new_unique(),
            start_time: 0,
            end_time,
            vault_balance: 0,
            max_accuracy_buffer: 500_000_000,
            conviction_bonus_bps: 1_000,
            metadata: None,
            resolution_target: 0,
            is_resolved,
            resolution_ts: 0,
            total_weight,
            weight_finalized: finalized,
            bump: 254,
        }
    }

    #[test]
    fn steps_must_run_in_order() {
        let ledger = StepLedger::default();
        assert!(ledger.ensure_actionable(SettlementStep::Delegate).is_ok());
        assert_eq!(
            ledger.ensure_actionable(SettlementStep::CalculateWeights),
            Err(SettlementError::PrerequisiteIncomplete { step: 3, missing: 1 })
        );
        assert_eq!(
            ledger.ensure_actionable(SettlementStep::Finalize),
            Err(SettlementError::PrerequisiteIncomplete { step: 5, missing: 1 })
        );
    }

    #[test]
    fn calculate_requires_resolve_specifically() {
        let mut ledger = StepLedger::default();
        ledger.record(SettlementStep::Delegate, Signature::default());
        assert_eq!(
            ledger.ensure_actionable(SettlementStep::CalculateWeights),
            Err(SettlementError::PrerequisiteIncomplete { step: 3, missing: 2 })
        );
        ledger.record(SettlementStep::Resolve, Signature::default());
        assert!(ledger.ensure_actionable(SettlementStep::CalculateWeights).is_ok());
    }

    #[test]
    fn completed_steps_are_not_rebuildable() {
        let mut ledger = StepLedger::default();
        ledger.record(SettlementStep::Delegate, Signature::default());
        assert_eq!(
            ledger.ensure_actionable(SettlementStep::Delegate),
            Err(SettlementError::AlreadyComplete(1))
        );
        assert_eq!(ledger.next_actionable(), Some(SettlementStep::Resolve));
    }

    #[test]
    fn recorded_signatures_are_retrievable() {
        let mut ledger = StepLedger::default();
        assert_eq!(ledger.signature(SettlementStep::Delegate), None);
        let sig = Signature::from([7u8; 64]);
        ledger.record(SettlementStep::Delegate, sig);
        assert_eq!(ledger.signature(SettlementStep::Delegate), Some(sig));
        assert_eq!(ledger.signature(SettlementStep::Resolve), None);
    }

    #[test]
    fn flags_from_base_ledger_alone() {
        // Delegated, TEE serves the unresolved pool: only step 1 done.
        let view = ChainView {
            pool: pool(100, false, 0, false),
            delegated_on_base: true,
            tee: TeeView::Served(pool(100, false, 0, false)),
        };
        assert_eq!(view.derive_flags(), [true, false, false, false, false]);

        // Resolved and no delegation record: flushed, predecessors implied.
        let view = ChainView {
            pool: pool(100, true, 50, false),
            delegated_on_base: false,
            tee: TeeView::NotServed,
        };
        assert_eq!(view.derive_flags(), [true, true, true, true, false]);

        // Finalized: everything done.
        let view = ChainView {
            pool: pool(100, true, 50, true),
            delegated_on_base: false,
            tee: TeeView::NotServed,
        };
        assert_eq!(view.derive_flags(), [true; 5]);
    }

    #[test]
    fn tee_view_drives_middle_steps() {
        let view = ChainView {
            pool: pool(100, false, 0, false),
            delegated_on_base: true,
            tee: TeeView::Served(pool(100, true, 75, false)),
        };
        let flags = view.derive_flags();
        assert!(flags[1], "tee resolution observed");
        assert!(flags[2], "tee weights observed");
        assert!(!flags[4]);
    }

    #[test]
    fn vanished_tee_pool_means_already_flushed() {
        let view = ChainView {
            pool: pool(100, true, 0, false),
            delegated_on_base: true,
            tee: TeeView::NotServed,
        };
        let flags = view.derive_flags();
        assert_eq!(flags, [true, true, true, true, false]);
    }

    #[test]
    fn failed_tee_read_does_not_fake_progress() {
        // Freshly delegated, unresolved pool with an unreachable TEE: steps
        // 2-4 stay incomplete and finalize remains locked.
        let view = ChainView {
            pool: pool(100, false, 0, false),
            delegated_on_base: true,
            tee: TeeView::Unavailable,
        };
        assert_eq!(view.derive_flags(), [true, false, false, false, false]);

        let mut ledger = StepLedger::default();
        ledger.absorb_flags(view.derive_flags());
        assert_eq!(
            ledger.ensure_actionable(SettlementStep::Finalize),
            Err(SettlementError::PrerequisiteIncomplete { step: 5, missing: 2 })
        );
        assert_eq!(ledger.next_actionable(), Some(SettlementStep::Resolve));

        // Base-ledger facts still count even when the TEE is unreachable.
        let flushed = ChainView {
            pool: pool(100, true, 0, false),
            delegated_on_base: false,
            tee: TeeView::Unavailable,
        };
        assert_eq!(flushed.derive_flags(), [true, true, true, true, false]);
    }

    #[test]
    fn stage_progression() {
        let open = ChainView {
            pool: pool(1_000, false, 0, false),
            delegated_on_base: false,
            tee: TeeView::NotServed,
        };
        assert_eq!(open.stage(500), PoolStage::Open);
        assert_eq!(open.stage(2_000), PoolStage::Ended);

        let delegated = ChainView {
            pool: pool(1_000, false, 0, false),
            delegated_on_base: true,
            tee: TeeView::Served(pool(1_000, false, 0, false)),
        };
        assert_eq!(delegated.stage(2_000), PoolStage::Delegated);

        let finalized = ChainView {
            pool: pool(1_000, true, 10, true),
            delegated_on_base: false,
            tee: TeeView::NotServed,
        };
        assert_eq!(finalized.stage(2_000), PoolStage::Finalized);
    }
}
