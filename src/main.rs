use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;
use tracing_subscriber::EnvFilter;

use swiv_console::config::Config;
use swiv_console::instructions::{admin, delegation, pool as pool_ix};
use swiv_console::payout::{self, ParticipantStatus, PredictionView};
use swiv_console::settlement::{SettlementRun, SettlementStep, TeeView};
use swiv_console::store::{new_request_id, SessionStore};
use swiv_console::tee::TeeSession;
use swiv_console::units::{format_fixed, format_fixed_signed, parse_fixed};
use swiv_console::wallet::{KeypairWallet, Wallet};

#[derive(Parser)]
#[command(name = "swiv-console", version, about = "Operator console for the swiv privacy parimutuel protocol")]
struct Cli {
    /// Path to the TOML config; missing file means built-in devnet defaults.
    #[arg(long, global = true, default_value = "swiv-console.toml")]
    config: PathBuf,

    /// TEE region label (eu, as, us). Defaults to the first configured one.
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show protocol state and the connected wallet.
    Status,
    /// Write the default config to the config path.
    InitConfig,
    /// List every pool on the base ledger.
    Pools,
    /// Per-participant payout projection for a pool.
    Payouts { pool: Pubkey },
    /// Reveal predictions for a pool's bets through the authenticated TEE.
    Audit { pool: Pubkey },
    /// Drive the five-step settlement workflow for a pool.
    Settle {
        pool: Pubkey,
        #[command(subcommand)]
        step: SettleCommand,
    },
    /// Initialize the protocol account (one-time bootstrap).
    InitProtocol {
        #[arg(long)]
        treasury: Pubkey,
        #[arg(long)]
        fee_bps: u64,
    },
    /// Create a new prediction pool.
    CreatePool {
        #[arg(long)]
        name: String,
        /// Token mint; defaults to the mint of the last created pool.
        #[arg(long)]
        mint: Option<Pubkey>,
        /// Unix seconds; defaults to now.
        #[arg(long)]
        start: Option<i64>,
        /// Unix seconds when betting closes.
        #[arg(long)]
        end: i64,
        /// Max accuracy buffer as a decimal price distance, e.g. "0.5".
        #[arg(long, default_value = "0.5")]
        buffer: String,
        #[arg(long, default_value_t = swiv_console::constants::DEFAULT_CONVICTION_BONUS_BPS)]
        bonus_bps: u64,
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Update protocol treasury and/or fee.
    UpdateConfig {
        #[arg(long)]
        treasury: Option<Pubkey>,
        #[arg(long)]
        fee_bps: Option<u64>,
    },
    /// Pause or resume the protocol.
    Pause {
        #[arg(long)]
        resume: bool,
    },
    /// Hand protocol admin to another key.
    TransferAdmin { new_admin: Pubkey },
    /// Place a bet: deposit on the base ledger, prediction inside the TEE.
    Bet {
        #[arg(long)]
        pool: Pubkey,
        /// Deposit amount as a decimal token amount, e.g. "25".
        #[arg(long)]
        amount: String,
        /// Predicted price as a decimal, e.g. "200.50".
        #[arg(long)]
        prediction: String,
    },
    /// Change the prediction of a delegated bet inside the TEE.
    UpdateBet {
        #[arg(long)]
        pool: Pubkey,
        #[arg(long)]
        bet: Pubkey,
        #[arg(long)]
        prediction: String,
    },
    /// Claim payouts of finalized bets; all claim-ready bets in the pool
    /// unless --bet narrows it to one.
    Claim {
        #[arg(long)]
        pool: Pubkey,
        #[arg(long)]
        bet: Option<Pubkey>,
    },
}

#[derive(Subcommand)]
enum SettleCommand {
    /// Show which steps are complete and what runs next.
    Status,
    /// Step 1: delegate the pool to the TEE validator.
    Delegate,
    /// Step 2: set the resolution price, e.g. --price 201.35
    Resolve {
        #[arg(long)]
        price: String,
    },
    /// Step 3: batch-calculate bet weights.
    Calculate,
    /// Step 4: flush bets and pool back to the base ledger.
    Flush,
    /// Step 5: finalize weights and collect the protocol fee.
    Finalize,
}

fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

struct Console {
    config: Config,
    wallet: KeypairWallet,
    base: swiv_console::rpc::LedgerEndpoint,
    tee: TeeSession,
}

impl Console {
    fn open(cli: &Cli) -> anyhow::Result<Self> {
        let config = Config::load(&cli.config)?;
        let wallet = KeypairWallet::load(&config.keypair_path())
            .context("loading signing keypair; set keypair_path in the config")?;
        let base = config.base_endpoint()?;
        let tee = config.tee_session(cli.region.as_deref())?;
        Ok(Self {
            config,
            wallet,
            base,
            tee,
        })
    }

    fn store(&self) -> anyhow::Result<SessionStore> {
        Ok(SessionStore::open(&self.config.session_path())?)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if let Command::InitConfig = &cli.command {
        let config = Config::default();
        config.save(&cli.config)?;
        println!("wrote defaults to {}", cli.config.display());
        return Ok(());
    }

    let console = Console::open(&cli)?;
    match cli.command {
        Command::InitConfig => unreachable!("handled above"),
        Command::Status => cmd_status(&console),
        Command::Pools => cmd_pools(&console),
        Command::Payouts { pool } => cmd_payouts(&console, &pool),
        Command::Audit { pool } => cmd_audit(&console, &pool),
        Command::Settle { pool, step } => cmd_settle(&console, &pool, step),
        Command::InitProtocol { treasury, fee_bps } => {
            let ix = admin::initialize_protocol(&console.wallet.pubkey(), &treasury, fee_bps)?;
            let sig = console.base.submit(&console.wallet, &[ix])?;
            println!("protocol initialized: {sig}");
            Ok(())
        }
        Command::UpdateConfig { treasury, fee_bps } => {
            if treasury.is_none() && fee_bps.is_none() {
                bail!("nothing to update; pass --treasury and/or --fee-bps");
            }
            let ix = admin::update_config(&console.wallet.pubkey(), treasury, fee_bps)?;
            let sig = console.base.submit(&console.wallet, &[ix])?;
            println!("config updated: {sig}");
            Ok(())
        }
        Command::Pause { resume } => {
            let ix = admin::set_pause(&console.wallet.pubkey(), !resume)?;
            let sig = console.base.submit(&console.wallet, &[ix])?;
            println!("{}: {sig}", if resume { "resumed" } else { "paused" });
            Ok(())
        }
        Command::TransferAdmin { new_admin } => {
            let ix = admin::transfer_admin(&console.wallet.pubkey(), new_admin)?;
            let sig = console.base.submit(&console.wallet, &[ix])?;
            println!("admin transferred to {new_admin}: {sig}");
            Ok(())
        }
        Command::CreatePool {
            name,
            mint,
            start,
            end,
            buffer,
            bonus_bps,
            metadata,
        } => cmd_create_pool(&console, name, mint, start, end, &buffer, bonus_bps, metadata),
        Command::Bet {
            pool,
            amount,
            prediction,
        } => cmd_bet(&console, &pool, &amount, &prediction),
        Command::UpdateBet {
            pool,
            bet,
            prediction,
        } => {
            let target = parse_fixed(&prediction)?;
            let ix = pool_ix::update_bet(&console.wallet.pubkey(), &pool, &bet, target)?;
            let endpoint = console.tee.endpoint(&console.wallet)?;
            let sig = endpoint.submit(&console.wallet, &[ix])?;
            println!("prediction updated: {sig}");
            Ok(())
        }
        Command::Claim { pool, bet } => cmd_claim(&console, &pool, bet),
    }
}

fn cmd_status(console: &Console) -> anyhow::Result<()> {
    println!("wallet   {}", console.wallet.pubkey());
    println!("rpc      {}", console.base.url());
    println!("tee      {} ({})", console.tee.region().label, console.tee.region().url);

    match console.base.protocol()? {
        None => {
            println!("protocol not initialized; run `swiv-console init-protocol`");
        }
        Some(protocol) => {
            println!("admin    {}", protocol.admin);
            println!("treasury {}", protocol.treasury_wallet);
            println!("fee      {} bps", protocol.protocol_fee_bps);
            println!("paused   {}", protocol.paused);
            println!("pools    {}", protocol.total_pools);
        }
    }
    Ok(())
}

fn cmd_pools(console: &Console) -> anyhow::Result<()> {
    let pools = console.base.pools()?;
    if pools.is_empty() {
        println!("no pools");
        return Ok(());
    }
    let now = unix_now();
    for (address, pool) in pools {
        let phase = if pool.weight_finalized {
            "finalized"
        } else if pool.is_resolved {
            "resolved"
        } else if pool.has_ended(now) {
            "ended"
        } else {
            "open"
        };
        println!(
            "{address}  #{id:<4} {name:<24} vault {vault:>12}  ends {end}  {phase}",
            id = pool.pool_id,
            name = pool.name,
            vault = format_fixed(pool.vault_balance),
            end = pool.end_time,
        );
    }
    Ok(())
}

fn cmd_payouts(console: &Console, pool_address: &Pubkey) -> anyhow::Result<()> {
    let pool = console
        .base
        .pool(pool_address)?
        .with_context(|| format!("pool {pool_address} not found"))?;
    let fee_bps = console
        .base
        .protocol()?
        .map(|p| p.protocol_fee_bps)
        .unwrap_or(0);

    let run = SettlementRun::load(&console.base, &console.tee, &console.wallet, *pool_address)?;
    let rows = payout::aggregate(&pool, fee_bps, run.bets())?;

    println!(
        "pool {name}: vault {vault}, fee {fee_bps} bps, net {net}",
        name = pool.name,
        vault = format_fixed(pool.vault_balance),
        net = format_fixed(payout::net_distributable(pool.vault_balance, fee_bps)),
    );
    if rows.is_empty() {
        println!("no participants");
        return Ok(());
    }
    for row in rows {
        let predictions: Vec<String> = row
            .predictions
            .iter()
            .map(|p| match p {
                PredictionView::Hidden => "hidden".to_string(),
                PredictionView::Revealed(v) => format_fixed(*v),
            })
            .collect();
        let status = match row.status {
            ParticipantStatus::Pending => "pending",
            ParticipantStatus::Won => "won",
            ParticipantStatus::Lost => "lost",
        };
        let payout = row.payout.map(format_fixed).unwrap_or_else(|| "-".into());
        let profit = row
            .profit
            .map(format_fixed_signed)
            .unwrap_or_else(|| "-".into());
        println!(
            "{owner}  bets {count}  deposit {deposit:>10}  [{predictions}]  {status:<7}  payout {payout:>10}  profit {profit}",
            owner = row.owner,
            count = row.bet_count,
            deposit = format_fixed(row.total_deposit),
            predictions = predictions.join(", "),
        );
    }
    Ok(())
}

fn cmd_audit(console: &Console, pool_address: &Pubkey) -> anyhow::Result<()> {
    let run = SettlementRun::load(&console.base, &console.tee, &console.wallet, *pool_address)?;
    let revealed = run.audit()?;
    if revealed.is_empty() {
        println!("no bet accounts");
        return Ok(());
    }
    for (address, prediction) in revealed {
        match prediction {
            Some(v) => println!("{address}  prediction {}", format_fixed(v)),
            None => println!("{address}  sealed"),
        }
    }
    Ok(())
}

fn cmd_settle(console: &Console, pool_address: &Pubkey, step: SettleCommand) -> anyhow::Result<()> {
    let mut run = SettlementRun::load(&console.base, &console.tee, &console.wallet, *pool_address)?;
    match step {
        SettleCommand::Status => {
            println!("pool {pool_address} stage: {:?}", run.stage());
            if matches!(run.view().tee, TeeView::Unavailable) {
                println!("warning: tee unreachable, tee-side steps shown as incomplete");
            }
            for s in SettlementStep::ALL {
                let mark = if run.ledger().is_done(s) { "x" } else { " " };
                match run.ledger().signature(s) {
                    Some(sig) => println!("  [{mark}] {}. {}  {sig}", s.number(), s.label()),
                    None => println!("  [{mark}] {}. {}", s.number(), s.label()),
                }
            }
            match run.ledger().next_actionable() {
                Some(next) => println!("next: step {} ({})", next.number(), next.label()),
                None => println!("settlement complete"),
            }
        }
        SettleCommand::Delegate => {
            let sig = run.delegate()?;
            println!("delegated: {sig}");
        }
        SettleCommand::Resolve { price } => {
            let final_outcome = parse_fixed(&price)?;
            let sig = run.resolve(final_outcome)?;
            println!("resolved at {}: {sig}", format_fixed(final_outcome));
        }
        SettleCommand::Calculate => {
            let sig = run.calculate_weights()?;
            println!("weights calculated for {} bets: {sig}", run.bets().len());
        }
        SettleCommand::Flush => {
            let (bets_sig, pool_sig) = run.flush()?;
            println!("bets flushed: {bets_sig}");
            println!("pool flushed: {pool_sig}");
        }
        SettleCommand::Finalize => {
            let sig = run.finalize()?;
            println!("finalized: {sig}");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_create_pool(
    console: &Console,
    name: String,
    mint: Option<Pubkey>,
    start: Option<i64>,
    end: i64,
    buffer: &str,
    bonus_bps: u64,
    metadata: Option<String>,
) -> anyhow::Result<()> {
    let protocol = console
        .base
        .protocol()?
        .context("protocol not initialized; run `swiv-console init-protocol` first")?;
    let mut store = console.store()?;
    let mint = mint
        .or_else(|| store.last_token_mint())
        .context("no --mint given and no previous mint remembered")?;
    let start = start.unwrap_or_else(unix_now);
    if end <= start {
        bail!("pool would end at {end}, before it starts at {start}");
    }
    let buffer = parse_fixed(buffer)?;

    // Pool ids are sequential; the next one is the current pool count.
    let pool_id = protocol.total_pools;
    let ix = pool_ix::create_pool(
        &console.wallet.pubkey(),
        pool_id,
        name.clone(),
        metadata,
        start,
        end,
        buffer,
        bonus_bps,
        &mint,
    )?;
    let sig = console.base.submit(&console.wallet, &[ix])?;
    let (address, _) = swiv_console::pda::pool(&console.wallet.pubkey(), pool_id);
    println!("pool #{pool_id} {name:?} created at {address}: {sig}");

    store.remember_token_mint(&mint)?;
    Ok(())
}

fn cmd_bet(console: &Console, pool_address: &Pubkey, amount: &str, prediction: &str) -> anyhow::Result<()> {
    let pool = console
        .base
        .pool(pool_address)?
        .with_context(|| format!("pool {pool_address} not found"))?;
    let now = unix_now();
    if !pool.is_open(now) {
        bail!("pool {:?} is not open for betting", pool.name);
    }
    let amount = parse_fixed(amount)?;
    let prediction = parse_fixed(prediction)?;
    let user = console.wallet.pubkey();
    let permission_program = console.config.permission_program()?;
    let validator = console.tee.validator();

    let mut store = console.store()?;
    let request_id = match store.pending_bet(pool_address).cloned() {
        // A previous run stopped after the deposit; resume with the same id.
        Some(pending) => {
            println!("resuming pending bet {}", pending.request_id);
            pending.request_id
        }
        None => {
            let request_id = new_request_id();
            let ixs = vec![
                pool_ix::init_bet(&user, pool_address, &pool.token_mint, amount, &request_id)?,
                delegation::create_bet_permission(
                    &user,
                    &user,
                    pool_address,
                    &permission_program,
                    &request_id,
                )?,
                delegation::delegate_bet_permission(
                    &user,
                    pool_address,
                    &validator,
                    &permission_program,
                    &request_id,
                )?,
                delegation::delegate_bet(&user, pool_address, &validator, &request_id)?,
            ];
            let sig = console.base.submit(&console.wallet, &ixs)?;
            println!("deposit placed and bet delegated: {sig}");
            store.record_pending_bet(pool_address, &request_id, now)?;
            request_id
        }
    };

    let ix = pool_ix::place_bet(&user, pool_address, prediction, &request_id)?;
    let endpoint = console.tee.endpoint(&console.wallet)?;
    let sig = endpoint.submit(&console.wallet, &[ix])?;
    store.clear_pending_bet(pool_address)?;

    let (bet_address, _) = swiv_console::pda::user_bet(pool_address, &user, &request_id);
    println!("prediction sealed in bet {bet_address}: {sig}");
    Ok(())
}

fn cmd_claim(console: &Console, pool_address: &Pubkey, only: Option<Pubkey>) -> anyhow::Result<()> {
    let pool = console
        .base
        .pool(pool_address)?
        .with_context(|| format!("pool {pool_address} not found"))?;
    if !pool.weight_finalized {
        bail!("pool {:?} is not finalized yet", pool.name);
    }

    let user = console.wallet.pubkey();
    let raws = console.base.pool_bets(&swiv_console::ID, pool_address)?;
    let merged = swiv_console::accounts::merge_bet_accounts(&raws, &[]);
    let claimable: Vec<_> = merged
        .iter()
        .filter(|b| b.bet.owner == user)
        .filter(|b| only.map_or(true, |wanted| b.address == wanted))
        .filter(|b| b.bet.is_claim_ready(pool.weight_finalized))
        .collect();
    if claimable.is_empty() {
        bail!("no claim-ready bets for {user} in this pool");
    }

    let mut ixs = Vec::with_capacity(claimable.len());
    for entry in &claimable {
        ixs.push(pool_ix::claim_reward(
            &user,
            pool_address,
            &entry.address,
            &pool.token_mint,
        )?);
    }
    let sig = console.base.submit(&console.wallet, &ixs)?;
    println!("claimed {} bet(s): {sig}", claimable.len());
    Ok(())
}
