use solana_sdk::pubkey::Pubkey;

pub const SEED_PROTOCOL: &[u8] = b"protocol";
pub const SEED_POOL: &[u8] = b"pool";
pub const SEED_POOL_VAULT: &[u8] = b"pool_vault";
pub const SEED_BET: &[u8] = b"user_bet";
pub const SEED_PERMISSION: &[u8] = b"permission";

/// All on-chain prices and token amounts carry 6 decimal places.
pub const PRICE_SCALE: u64 = 1_000_000;
pub const PRICE_DECIMALS: u32 = 6;

pub const BPS_DENOMINATOR: u64 = 10_000;

/// Conviction bonus forwarded to create_pool; the dashboard always used the
/// contract default.
pub const DEFAULT_CONVICTION_BONUS_BPS: u64 = 1_000;

/// MagicBlock permission program guarding delegated bet accounts.
/// Devnet deployment; overridable through the config file.
pub const PERMISSION_PROGRAM_ID: Pubkey =
    solana_sdk::pubkey!("Perm111111111111111111111111111111111111111");
