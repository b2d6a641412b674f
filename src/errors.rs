use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Top-level error surface of the console.
///
/// The taxonomy mirrors how failures are handled: wallet and TEE-auth errors
/// prompt the operator to reconnect or re-sign, transport errors are retried
/// manually, decode and settlement errors indicate state the operator must
/// look at. No variant is fatal; every path leaves local state untouched.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("wallet error: {0}")]
    Wallet(String),

    #[error("rpc error: {0}")]
    Rpc(#[from] Box<solana_client::client_error::ClientError>),

    #[error("transaction {0} was not confirmed before the retry budget ran out")]
    ConfirmationTimeout(Signature),

    #[error("transaction {signature} failed on chain: {reason}")]
    TransactionFailed { signature: Signature, reason: String },

    #[error("tee authentication failed: {0}")]
    TeeAuth(String),

    #[error("account {0} does not exist")]
    AccountNotFound(Pubkey),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error(transparent)]
    Units(#[from] UnitsError),

    #[error(transparent)]
    Payout(#[from] PayoutError),

    #[error("failed to compile transaction message: {0}")]
    Compile(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<solana_client::client_error::ClientError> for ConsoleError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        ConsoleError::Rpc(Box::new(err))
    }
}

/// Typed account decoding errors; replaces the duck-typed decode-by-name the
/// old dashboard did.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("account data too short for a discriminator ({0} bytes)")]
    TooShort(usize),

    #[error("unknown account discriminator {0:02x?}")]
    UnknownDiscriminator([u8; 8]),

    #[error("failed to deserialize {kind} account: {reason}")]
    Corrupt { kind: &'static str, reason: String },
}

/// Violations of the settlement workflow ordering.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    #[error("step {0} is already complete")]
    AlreadyComplete(u8),

    #[error("step {step} requires step {missing} to be complete first")]
    PrerequisiteIncomplete { step: u8, missing: u8 },

    #[error("pool is still open (ends at {end_time}, now {now})")]
    PoolStillOpen { end_time: i64, now: i64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,

    #[error("invalid character in amount {0:?}")]
    InvalidDigit(String),

    #[error("at most 6 decimal places are supported, got {0:?}")]
    TooManyDecimals(String),

    #[error("amount {0:?} does not fit into 64 bits once scaled")]
    Overflow(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayoutError {
    #[error("arithmetic overflow while computing payouts")]
    MathOverflow,
}
