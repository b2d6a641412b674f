//! Operator console for the swiv privacy parimutuel protocol.
//!
//! The protocol itself lives in an on-chain program plus a TEE delegation
//! layer (MagicBlock ephemeral rollups); this crate only reads accounts,
//! assembles signed transactions against the two RPC surfaces and derives
//! client-side views: the five-step settlement workflow and the per-user
//! payout projection.

use anchor_lang::prelude::*;

pub mod accounts;
pub mod config;
pub mod constants;
pub mod errors;
pub mod instructions;
pub mod payout;
pub mod pda;
pub mod rpc;
pub mod settlement;
pub mod state;
pub mod store;
pub mod tee;
pub mod units;
pub mod wallet;

declare_id!("Hf1uWhQTGCBrk3ym4sfiDcm9RXTR17WoyibQFmqy8Q54");

pub use errors::{ConsoleError, Result};
