//! Fixed-point conversion between human-readable decimal strings and the
//! scaled integers the contract works in.
//!
//! Everything on-chain is a u64 scaled by [`PRICE_SCALE`] (6 decimal
//! places). Parsing is plain integer string arithmetic; floats never touch
//! an amount that ends up in an instruction.

use crate::constants::{PRICE_DECIMALS, PRICE_SCALE};
use crate::errors::UnitsError;

/// Parse a decimal string such as `"200.50"` into its scaled representation
/// (`200_500_000`).
pub fn parse_fixed(input: &str) -> Result<u64, UnitsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(UnitsError::Empty);
    }
    if frac.len() > PRICE_DECIMALS as usize {
        return Err(UnitsError::TooManyDecimals(input.to_string()));
    }

    let digits = |s: &str| -> Result<u64, UnitsError> {
        if s.is_empty() {
            return Ok(0);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UnitsError::InvalidDigit(input.to_string()));
        }
        s.parse::<u64>()
            .map_err(|_| UnitsError::Overflow(input.to_string()))
    };

    let whole = digits(whole)?;
    let mut frac_scaled = digits(frac)?;
    for _ in frac.len()..PRICE_DECIMALS as usize {
        frac_scaled *= 10;
    }

    whole
        .checked_mul(PRICE_SCALE)
        .and_then(|w| w.checked_add(frac_scaled))
        .ok_or_else(|| UnitsError::Overflow(input.to_string()))
}

/// Format a scaled integer back into a decimal string, trimming trailing
/// zeros ("200.5", "37").
pub fn format_fixed(value: u64) -> String {
    let whole = value / PRICE_SCALE;
    let frac = value % PRICE_SCALE;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:06}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Format a signed scaled value with an explicit sign, as the profit column
/// renders it.
pub fn format_fixed_signed(value: i128) -> String {
    let magnitude = value.unsigned_abs().min(u64::MAX as u128) as u64;
    if value < 0 {
        format!("-{}", format_fixed(magnitude))
    } else {
        format!("+{}", format_fixed(magnitude))
    }
}
