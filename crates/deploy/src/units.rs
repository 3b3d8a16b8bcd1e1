//! Ether unit conversions.

use alloy_core::primitives::{U256, utils::format_ether};
use anyhow::Context;

/// Number of wei in one gwei.
const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Decimal places kept when converting an ether literal.
const GWEI_DECIMALS: usize = 9;

/// Parse a decimal ether literal (e.g. `1.5`) into wei.
///
/// The literal is scaled to gwei first and then to wei, so at most 9 fractional digits are
/// significant. Extra digits are truncated.
pub fn parse_ether(literal: &str) -> anyhow::Result<U256> {
    let literal = literal.trim();
    let (whole, fraction) = literal.split_once('.').unwrap_or((literal, ""));

    if whole.is_empty() && fraction.is_empty() {
        anyhow::bail!("Invalid ether amount: '{}'", literal);
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        anyhow::bail!("Invalid ether amount: '{}'", literal);
    }

    let fraction: String = fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(GWEI_DECIMALS)
        .collect();
    let digits = format!("{}{}", whole, fraction);

    let gwei = U256::from_str_radix(&digits, 10)
        .with_context(|| format!("Ether amount out of range: '{}'", literal))?;

    gwei.checked_mul(U256::from(WEI_PER_GWEI))
        .with_context(|| format!("Ether amount out of range: '{}'", literal))
}

/// Format a wei amount as a `0x`-prefixed hex quantity.
pub fn to_hex_quantity(value: U256) -> String {
    format!("0x{:x}", value)
}

/// Convert a gwei fee setting into wei.
///
/// Fees are configured as floats (e.g. `1.2` gwei); they are rounded to whole wei.
pub fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei * WEI_PER_GWEI as f64).round() as u128
}

/// Render a wei balance in ether for log output.
pub fn display_ether(wei: U256) -> String {
    format_ether(wei)
}
