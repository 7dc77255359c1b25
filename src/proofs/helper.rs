use num::BigUint;

use crate::error::{Error, Result};

/// Width of every value handed to the verifier contract.
pub const WORD_HEX_DIGITS: usize = 64;

// Decimal field element -> 0x-prefixed uint256 hex
pub fn decimal_to_hex(decimal: &str) -> Result<String> {
    let value = BigUint::parse_bytes(decimal.as_bytes(), 10)
        .filter(|_| !decimal.is_empty() && decimal.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::ProverFailure(format!("{decimal:?} is not a decimal integer")))?;
    if value.bits() > (WORD_HEX_DIGITS * 4) as u64 {
        return Err(Error::ProverFailure(format!(
            "{decimal} does not fit in 256 bits"
        )));
    }
    Ok(format!("0x{:0width$x}", value, width = WORD_HEX_DIGITS))
}

pub fn decimals_to_hex(decimals: &[String]) -> Result<Vec<String>> {
    decimals.iter().map(|d| decimal_to_hex(d)).collect()
}
