use num::{BigUint, Zero};

use crate::blocks::block::CanonicalHeader;
use crate::error::{Error, Result};

pub const TARGET_LEN_BYTES: usize = 32;

/// Target T := mantissa * 256^(exponent - 3)
/// `bits` is the compact encoding in provider order: one exponent byte, then a 3 byte mantissa.
pub fn decode_target(bits: &str) -> Result<BigUint> {
    if bits.len() != 8 {
        return Err(Error::bad_bits(bits, "expected exactly 4 bytes of hex"));
    }
    let raw = hex::decode(bits).map_err(|e| Error::bad_bits(bits, e.to_string()))?;

    let exponent = raw[0] as u32;
    let mantissa = BigUint::from_bytes_be(&raw[1..4]);
    let target = if exponent <= 3 {
        mantissa >> (8 * (3 - exponent) as usize)
    } else {
        mantissa << (8 * (exponent - 3) as usize)
    };

    if target.bits() > (TARGET_LEN_BYTES * 8) as u64 {
        return Err(Error::bad_bits(bits, "target exceeds 256 bits"));
    }
    Ok(target)
}

/// Zero-padded 256-bit big-endian bytes of a target.
pub fn target_to_bytes(target: &BigUint) -> Result<[u8; TARGET_LEN_BYTES]> {
    let be = target.to_bytes_be();
    if be.len() > TARGET_LEN_BYTES {
        return Err(Error::bad_bits(
            &format!("{target:x}"),
            "target exceeds 256 bits",
        ));
    }
    let mut out = [0u8; TARGET_LEN_BYTES];
    if !target.is_zero() {
        out[TARGET_LEN_BYTES - be.len()..].copy_from_slice(&be);
    }
    Ok(out)
}

/// Valid blocks must satisfy SHA256d(block) <= T
pub fn check_proof_of_work(header: &CanonicalHeader, target: &BigUint) -> bool {
    header.hash().to_biguint() <= *target
}
