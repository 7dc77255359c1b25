use serde::{Deserialize, Serialize};

use crate::blocks::hash::{self, ChainHash, HASH_LEN_BYTES};
use crate::error::{Error, Result};

pub const HEADER_SIZE_BYTES: usize = 80;

/// Block header as returned by a node's `getblockheader` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHeader {
    pub height: u64,
    #[serde(rename = "versionHex")]
    pub version_hex: String,
    #[serde(rename = "previousblockhash", default, skip_serializing_if = "Option::is_none")]
    pub previous_block_hash: Option<String>,
    #[serde(rename = "merkleroot")]
    pub merkle_root: String,
    pub time: u64,
    pub bits: String,
    pub nonce: u64,
}

impl RawHeader {
    /// Parse a provider response, reporting missing or mistyped fields as `MalformedHeader`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let height = value.get("height").and_then(|h| h.as_u64());
        RawHeader::deserialize(value).map_err(|e| Error::malformed(height, e.to_string()))
    }
}

/// Strict 80-byte header layout. Every field is stored in little-endian wire order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub version: [u8; 4],
    pub prev_hash: [u8; HASH_LEN_BYTES],
    pub merkle_root: [u8; HASH_LEN_BYTES],
    pub time: [u8; 4],
    pub bits: [u8; 4],
    pub nonce: [u8; 4],
}

/// Unhex a provider field and reverse it into wire order.
/// With `pad`, short values are zero-filled on the left first; values that are too long never fit.
fn reversed_field<const N: usize>(
    value: &str,
    name: &str,
    pad: bool,
    height: Option<u64>,
) -> Result<[u8; N]> {
    let width = N * 2;
    if value.len() > width || (!pad && value.len() != width) {
        return Err(Error::malformed(
            height,
            format!("{name} {value:?} does not fit {N} bytes"),
        ));
    }
    let padded = format!("{value:0>width$}");
    let mut bytes = hex::decode(&padded)
        .map_err(|e| Error::malformed(height, format!("{name} {value:?} is not hex: {e}")))?;
    bytes.reverse();
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn u32_field(value: u64, name: &str, height: Option<u64>) -> Result<[u8; 4]> {
    let v = u32::try_from(value).map_err(|_| {
        Error::malformed(height, format!("{name} {value} does not fit 4 bytes"))
    })?;
    Ok(v.to_le_bytes())
}

/// Turn a provider header into its canonical byte layout.
/// A missing previous hash (genesis) becomes 32 zero bytes.
pub fn canonicalize(raw: &RawHeader) -> Result<CanonicalHeader> {
    let height = Some(raw.height);
    let prev_hash = match &raw.previous_block_hash {
        Some(prev) => reversed_field(prev, "previousblockhash", false, height)?,
        None => [0u8; HASH_LEN_BYTES],
    };

    Ok(CanonicalHeader {
        version: reversed_field(&raw.version_hex, "versionHex", true, height)?,
        prev_hash,
        merkle_root: reversed_field(&raw.merkle_root, "merkleroot", false, height)?,
        time: u32_field(raw.time, "time", height)?,
        bits: reversed_field(&raw.bits, "bits", true, height)?,
        nonce: u32_field(raw.nonce, "nonce", height)?,
    })
}

impl CanonicalHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE_BYTES] {
        let mut bytes = [0u8; HEADER_SIZE_BYTES];
        bytes[0..4].copy_from_slice(&self.version);
        bytes[4..36].copy_from_slice(&self.prev_hash);
        bytes[36..68].copy_from_slice(&self.merkle_root);
        bytes[68..72].copy_from_slice(&self.time);
        bytes[72..76].copy_from_slice(&self.bits);
        bytes[76..80].copy_from_slice(&self.nonce);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE_BYTES {
            return Err(Error::malformed(
                None,
                format!("header is {} bytes, expected {HEADER_SIZE_BYTES}", bytes.len()),
            ));
        }
        let mut header = CanonicalHeader {
            version: [0u8; 4],
            prev_hash: [0u8; HASH_LEN_BYTES],
            merkle_root: [0u8; HASH_LEN_BYTES],
            time: [0u8; 4],
            bits: [0u8; 4],
            nonce: [0u8; 4],
        };
        header.version.copy_from_slice(&bytes[0..4]);
        header.prev_hash.copy_from_slice(&bytes[4..36]);
        header.merkle_root.copy_from_slice(&bytes[36..68]);
        header.time.copy_from_slice(&bytes[68..72]);
        header.bits.copy_from_slice(&bytes[72..76]);
        header.nonce.copy_from_slice(&bytes[76..80]);
        Ok(header)
    }

    pub fn from_hex(header_hex: &str) -> Result<Self> {
        let bytes = hex::decode(header_hex)
            .map_err(|e| Error::malformed(None, format!("header is not hex: {e}")))?;
        CanonicalHeader::from_bytes(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn to_hex_vec(headers: &[CanonicalHeader]) -> Vec<String> {
        headers.iter().map(|h| h.to_hex()).collect()
    }

    pub fn hash(&self) -> ChainHash {
        hash::hash(self)
    }

    pub fn prev_hash(&self) -> ChainHash {
        ChainHash::from_digest(self.prev_hash)
    }

    /// Compact difficulty in the provider's big-endian hex, e.g. `1d00ffff`.
    pub fn bits_hex(&self) -> String {
        let mut bits = self.bits;
        bits.reverse();
        hex::encode(bits)
    }
}
