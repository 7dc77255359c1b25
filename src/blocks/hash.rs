use std::fmt;

use num::BigUint;
use sha2::{Digest, Sha256};

use crate::blocks::block::CanonicalHeader;
use crate::error::{Error, Result};

pub const HASH_LEN_BYTES: usize = 32;

/// Block identifier of a header.
///
/// Bytes are held in digest order (as they appear inside a serialized header).
/// Hex rendering and integer conversion use the reversed, block-explorer order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct ChainHash([u8; HASH_LEN_BYTES]);

impl ChainHash {
    pub const ZERO: ChainHash = ChainHash([0u8; HASH_LEN_BYTES]);

    pub fn from_digest(digest: [u8; HASH_LEN_BYTES]) -> Self {
        ChainHash(digest)
    }

    /// Parse a hash in display order, e.g. `000000000019d6...e26f` for genesis.
    pub fn from_hex(display: &str) -> Result<Self> {
        let mut bytes = hex::decode(display)
            .map_err(|e| Error::malformed(None, format!("hash {display:?} is not hex: {e}")))?;
        if bytes.len() != HASH_LEN_BYTES {
            return Err(Error::malformed(
                None,
                format!("hash {display:?} is {} bytes, expected 32", bytes.len()),
            ));
        }
        bytes.reverse();
        let mut digest = [0u8; HASH_LEN_BYTES];
        digest.copy_from_slice(&bytes);
        Ok(ChainHash(digest))
    }

    pub fn as_digest(&self) -> &[u8; HASH_LEN_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        let mut display = self.0;
        display.reverse();
        hex::encode(display)
    }

    /// The hash read as a big-endian integer in display order.
    /// This is the value compared against difficulty targets and fed to the circuit.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }
}

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn sha256d(data: &[u8]) -> [u8; HASH_LEN_BYTES] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Return hash := SHA256(SHA256(header))
pub fn hash(header: &CanonicalHeader) -> ChainHash {
    ChainHash(sha256d(&header.to_bytes()))
}

#[cfg(test)]
mod tests {
    use crate::blocks::block::CanonicalHeader;
    use crate::blocks::hash::{hash, ChainHash};

    const HEADERS: [(&str, &str); 4] = [
        (
            "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c",
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f",
        ),
        (
            "010000006fe28c0ab6f1b372c1a6a246ae63f74f931e8365e15a089c68d6190000000000982051fd1e4ba744bbbe680e1fee14677ba1a3c3540bf7b1cdb606e857233e0e61bc6649ffff001d01e36299",
            "00000000839a8e6886ab5951d76f411475428afc90947ee320161bbf18eb6048",
        ),
        (
            "010000004860eb18bf1b1620e37e9490fc8a427514416fd75159ab86688e9a8300000000d5fdcc541e25de1c7a5addedf24858b8bb665c9f36ef744ee42c316022c90f9bb0bc6649ffff001d08d2bd61",
            "000000006a625f06636b8bb6ac7b960a8d03705d1ace08b1a19da3fdcc99ddbd",
        ),
        (
            // 500k header
            "000000201929eb850a74427d0440cf6b518308837566cd6d0662790000000000000000001f6231ed3de07345b607ec2a39b2d01bec2fe10dfb7f516ba4958a42691c95316d0a385a459600185599fc5c",
            "00000000000000000024fb37364cbf81fd49cc2d51c09c75c35433c3a1945d04",
        ),
    ];

    #[test]
    fn test_known_block_hashes() {
        for (header_hex, expected) in HEADERS {
            let header = CanonicalHeader::from_hex(header_hex).unwrap();
            assert_eq!(hash(&header).to_hex(), expected);
        }
    }

    #[test]
    fn test_hash_links_to_next_header() {
        let genesis = CanonicalHeader::from_hex(HEADERS[0].0).unwrap();
        let first = CanonicalHeader::from_hex(HEADERS[1].0).unwrap();
        assert_eq!(first.prev_hash(), hash(&genesis));
    }

    #[test]
    fn test_hex_round_trip_reverses_bytes() {
        let h = ChainHash::from_hex(HEADERS[0].1).unwrap();
        assert_eq!(h.as_digest()[0], 0x6f);
        assert_eq!(h.as_digest()[31], 0x00);
        assert_eq!(h.to_string(), HEADERS[0].1);
    }

    #[test]
    fn test_integer_value_uses_display_order() {
        let h = ChainHash::from_hex(HEADERS[0].1).unwrap();
        assert_eq!(
            h.to_biguint().to_string(),
            "10628944869218562084050143519444549580389464591454674019345556079"
        );
        assert_eq!(ChainHash::ZERO.to_biguint().to_string(), "0");
    }

    #[test]
    fn test_rejects_short_hash() {
        assert!(ChainHash::from_hex("00ff").is_err());
        assert!(ChainHash::from_hex("zz").is_err());
    }
}
