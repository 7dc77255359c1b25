use std::fmt;

use itertools::Itertools;
use num::BigUint;

use crate::blocks::block::{CanonicalHeader, HEADER_SIZE_BYTES};
use crate::blocks::hash::ChainHash;
use crate::blocks::target::{decode_target, target_to_bytes, TARGET_LEN_BYTES};
use crate::error::{Error, Result};

pub const HEADERS_PER_BATCH: usize = 32;

/// Word widths the validator circuit expects. Changing either width is a breaking
/// change for the prover and must come with a new version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CircuitLayout {
    pub version: u32,
    pub header_word_bytes: usize,
    pub target_word_bytes: usize,
}

/// 32-bit header words (20 per header), 64-bit target words (4 per target).
pub const CIRCUIT_V1: CircuitLayout = CircuitLayout {
    version: 1,
    header_word_bytes: 4,
    target_word_bytes: 8,
};

const _: () = assert!(
    CIRCUIT_V1.header_word_bytes <= 8
        && CIRCUIT_V1.target_word_bytes <= 8
        && HEADER_SIZE_BYTES % CIRCUIT_V1.header_word_bytes == 0
        && TARGET_LEN_BYTES % CIRCUIT_V1.target_word_bytes == 0
);

/// Prover input: space separated decimal words.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitInput {
    pub layout_version: u32,
    text: String,
}

impl CircuitInput {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.text.split(' ')
    }
}

impl fmt::Display for CircuitInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn to_words(bytes: &[u8], word_bytes: usize) -> Vec<u64> {
    bytes
        .chunks(word_bytes)
        .map(|chunk| chunk.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
        .collect()
}

pub fn words_to_string(words: &[u64]) -> String {
    words.iter().join(" ")
}

impl CircuitLayout {
    pub const fn header_words(&self) -> usize {
        HEADER_SIZE_BYTES / self.header_word_bytes
    }

    pub const fn target_words(&self) -> usize {
        TARGET_LEN_BYTES / self.target_word_bytes
    }

    /// Number of tokens in a full batch input.
    pub const fn batch_tokens(&self) -> usize {
        HEADERS_PER_BATCH * (self.header_words() + self.target_words()) + 1
    }

    /// Slice the 80 canonical bytes into big-endian words, first byte first.
    pub fn encode_header(&self, header: &CanonicalHeader) -> Vec<u64> {
        to_words(&header.to_bytes(), self.header_word_bytes)
    }

    pub fn encode_target(&self, bits: &str) -> Result<Vec<u64>> {
        self.encode_target_value(&decode_target(bits)?)
    }

    /// Most significant word first.
    pub fn encode_target_value(&self, target: &BigUint) -> Result<Vec<u64>> {
        Ok(to_words(&target_to_bytes(target)?, self.target_word_bytes))
    }

    /// Header words of every header, then target words of every target, then the link hash.
    pub fn encode_batch(
        &self,
        headers: &[CanonicalHeader],
        targets: &[BigUint],
        link_hash: &ChainHash,
    ) -> Result<CircuitInput> {
        for len in [headers.len(), targets.len()] {
            if len != HEADERS_PER_BATCH {
                return Err(Error::BatchSize {
                    expected: HEADERS_PER_BATCH,
                    actual: len,
                });
            }
        }

        let mut segments = Vec::with_capacity(2 * HEADERS_PER_BATCH + 1);
        for header in headers {
            segments.push(words_to_string(&self.encode_header(header)));
        }
        for target in targets {
            segments.push(words_to_string(&self.encode_target_value(target)?));
        }
        segments.push(link_hash.to_biguint().to_string());

        Ok(CircuitInput {
            layout_version: self.version,
            text: segments.join(" "),
        })
    }

    /// Rebuild a header from its words. Rejects words wider than the layout allows.
    pub fn decode_header(&self, words: &[u64]) -> Result<CanonicalHeader> {
        if words.len() != self.header_words() {
            return Err(Error::malformed(
                None,
                format!("expected {} header words, got {}", self.header_words(), words.len()),
            ));
        }
        let mut bytes = Vec::with_capacity(HEADER_SIZE_BYTES);
        for word in words {
            let be = word.to_be_bytes();
            let (high, low) = be.split_at(8 - self.header_word_bytes);
            if high.iter().any(|b| *b != 0) {
                return Err(Error::malformed(
                    None,
                    format!("header word {word} exceeds {} bytes", self.header_word_bytes),
                ));
            }
            bytes.extend_from_slice(low);
        }
        CanonicalHeader::from_bytes(&bytes)
    }
}

pub fn encode_header(header: &CanonicalHeader) -> Vec<u64> {
    CIRCUIT_V1.encode_header(header)
}

pub fn encode_target(bits: &str) -> Result<Vec<u64>> {
    CIRCUIT_V1.encode_target(bits)
}

pub fn encode_batch(
    headers: &[CanonicalHeader],
    targets: &[BigUint],
    link_hash: &ChainHash,
) -> Result<CircuitInput> {
    CIRCUIT_V1.encode_batch(headers, targets, link_hash)
}
