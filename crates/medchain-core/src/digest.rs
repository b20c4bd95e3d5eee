//! # Digest Engine
//!
//! Pure functions producing SHA-256 digests of raw object bytes and of
//! ledger blocks. No I/O, no state.
//!
//! ## Invariants
//!
//! - [`content_digest()`] hashes raw bytes exactly as given. Identical bytes
//!   yield an identical digest regardless of chunking: feeding the same bytes
//!   through a [`Sha256Accumulator`] in any split gives the same value.
//! - [`block_digest()`] hashes only [`CanonicalBytes`]. The digest input is
//!   the JCS encoding of `{"index","payload","prevDigest","timestamp"}`, so
//!   every field of the payload (labels, tags, metadata included) is bound
//!   into the block identity and the encoding cannot drift with map insertion
//!   order or number formatting.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::block::BlockPayload;
use crate::canonical::CanonicalBytes;
use crate::error::{CanonicalizationError, DigestParseError};
use crate::temporal::Timestamp;

/// A 256-bit SHA-256 digest.
///
/// Serializes as a lowercase 64-character hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte digest value.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 64-character hex string (either case).
    ///
    /// # Errors
    ///
    /// Returns `DigestParseError` on wrong length or a non-hex character.
    pub fn from_hex(s: &str) -> Result<Self, DigestParseError> {
        if s.len() != 64 {
            return Err(DigestParseError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        let raw = s.as_bytes();
        for (i, out) in bytes.iter_mut().enumerate() {
            let hi = hex_value(raw[2 * i], 2 * i, s)?;
            let lo = hex_value(raw[2 * i + 1], 2 * i + 1, s)?;
            *out = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }

    /// Compare against a stored hex string without allocating a parse error.
    pub fn matches_hex(&self, s: &str) -> bool {
        self.to_hex() == s
    }
}

fn hex_value(byte: u8, position: usize, s: &str) -> Result<u8, DigestParseError> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        _ => Err(DigestParseError::InvalidCharacter {
            ch: s
                .get(position..)
                .and_then(|rest| rest.chars().next())
                .unwrap_or('\u{fffd}'),
            position,
        }),
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for ContentDigest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Incremental SHA-256 over a stream of byte chunks.
///
/// Produces the same digest as [`content_digest()`] over the concatenation
/// of every chunk fed to it.
#[derive(Debug, Clone, Default)]
pub struct Sha256Accumulator {
    hasher: Sha256,
    len: u64,
}

impl Sha256Accumulator {
    /// Start an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Total number of bytes fed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether no bytes have been fed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish and return the digest.
    pub fn finalize(self) -> ContentDigest {
        ContentDigest(self.hasher.finalize().into())
    }
}

/// Compute the SHA-256 digest of an object's raw bytes.
///
/// An empty buffer is valid input and yields the digest of zero bytes.
pub fn content_digest(bytes: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(bytes).into())
}

/// Compute the SHA-256 digest of canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    ContentDigest(Sha256::digest(data.as_bytes()).into())
}

/// The exact structure whose canonical bytes are hashed into a block digest.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockDigestInput<'a> {
    index: u64,
    prev_digest: &'a str,
    timestamp: Timestamp,
    payload: &'a BlockPayload,
}

/// Produce the canonical bytes a block digest is computed over.
///
/// Exposed so that external verifiers can reproduce the digest input
/// byte-for-byte.
pub fn block_digest_input(
    index: u64,
    prev_digest: &str,
    timestamp: Timestamp,
    payload: &BlockPayload,
) -> Result<CanonicalBytes, CanonicalizationError> {
    CanonicalBytes::new(&BlockDigestInput {
        index,
        prev_digest,
        timestamp,
        payload,
    })
}

/// Compute a block's digest from its four identity fields.
///
/// # Errors
///
/// Returns `CanonicalizationError` only if the payload cannot be serialized;
/// payloads built from [`BlockPayload`] contain no floats and always succeed.
pub fn block_digest(
    index: u64,
    prev_digest: &str,
    timestamp: Timestamp,
    payload: &BlockPayload,
) -> Result<ContentDigest, CanonicalizationError> {
    let canonical = block_digest_input(index, prev_digest, timestamp, payload)?;
    Ok(sha256_digest(&canonical))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn chunking_never_changes_digest(
            data in prop::collection::vec(any::<u8>(), 0..2048),
            chunk in 1usize..128,
        ) {
            let mut acc = Sha256Accumulator::new();
            for part in data.chunks(chunk) {
                acc.update(part);
            }
            prop_assert_eq!(acc.finalize(), content_digest(&data));
        }

        #[test]
        fn hex_parse_inverts_render(bytes in any::<[u8; 32]>()) {
            let d = ContentDigest::from_bytes(bytes);
            prop_assert_eq!(ContentDigest::from_hex(&d.to_hex()).unwrap(), d);
        }
    }
}
