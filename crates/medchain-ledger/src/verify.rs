//! # Chain Verification
//!
//! Tamper detection over an ordered block sequence. Verification is pure:
//! it runs equally over blocks read from the live store, a backup, or an
//! export, and it never fails for a well-formed sequence. Every problem is
//! reported as a [`ChainFault`]; the pass does not stop at the first one.
//!
//! ## Algorithm
//!
//! 1. Empty input is vacuously valid.
//! 2. The first block must carry the genesis sentinel `"0"` as `prevDigest`.
//!    A violation is recorded and checking continues.
//! 3. For each block in order, recompute its digest. On mismatch record a
//!    `DigestMismatch` and skip its linkage check: a block whose own digest
//!    is wrong cannot meaningfully vouch for its link.
//! 4. Otherwise, for every block after the first, its `prevDigest` must
//!    equal the preceding block's stored `digest`.

use medchain_core::{Block, GENESIS_PREV_DIGEST};
use serde::{Deserialize, Serialize};

/// One integrity problem found in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainFault {
    /// The first block does not link to the genesis sentinel.
    GenesisLink {
        /// Index of the first block.
        index: u64,
        /// The `prevDigest` it actually carries.
        prev_digest: String,
    },
    /// A block's stored digest does not match its recomputed digest.
    DigestMismatch {
        /// Index of the self-inconsistent block.
        index: u64,
    },
    /// A block's `prevDigest` does not match its predecessor's digest.
    BrokenLink {
        /// Index of the predecessor.
        prev_index: u64,
        /// Index of the block carrying the wrong link.
        index: u64,
    },
}

impl ChainFault {
    /// Index of the block the fault is reported against.
    pub fn index(&self) -> u64 {
        match self {
            Self::GenesisLink { index, .. }
            | Self::DigestMismatch { index }
            | Self::BrokenLink { index, .. } => *index,
        }
    }
}

impl std::fmt::Display for ChainFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GenesisLink { index, prev_digest } => write!(
                f,
                "Genesis block (index {index}) prevDigest should be \"{GENESIS_PREV_DIGEST}\", got \"{prev_digest}\""
            ),
            Self::DigestMismatch { index } => {
                write!(f, "Block {index}: hash mismatch - block may be tampered")
            }
            Self::BrokenLink { prev_index, index } => {
                write!(f, "Chain link broken between block {prev_index} -> {index}")
            }
        }
    }
}

/// Outcome of a verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    /// True iff no faults were found.
    pub valid: bool,
    /// Every fault, in the order encountered.
    pub errors: Vec<ChainFault>,
}

impl ChainReport {
    fn from_faults(errors: Vec<ChainFault>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// The faults rendered as human-readable strings.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Recompute a block's digest from its own fields and compare it to the
/// stored one.
pub fn verify_block(block: &Block) -> bool {
    match block.recompute_digest() {
        Ok(digest) => digest.matches_hex(&block.digest),
        Err(e) => {
            tracing::warn!(index = block.index, error = %e, "block digest could not be recomputed");
            false
        }
    }
}

/// Verify an ordered block sequence end to end.
pub fn verify_chain(blocks: &[Block]) -> ChainReport {
    let mut errors = Vec::new();

    let Some(genesis) = blocks.first() else {
        return ChainReport::from_faults(errors);
    };
    if !genesis.links_to_genesis() {
        errors.push(ChainFault::GenesisLink {
            index: genesis.index,
            prev_digest: genesis.prev_digest.clone(),
        });
    }

    for (i, block) in blocks.iter().enumerate() {
        if !verify_block(block) {
            errors.push(ChainFault::DigestMismatch { index: block.index });
            continue;
        }
        if i > 0 {
            let prev = &blocks[i - 1];
            if block.prev_digest != prev.digest {
                errors.push(ChainFault::BrokenLink {
                    prev_index: prev.index,
                    index: block.index,
                });
            }
        }
    }

    for fault in &errors {
        tracing::warn!(index = fault.index(), fault = %fault, "chain integrity fault");
    }
    ChainReport::from_faults(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medchain_core::{PayloadDraft, Timestamp};

    /// Build a correctly linked chain of `n` blocks.
    fn chain(n: u64) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::new();
        for i in 1..=n {
            let ts = Timestamp::from_millis(1000 * i as i64);
            let prev = blocks
                .last()
                .map_or_else(|| GENESIS_PREV_DIGEST.to_string(), |b| b.digest.clone());
            let payload = PayloadDraft::new(format!("o{i}"), format!("t{i}-a.txt"), format!("d{i}"))
                .into_payload(ts);
            blocks.push(Block::seal(i, prev, ts, payload).unwrap());
        }
        blocks
    }

    #[test]
    fn empty_chain_is_valid() {
        let report = verify_chain(&[]);
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn well_formed_chain_is_valid() {
        let blocks = chain(5);
        assert!(blocks.iter().all(verify_block));
        assert_eq!(verify_chain(&blocks), ChainReport { valid: true, errors: vec![] });
    }

    #[test]
    fn mutated_payload_reports_only_that_block() {
        let mut blocks = chain(3);
        blocks[1].payload.object_name = "t2-evil.txt".into();
        let report = verify_chain(&blocks);
        assert!(!report.valid);
        assert_eq!(report.errors, vec![ChainFault::DigestMismatch { index: 2 }]);
        // Block 3 still links to block 2's *stored* digest, so no link error.
        assert_eq!(report.messages(), vec!["Block 2: hash mismatch - block may be tampered"]);
    }

    #[test]
    fn mutated_metadata_is_detected() {
        let mut blocks = chain(2);
        blocks[0]
            .payload
            .metadata
            .insert("recordType".into(), "lab".into());
        let report = verify_chain(&blocks);
        assert_eq!(report.errors, vec![ChainFault::DigestMismatch { index: 1 }]);
    }

    #[test]
    fn replaced_prev_digest_with_resealed_block_is_a_broken_link() {
        let mut blocks = chain(3);
        let b2 = &blocks[1];
        blocks[1] = Block::seal(b2.index, "f".repeat(64), b2.timestamp, b2.payload.clone()).unwrap();
        // Block 3 pointed at the old block 2 digest.
        let report = verify_chain(&blocks);
        assert_eq!(
            report.errors,
            vec![
                ChainFault::BrokenLink { prev_index: 1, index: 2 },
                ChainFault::BrokenLink { prev_index: 2, index: 3 },
            ]
        );
    }

    #[test]
    fn replaced_prev_digest_without_reseal_is_a_digest_mismatch() {
        let mut blocks = chain(3);
        blocks[1].prev_digest = "f".repeat(64);
        let report = verify_chain(&blocks);
        assert_eq!(report.errors, vec![ChainFault::DigestMismatch { index: 2 }]);
        assert!(verify_block(&blocks[0]));
        assert!(verify_block(&blocks[2]));
    }

    #[test]
    fn genesis_rule_applies_even_when_self_digest_holds() {
        let ts = Timestamp::from_millis(1);
        let payload = PayloadDraft::new("o", "n", "d").into_payload(ts);
        let block = Block::seal(1, "1", ts, payload).unwrap();
        assert!(verify_block(&block));
        let report = verify_chain(std::slice::from_ref(&block));
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![ChainFault::GenesisLink { index: 1, prev_digest: "1".into() }]
        );
        assert_eq!(
            report.messages()[0],
            "Genesis block (index 1) prevDigest should be \"0\", got \"1\""
        );
    }

    #[test]
    fn verification_continues_past_first_fault() {
        let mut blocks = chain(5);
        blocks[0].prev_digest = "x".into();
        blocks[2].payload.content_digest = "forged".into();
        blocks[4].digest = "0".repeat(64);
        let report = verify_chain(&blocks);
        let indices: Vec<u64> = report.errors.iter().map(ChainFault::index).collect();
        assert_eq!(indices, vec![1, 1, 3, 5]);
    }

    #[test]
    fn deleted_block_breaks_linkage_of_successor() {
        let mut blocks = chain(4);
        blocks.remove(1);
        let report = verify_chain(&blocks);
        assert_eq!(report.errors, vec![ChainFault::BrokenLink { prev_index: 1, index: 3 }]);
    }

    #[test]
    fn report_serializes_with_fault_kinds() {
        let report = ChainReport::from_faults(vec![ChainFault::BrokenLink { prev_index: 1, index: 2 }]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["valid"], false);
        assert_eq!(json["errors"][0]["kind"], "broken_link");
    }
}
