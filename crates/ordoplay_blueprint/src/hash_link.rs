// SPDX-License-Identifier: MIT OR Apache-2.0
//! Label-based jumps.
//!
//! Publishers expose one enter port under a hashed label; consumers request
//! "whatever enter port is published under hash H" from an exit port. The table
//! is built in one pass over all nodes when the blueprint is compiled.

use crate::error::{BlueprintError, Result};
use crate::node::NodeId;
use crate::port::PortIndex;
use crate::settings::DuplicateLabelPolicy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Stable 32-bit hash of a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelHash(pub u32);

impl LabelHash {
    /// Hash of the empty label, the conventional fallthrough target
    pub const DEFAULT: Self = Self(0);

    /// Hash a label (FNV-1a over its UTF-8 bytes). The empty label maps to [`Self::DEFAULT`].
    pub fn of(label: &str) -> Self {
        if label.is_empty() {
            return Self::DEFAULT;
        }
        let hash = label
            .bytes()
            .fold(FNV_OFFSET, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME));
        Self(hash)
    }
}

impl fmt::Display for LabelHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Where a label jump lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashLinkTarget {
    /// Publishing node
    pub node: NodeId,
    /// Its published enter port
    pub port: PortIndex,
}

/// A publisher that lost to an earlier one with the same hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateLabel {
    /// Shared hash
    pub hash: LabelHash,
    /// Publisher that owns the hash
    pub kept: NodeId,
    /// Publisher that was ignored
    pub ignored: NodeId,
}

/// Compiled `hash -> enter port` map of one blueprint
#[derive(Debug, Clone, Default)]
pub struct HashLinkTable {
    targets: IndexMap<LabelHash, HashLinkTarget>,
    duplicates: Vec<DuplicateLabel>,
}

impl HashLinkTable {
    /// Build the table from publishers in authoring order.
    ///
    /// The first publisher of a hash wins. Later ones are recorded as duplicates,
    /// or rejected outright under [`DuplicateLabelPolicy::Reject`].
    pub fn build(
        publishers: impl IntoIterator<Item = (NodeId, PortIndex, LabelHash)>,
        policy: DuplicateLabelPolicy,
    ) -> Result<Self> {
        let mut table = Self::default();

        for (node, port, hash) in publishers {
            if let Some(existing) = table.targets.get(&hash) {
                let duplicate = DuplicateLabel {
                    hash,
                    kept: existing.node,
                    ignored: node,
                };
                match policy {
                    DuplicateLabelPolicy::Warn => {
                        tracing::warn!(
                            "Label {} published by {} and {}; keeping {}",
                            hash,
                            duplicate.kept,
                            node,
                            duplicate.kept
                        );
                        table.duplicates.push(duplicate);
                    }
                    DuplicateLabelPolicy::Reject => {
                        return Err(BlueprintError::DuplicateLabel {
                            hash,
                            first: duplicate.kept,
                            second: node,
                        });
                    }
                }
                continue;
            }
            table.targets.insert(hash, HashLinkTarget { node, port });
        }

        tracing::debug!(
            "Built hash-link table: {} labels, {} duplicates",
            table.targets.len(),
            table.duplicates.len()
        );
        Ok(table)
    }

    /// Look up the enter port published under `hash`
    pub fn resolve(&self, hash: LabelHash) -> Option<HashLinkTarget> {
        self.targets.get(&hash).copied()
    }

    /// Publishers that were ignored because their hash was already taken
    pub fn duplicates(&self) -> &[DuplicateLabel] {
        &self.duplicates
    }

    /// Number of distinct published labels
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether nothing is published
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
