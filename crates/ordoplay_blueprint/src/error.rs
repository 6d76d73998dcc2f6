// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while building, loading or reconfiguring a blueprint.
//!
//! Execution itself never fails: unlinked reads return the caller's default and
//! unlinked calls do nothing.

use crate::hash_link::LabelHash;
use crate::node::NodeId;
use crate::port::{PortIndex, PortKind};
use crate::value::ValueType;

/// Error when compiling or modifying a blueprint
#[derive(Debug, thiserror::Error)]
pub enum BlueprintError {
    /// Two authored nodes share an id
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Node not found
    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    /// A link references a port the node does not have
    #[error("Port {port} out of range on node {node} ({count} ports)")]
    PortOutOfRange {
        /// Node the link points at
        node: NodeId,
        /// Requested port index
        port: PortIndex,
        /// Ports the node actually has
        count: usize,
    },

    /// Link directionality does not match the port kinds
    #[error("Cannot link {from:?} to {to:?}")]
    KindMismatch {
        /// Source port kind
        from: PortKind,
        /// Target port kind
        to: PortKind,
    },

    /// Incompatible data types
    #[error("Cannot feed {from} into {to}")]
    TypeMismatch {
        /// Output value type
        from: ValueType,
        /// Input value type
        to: ValueType,
    },

    /// A node is registered twice under the same label
    #[error("Label {hash} published by both {first} and {second}")]
    DuplicateLabel {
        /// Shared label hash
        hash: LabelHash,
        /// Publisher that was registered first
        first: NodeId,
        /// Publisher that collided with it
        second: NodeId,
    },

    /// Graph definition names a node kind the factory does not know
    #[error("Unknown node kind: {0}")]
    UnknownKind(String),

    /// A node's configuration text could not be parsed
    #[error("Invalid config for node {node}: {source}")]
    Config {
        /// Node being configured
        node: NodeId,
        /// Parse error
        #[source]
        source: ron::error::SpannedError,
    },

    /// Definition parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for blueprint operations
pub type Result<T> = std::result::Result<T, BlueprintError>;
