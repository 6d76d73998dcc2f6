// SPDX-License-Identifier: MIT OR Apache-2.0
//! Authored links and their resolved runtime form.

use crate::node::NodeId;
use crate::port::PortIndex;
use crate::storage::NodeAddress;
use serde::{Deserialize, Serialize};

/// An authored edge between two ports.
///
/// Control links go Exit -> Enter, data links go Output -> Input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Source node
    pub from: NodeId,
    /// Source port (Exit or Output)
    pub from_port: PortIndex,
    /// Target node
    pub to: NodeId,
    /// Target port (Enter or Input)
    pub to_port: PortIndex,
}

impl Link {
    /// Create a new link
    pub fn new(from: NodeId, from_port: PortIndex, to: NodeId, to_port: PortIndex) -> Self {
        Self {
            from,
            from_port,
            to,
            to_port,
        }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }
}

/// One resolved hop: the node on the far side of a link, addressed directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLink {
    /// Far node's authored id
    pub node: NodeId,
    /// Where the far node lives in storage
    pub address: NodeAddress,
    /// Port on the far node
    pub port: PortIndex,
}

/// Resolved links of one port, in authored order.
///
/// For exit ports these are the enter ports to invoke; for input ports, the
/// output port to pull from. Enter and output ports resolve to nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimePort {
    links: Vec<RuntimeLink>,
}

impl RuntimePort {
    pub(crate) fn new(links: Vec<RuntimeLink>) -> Self {
        Self { links }
    }

    /// Resolved links in authored order
    pub fn links(&self) -> &[RuntimeLink] {
        &self.links
    }

    /// First resolved link, used by single-capacity data inputs
    pub fn first(&self) -> Option<&RuntimeLink> {
        self.links.first()
    }

    /// Number of resolved links
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the port has no resolved links
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
