// SPDX-License-Identifier: MIT OR Apache-2.0
//! Label and goto nodes, wired through the hash-link table instead of authored links.

use crate::activation::NodeToken;
use crate::execution::ExecutionContext;
use crate::hash_link::LabelHash;
use crate::node::{BlueprintNode, Capabilities, EnterPort, HashLinkConsumer, HashLinkPublisher, NodeId};
use crate::port::{Port, PortIndex, PortSet};
use serde::{Deserialize, Serialize};

/// Jump target. An empty name is the default fallthrough label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    /// Published label
    pub name: String,
}

impl Label {
    /// Published enter port
    pub const IN: PortIndex = 0;
    /// Fired when the label is reached
    pub const OUT: PortIndex = 1;

    /// Create a label
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl BlueprintNode for Label {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        ports.push(Port::exit("Out"));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter().publishes_labels()
    }
}

impl EnterPort for Label {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        if port == Self::IN {
            ctx.call(token, Self::OUT);
        }
    }
}

impl HashLinkPublisher for Label {
    fn published_label(&self, _id: NodeId) -> Option<(PortIndex, LabelHash)> {
        Some((Self::IN, LabelHash::of(&self.name)))
    }
}

/// Jumps to the [`Label`] published under `target`; does nothing if there is none
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Goto {
    /// Requested label
    pub target: String,
}

impl Goto {
    /// Control input
    pub const IN: PortIndex = 0;
    /// Resolved through the label table
    pub const JUMP: PortIndex = 1;

    /// Create a goto
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl BlueprintNode for Goto {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        ports.push(Port::exit("Jump"));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter().consumes_labels()
    }
}

impl EnterPort for Goto {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        if port == Self::IN {
            ctx.call(token, Self::JUMP);
        }
    }
}

impl HashLinkConsumer for Goto {
    fn consumed_label(&self, port: PortIndex) -> Option<LabelHash> {
        (port == Self::JUMP).then(|| LabelHash::of(&self.target))
    }
}
