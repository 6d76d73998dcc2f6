// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pure data nodes.

use crate::activation::NodeToken;
use crate::execution::ExecutionContext;
use crate::node::{BlueprintNode, Capabilities, NodeId, PortValueSource};
use crate::port::{Port, PortCapacity, PortIndex, PortKind, PortSet};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Outputs a fixed value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constant {
    /// Value produced on every read
    pub value: Value,
}

impl Constant {
    /// Output port
    pub const VALUE: PortIndex = 0;

    /// Create a constant node
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl BlueprintNode for Constant {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::new(
            "Value",
            PortKind::Output(self.value.value_type()),
            PortCapacity::Multiple,
        ));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.values()
    }
}

impl PortValueSource for Constant {
    fn get_port_value(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        _token: NodeToken,
        port: PortIndex,
    ) -> Option<Value> {
        (port == Self::VALUE).then(|| self.value.clone())
    }
}

/// `Sum = A + B`, with configurable defaults for unlinked inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddInt {
    /// Used when `A` is unlinked
    pub a: i32,
    /// Used when `B` is unlinked
    pub b: i32,
}

impl AddInt {
    /// First operand
    pub const A: PortIndex = 0;
    /// Second operand
    pub const B: PortIndex = 1;
    /// Result
    pub const SUM: PortIndex = 2;
}

impl BlueprintNode for AddInt {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::input::<i32>("A"));
        ports.push(Port::input::<i32>("B"));
        ports.push(Port::output::<i32>("Sum"));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.values()
    }
}

impl PortValueSource for AddInt {
    fn get_port_value(
        &self,
        ctx: &mut ExecutionContext<'_>,
        token: NodeToken,
        port: PortIndex,
    ) -> Option<Value> {
        if port != Self::SUM {
            return None;
        }
        let a = ctx.read(token, Self::A, self.a);
        let b = ctx.read(token, Self::B, self.b);
        Some(Value::Int(a.wrapping_add(b)))
    }
}
