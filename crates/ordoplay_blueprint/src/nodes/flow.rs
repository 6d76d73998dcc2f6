// SPDX-License-Identifier: MIT OR Apache-2.0
//! Control flow nodes.

use crate::activation::NodeToken;
use crate::execution::ExecutionContext;
use crate::node::{BlueprintNode, Capabilities, EnterPort, NodeId, PortValueSource};
use crate::port::{Port, PortIndex, PortSet};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Entry point fired by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventEntry {
    /// Event name, for diagnostics
    pub name: String,
}

impl EventEntry {
    /// Fired by the host
    pub const OUT: PortIndex = 0;

    /// Create an event entry
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl BlueprintNode for EventEntry {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::exit("Out"));
    }
}

/// Fires its exits one after another.
///
/// The number of exits is configuration; changing it requires invalidating the node's ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sequence {
    /// Number of `Then` exits
    pub steps: usize,
}

impl Default for Sequence {
    fn default() -> Self {
        Self { steps: 2 }
    }
}

impl Sequence {
    /// Control input
    pub const IN: PortIndex = 0;

    /// Create a sequence with `steps` exits
    pub fn new(steps: usize) -> Self {
        Self { steps }
    }

    /// Port index of the `step`-th exit
    pub fn then(step: usize) -> PortIndex {
        1 + step
    }
}

impl BlueprintNode for Sequence {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        for step in 0..self.steps {
            ports.push(Port::exit(format!("Then {step}")));
        }
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter()
    }
}

impl EnterPort for Sequence {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        if port != Self::IN {
            return;
        }
        for step in 0..self.steps {
            ctx.call(token, Self::then(step));
        }
    }
}

/// If/else on a pulled condition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branch {
    /// Used when `Condition` is unlinked
    pub condition: bool,
}

impl Branch {
    /// Control input
    pub const IN: PortIndex = 0;
    /// Condition input
    pub const CONDITION: PortIndex = 1;
    /// Taken when the condition holds
    pub const TRUE: PortIndex = 2;
    /// Taken otherwise
    pub const FALSE: PortIndex = 3;
}

impl BlueprintNode for Branch {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        ports.push(Port::input::<bool>("Condition"));
        ports.push(Port::exit("True"));
        ports.push(Port::exit("False"));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter()
    }
}

impl EnterPort for Branch {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        if port != Self::IN {
            return;
        }
        let exit = if ctx.read(token, Self::CONDITION, self.condition) {
            Self::TRUE
        } else {
            Self::FALSE
        };
        ctx.call(token, exit);
    }
}

/// Per-token state of a [`Counter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterState {
    /// Entries since the last reset
    pub count: i32,
}

/// Counts entries and passes control through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter;

impl Counter {
    /// Increment and continue
    pub const IN: PortIndex = 0;
    /// Reset to zero
    pub const RESET: PortIndex = 1;
    /// Fired after each increment
    pub const OUT: PortIndex = 2;
    /// Current count
    pub const COUNT: PortIndex = 3;
}

impl BlueprintNode for Counter {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        ports.push(Port::enter("Reset"));
        ports.push(Port::exit("Out"));
        ports.push(Port::output::<i32>("Count"));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter().values()
    }
}

impl EnterPort for Counter {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        match port {
            Self::IN => {
                ctx.state_mut::<CounterState>(token).count += 1;
                ctx.call(token, Self::OUT);
            }
            Self::RESET => ctx.state_mut::<CounterState>(token).count = 0,
            _ => {}
        }
    }
}

impl PortValueSource for Counter {
    fn get_port_value(
        &self,
        ctx: &mut ExecutionContext<'_>,
        token: NodeToken,
        port: PortIndex,
    ) -> Option<Value> {
        (port == Self::COUNT)
            .then(|| Value::Int(ctx.state::<CounterState>(token).map_or(0, |s| s.count)))
    }
}

/// Lines written by a [`Print`] node in one activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintLog {
    /// Messages in the order they were printed
    pub lines: Vec<String>,
}

/// Logs a message and continues
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Print {
    /// Used when `Message` is unlinked
    pub message: String,
}

impl Print {
    /// Control input
    pub const IN: PortIndex = 0;
    /// Message input
    pub const MESSAGE: PortIndex = 1;
    /// Fired after printing
    pub const OUT: PortIndex = 2;

    /// Create a print node with a default message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl BlueprintNode for Print {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        ports.push(Port::input::<String>("Message"));
        ports.push(Port::exit("Out"));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter()
    }
}

impl EnterPort for Print {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        if port != Self::IN {
            return;
        }
        let message = ctx.read(token, Self::MESSAGE, self.message.clone());
        tracing::info!(target: "ordoplay_blueprint::print", "[{}] {}", token, message);
        ctx.state_mut::<PrintLog>(token).lines.push(message);
        ctx.call(token, Self::OUT);
    }
}
