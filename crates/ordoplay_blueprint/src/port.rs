// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node control and data connections.

use crate::dependency::DependencyPorts;
use crate::value::{PortData, ValueType};
use serde::{Deserialize, Serialize};

/// Zero-based index of a port within a node's port set
pub type PortIndex = usize;

/// Kind of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Control flow in
    Enter,
    /// Control flow out
    Exit,
    /// Data in, pulled from a linked output
    Input(ValueType),
    /// Data out, evaluated on demand
    Output(ValueType),
}

impl PortKind {
    /// Whether this is a control-flow port
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Enter | Self::Exit)
    }

    /// Declared value type for data ports
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Self::Input(t) | Self::Output(t) => Some(*t),
            Self::Enter | Self::Exit => None,
        }
    }

    /// Check if a link from a port of this kind to a port of `target` kind is well formed
    pub fn can_link_to(&self, target: &PortKind) -> bool {
        matches!(
            (self, target),
            (Self::Exit, Self::Enter) | (Self::Output(_), Self::Input(_))
        )
    }
}

/// How many links a port is expected to carry.
///
/// Authoring metadata only. The runtime does not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PortCapacity {
    /// At most one link
    #[default]
    Single,
    /// Any number of links
    Multiple,
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port name
    pub name: String,
    /// Port kind
    pub kind: PortKind,
    /// Expected link count
    pub capacity: PortCapacity,
}

impl Port {
    /// Create a new port
    pub fn new(name: impl Into<String>, kind: PortKind, capacity: PortCapacity) -> Self {
        Self {
            name: name.into(),
            kind,
            capacity,
        }
    }

    /// Control input. Any number of exits may lead here.
    pub fn enter(name: impl Into<String>) -> Self {
        Self::new(name, PortKind::Enter, PortCapacity::Multiple)
    }

    /// Control output. Multicasts to every linked enter port.
    pub fn exit(name: impl Into<String>) -> Self {
        Self::new(name, PortKind::Exit, PortCapacity::Multiple)
    }

    /// Data input of type `T`
    pub fn input<T: PortData>(name: impl Into<String>) -> Self {
        Self::new(name, PortKind::Input(T::VALUE_TYPE), PortCapacity::Single)
    }

    /// Data output of type `T`
    pub fn output<T: PortData>(name: impl Into<String>) -> Self {
        Self::new(name, PortKind::Output(T::VALUE_TYPE), PortCapacity::Multiple)
    }

    /// Data input with an explicit value type
    pub fn input_of(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, PortKind::Input(value_type), PortCapacity::Single)
    }

    /// Override the capacity hint
    pub fn with_capacity(mut self, capacity: PortCapacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Check if a link from this port to `target` is valid
    pub fn can_link(&self, target: &Port) -> bool {
        if !self.kind.can_link_to(&target.kind) {
            return false;
        }
        match (self.kind.value_type(), target.kind.value_type()) {
            (Some(from), Some(to)) => from.can_connect_to(&to),
            _ => true,
        }
    }
}

/// The ordered ports of one node, as produced by `create_ports`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortSet {
    ports: Vec<Port>,
    dependencies: Option<DependencyPorts>,
}

impl PortSet {
    /// Create an empty port set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a port, returning its index
    pub fn push(&mut self, port: Port) -> PortIndex {
        self.ports.push(port);
        self.ports.len() - 1
    }

    /// Get a port by index
    pub fn get(&self, index: PortIndex) -> Option<&Port> {
        self.ports.get(index)
    }

    /// Find a port index by name
    pub fn find(&self, name: &str) -> Option<PortIndex> {
        self.ports.iter().position(|p| p.name == name)
    }

    /// Number of ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether the set has no ports
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// All ports in index order
    pub fn iter(&self) -> impl Iterator<Item = &Port> {
        self.ports.iter()
    }

    /// Dynamic ports appended from dependency requests, if any
    pub fn dependencies(&self) -> Option<&DependencyPorts> {
        self.dependencies.as_ref()
    }

    pub(crate) fn set_dependencies(&mut self, dependencies: DependencyPorts) {
        self.dependencies = Some(dependencies);
    }
}
