// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dynamic input ports driven by nested data requests.
//!
//! A node holding nested sub-objects asks each of them, while creating its
//! ports, which value types they need. The distinct types are appended as
//! ordinary input ports after the node's static ports, so they can be linked
//! like any other input. Before use, a [`DependencyResolver`] reads them back
//! in the order the requests were made.

use crate::activation::NodeToken;
use crate::execution::ExecutionContext;
use crate::port::{Port, PortIndex, PortSet};
use crate::value::{PortData, ValueType};
use indexmap::IndexSet;

/// Sub-objects that need externally supplied data
pub trait DependencyUser {
    /// What the sub-object produces once its dependencies are known
    type Resolved;

    /// Register the value types this sub-object needs
    fn setup_dependencies(&self, setup: &mut DependencySetup);

    /// Read the registered dependencies for one activation
    fn resolve_dependencies(
        &self,
        resolver: &mut DependencyResolver<'_>,
        ctx: &mut ExecutionContext<'_>,
    ) -> Self::Resolved;
}

/// Collects requested types in first-request order, without duplicates.
///
/// Every request is also remembered in sequence, so the resolve pass can walk
/// them with a cursor.
#[derive(Debug, Clone, Default)]
pub struct DependencySetup {
    requested: IndexSet<ValueType>,
    sequence: Vec<usize>,
}

impl DependencySetup {
    /// Create an empty request list
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a value of type `T`
    pub fn request<T: PortData>(&mut self) {
        self.request_type(T::VALUE_TYPE);
    }

    /// Request a value of an explicit type
    pub fn request_type(&mut self, value_type: ValueType) {
        let (offset, _) = self.requested.insert_full(value_type);
        self.sequence.push(offset);
    }

    /// Number of distinct requested types
    pub fn len(&self) -> usize {
        self.requested.len()
    }

    /// Whether nothing was requested
    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }

    /// Number of requests, duplicates included
    pub fn requests(&self) -> usize {
        self.sequence.len()
    }

    /// Append one input port per requested type and return the first dynamic index
    pub fn append_ports(self, ports: &mut PortSet) -> PortIndex {
        let first = ports.len();
        for value_type in &self.requested {
            ports.push(Port::input_of(value_type.name(), *value_type));
        }
        ports.set_dependencies(DependencyPorts {
            first,
            sequence: self.sequence.iter().map(|offset| first + offset).collect(),
            types: self.requested,
        });
        first
    }
}

/// The dynamic tail of a port set
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyPorts {
    first: PortIndex,
    types: IndexSet<ValueType>,
    sequence: Vec<PortIndex>,
}

impl DependencyPorts {
    /// Index of the first dynamic port
    pub fn first(&self) -> PortIndex {
        self.first
    }

    /// Requested types in port order
    pub fn types(&self) -> impl Iterator<Item = ValueType> + '_ {
        self.types.iter().copied()
    }

    /// Number of dynamic ports
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether there are no dynamic ports
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Port carrying `value_type`
    pub fn port_for(&self, value_type: ValueType) -> Option<PortIndex> {
        self.types
            .get_index_of(&value_type)
            .map(|offset| self.first + offset)
    }

    /// Port read by the request at `position` in registration order
    pub fn request_port(&self, position: usize) -> Option<PortIndex> {
        self.sequence.get(position).copied()
    }

    fn port_type(&self, port: PortIndex) -> Option<ValueType> {
        self.types.get_index(port.checked_sub(self.first)?).copied()
    }
}

/// One resolve pass over a node's dynamic ports.
///
/// Sub-objects resolve in the order they requested. Each [`Self::resolve`]
/// reads the port of the request under the cursor and moves the cursor on.
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'r> {
    token: NodeToken,
    ports: Option<&'r DependencyPorts>,
    cursor: usize,
}

impl<'r> DependencyResolver<'r> {
    /// Start a pass for the node behind `token`, with the cursor on the first request
    pub fn begin(ctx: &ExecutionContext<'r>, token: NodeToken) -> Self {
        let ports = ctx
            .blueprint()
            .ports(token.node)
            .and_then(PortSet::dependencies);
        Self {
            token,
            ports,
            cursor: 0,
        }
    }

    /// Read the next dependency, or `default` if it is unlinked.
    ///
    /// A request of the wrong type, or one past the last registered request,
    /// yields `default` and is logged.
    pub fn resolve<T: PortData>(&mut self, ctx: &mut ExecutionContext<'_>, default: T) -> T {
        let position = self.cursor;
        self.cursor += 1;

        let Some((ports, port)) = self
            .ports
            .and_then(|ports| Some((ports, ports.request_port(position)?)))
        else {
            tracing::warn!(
                "{} resolved {} past its {} registered requests",
                self.token,
                T::VALUE_TYPE,
                self.ports.map_or(0, |ports| ports.sequence.len())
            );
            return default;
        };

        if ports.port_type(port) != Some(T::VALUE_TYPE) {
            tracing::warn!(
                "{} resolved {} from port {} registered as {:?}",
                self.token,
                T::VALUE_TYPE,
                port,
                ports.port_type(port)
            );
            return default;
        }
        ctx.read(self.token, port, default)
    }

    /// Port the next [`Self::resolve`] reads from
    pub fn cursor(&self) -> Option<PortIndex> {
        self.ports?.request_port(self.cursor)
    }
}
