// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-type node storage.
//!
//! Nodes are stored by value in one contiguous `Vec<N>` per concrete type and
//! addressed as `(type index, slot)`. Each type's [`NodeVTable`] is built once on
//! first insertion.

use crate::node::{BlueprintNode, Capabilities, NodeId, NodeVTable};
use crate::port::PortSet;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

/// Index of a registered node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIndex(pub(crate) u32);

impl TypeIndex {
    /// Raw index
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Location of one node instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    /// Concrete type
    pub type_index: TypeIndex,
    /// Slot within that type's storage
    pub slot: u32,
}

/// Registry of node types and their instances
#[derive(Default)]
pub struct NodeStorage {
    lookup: HashMap<TypeId, TypeIndex>,
    columns: Vec<Box<dyn Any>>,
    vtables: Vec<NodeVTable>,
}

impl NodeStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `N` if needed and return its type index
    pub fn register<N: BlueprintNode>(&mut self) -> TypeIndex {
        if let Some(index) = self.lookup.get(&TypeId::of::<N>()) {
            return *index;
        }

        let index = TypeIndex(self.vtables.len() as u32);
        let vtable = N::capabilities(Capabilities::new()).finish();
        tracing::debug!("Registered node type {:?}", vtable);

        self.columns.push(Box::new(Vec::<N>::new()));
        self.vtables.push(vtable);
        self.lookup.insert(TypeId::of::<N>(), index);
        index
    }

    /// Store a node by value
    pub fn insert<N: BlueprintNode>(&mut self, node: N) -> NodeAddress {
        let type_index = self.register::<N>();
        let Some(column) = self.columns[type_index.index()].downcast_mut::<Vec<N>>() else {
            unreachable!("column type is fixed at registration");
        };
        column.push(node);
        NodeAddress {
            type_index,
            slot: (column.len() - 1) as u32,
        }
    }

    /// Type index of `N`, if registered
    pub fn type_index<N: BlueprintNode>(&self) -> Option<TypeIndex> {
        self.lookup.get(&TypeId::of::<N>()).copied()
    }

    /// Borrow a node as its concrete type
    pub fn get<N: BlueprintNode>(&self, address: NodeAddress) -> Option<&N> {
        self.columns
            .get(address.type_index.index())?
            .downcast_ref::<Vec<N>>()?
            .get(address.slot as usize)
    }

    /// Mutably borrow a node as its concrete type
    pub fn get_mut<N: BlueprintNode>(&mut self, address: NodeAddress) -> Option<&mut N> {
        self.columns
            .get_mut(address.type_index.index())?
            .downcast_mut::<Vec<N>>()?
            .get_mut(address.slot as usize)
    }

    /// Capability table of a registered type
    pub fn vtable(&self, type_index: TypeIndex) -> &NodeVTable {
        &self.vtables[type_index.index()]
    }

    pub(crate) fn column(&self, type_index: TypeIndex) -> &dyn Any {
        self.columns[type_index.index()].as_ref()
    }

    /// Build the port set of the node at `address`
    pub fn create_ports(&self, address: NodeAddress, id: NodeId) -> PortSet {
        let mut ports = PortSet::new();
        let vtable = self.vtable(address.type_index);
        (vtable.create_ports)(self.column(address.type_index), address.slot as usize, &mut ports, id);
        ports
    }

    /// Number of registered types
    pub fn type_count(&self) -> usize {
        self.vtables.len()
    }
}

impl fmt::Debug for NodeStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStorage")
            .field("types", &self.vtables)
            .finish()
    }
}
