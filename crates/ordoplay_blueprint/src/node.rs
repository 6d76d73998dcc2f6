// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node contracts and the per-type capability table.
//!
//! A node type implements [`BlueprintNode`] plus any subset of the capability
//! traits in this module. The capabilities it actually has are declared once in
//! [`BlueprintNode::capabilities`], which fills a [`NodeVTable`] of plain function
//! pointers. The storage resolves a type index to that table once and every later
//! dispatch goes through it without checking the column's type again.

use crate::activation::{NodeToken, RootId};
use crate::execution::ExecutionContext;
use crate::hash_link::LabelHash;
use crate::port::{PortIndex, PortSet};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// Stable identity of one authored node within a graph definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Base contract every node type implements.
///
/// `create_ports` must be deterministic: the same configuration yields the same
/// ports in the same order on every call.
pub trait BlueprintNode: 'static {
    /// Append this node's ports to `ports`
    fn create_ports(&self, ports: &mut PortSet, id: NodeId);

    /// Declare the optional capabilities this type implements
    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self>
    where
        Self: Sized,
    {
        caps
    }
}

/// Nodes with control inputs
pub trait EnterPort: BlueprintNode {
    /// Control reached one of this node's enter ports
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex);
}

/// Nodes with data outputs
pub trait PortValueSource: BlueprintNode {
    /// Evaluate an output port. `None` makes the reader fall back to its default.
    fn get_port_value(
        &self,
        ctx: &mut ExecutionContext<'_>,
        token: NodeToken,
        port: PortIndex,
    ) -> Option<Value>;
}

/// Nodes that react to an activation being attached to or detached from its owner
pub trait NodeLifecycle: BlueprintNode {
    /// Activation started
    fn on_initialize(&self, _ctx: &mut ExecutionContext<'_>, _token: NodeToken, _root: RootId) {}

    /// Activation is being torn down; the node's scope is still current here
    fn on_deinitialize(&self, _ctx: &mut ExecutionContext<'_>, _token: NodeToken, _root: RootId) {
    }
}

/// Nodes that publish one of their enter ports under a label hash
pub trait HashLinkPublisher: BlueprintNode {
    /// The enter port and hash this node publishes, if any
    fn published_label(&self, id: NodeId) -> Option<(PortIndex, LabelHash)>;
}

/// Nodes whose exit ports jump to a published label instead of following authored links
pub trait HashLinkConsumer: BlueprintNode {
    /// Label requested by `port`, or `None` if the port uses authored links
    fn consumed_label(&self, port: PortIndex) -> Option<LabelHash>;
}

pub(crate) type CreatePortsFn = fn(&dyn Any, usize, &mut PortSet, NodeId);
pub(crate) type EnterFn = fn(&dyn Any, usize, &mut ExecutionContext<'_>, NodeToken, PortIndex);
pub(crate) type ValueFn =
    fn(&dyn Any, usize, &mut ExecutionContext<'_>, NodeToken, PortIndex) -> Option<Value>;
pub(crate) type LifecycleFn = fn(&dyn Any, usize, &mut ExecutionContext<'_>, NodeToken, RootId);
pub(crate) type PublishFn = fn(&dyn Any, usize, NodeId) -> Option<(PortIndex, LabelHash)>;
pub(crate) type ConsumeFn = fn(&dyn Any, usize, PortIndex) -> Option<LabelHash>;

/// Capability dispatch table for one concrete node type
#[derive(Clone, Copy)]
pub struct NodeVTable {
    type_name: &'static str,
    pub(crate) create_ports: CreatePortsFn,
    pub(crate) on_enter_port: Option<EnterFn>,
    pub(crate) get_port_value: Option<ValueFn>,
    pub(crate) on_initialize: Option<LifecycleFn>,
    pub(crate) on_deinitialize: Option<LifecycleFn>,
    pub(crate) published_label: Option<PublishFn>,
    pub(crate) consumed_label: Option<ConsumeFn>,
}

impl NodeVTable {
    /// Rust type name of the node type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the type accepts control flow
    pub fn has_enter(&self) -> bool {
        self.on_enter_port.is_some()
    }

    /// Whether the type produces data
    pub fn has_values(&self) -> bool {
        self.get_port_value.is_some()
    }

    /// Whether the type publishes a label
    pub fn publishes_labels(&self) -> bool {
        self.published_label.is_some()
    }

    /// Whether the type consumes labels
    pub fn consumes_labels(&self) -> bool {
        self.consumed_label.is_some()
    }
}

impl fmt::Debug for NodeVTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeVTable")
            .field("type_name", &self.type_name)
            .field("enter", &self.has_enter())
            .field("values", &self.has_values())
            .field("lifecycle", &self.on_initialize.is_some())
            .field("publishes", &self.publishes_labels())
            .field("consumes", &self.consumes_labels())
            .finish()
    }
}

/// Builder handed to [`BlueprintNode::capabilities`]
pub struct Capabilities<N> {
    table: NodeVTable,
    _node: PhantomData<fn() -> N>,
}

impl<N: BlueprintNode> Capabilities<N> {
    pub(crate) fn new() -> Self {
        Self {
            table: NodeVTable {
                type_name: std::any::type_name::<N>(),
                create_ports: create_ports_thunk::<N>,
                on_enter_port: None,
                get_port_value: None,
                on_initialize: None,
                on_deinitialize: None,
                published_label: None,
                consumed_label: None,
            },
            _node: PhantomData,
        }
    }

    /// Dispatch control flow to [`EnterPort::on_enter_port`]
    pub fn enter(mut self) -> Self
    where
        N: EnterPort,
    {
        self.table.on_enter_port = Some(enter_thunk::<N>);
        self
    }

    /// Dispatch pull reads to [`PortValueSource::get_port_value`]
    pub fn values(mut self) -> Self
    where
        N: PortValueSource,
    {
        self.table.get_port_value = Some(value_thunk::<N>);
        self
    }

    /// Call [`NodeLifecycle`] hooks on activation start and teardown
    pub fn lifecycle(mut self) -> Self
    where
        N: NodeLifecycle,
    {
        self.table.on_initialize = Some(initialize_thunk::<N>);
        self.table.on_deinitialize = Some(deinitialize_thunk::<N>);
        self
    }

    /// Register with the hash-link resolver as a publisher
    pub fn publishes_labels(mut self) -> Self
    where
        N: HashLinkPublisher,
    {
        self.table.published_label = Some(publish_thunk::<N>);
        self
    }

    /// Resolve exit ports through the hash-link table
    pub fn consumes_labels(mut self) -> Self
    where
        N: HashLinkConsumer,
    {
        self.table.consumed_label = Some(consume_thunk::<N>);
        self
    }

    pub(crate) fn finish(self) -> NodeVTable {
        self.table
    }
}

#[allow(unsafe_code)] // Column type is fixed when the vtable is built
fn slot<N: 'static>(column: &dyn Any, slot: usize) -> Option<&N> {
    debug_assert!(column.is::<Vec<N>>(), "column is not Vec<{}>", std::any::type_name::<N>());
    // SAFETY: thunks for `N` are only installed in `N`'s vtable, and `NodeStorage`
    // hands them nothing but the column registered together with that vtable,
    // which is always a `Vec<N>`.
    let column = unsafe { &*(column as *const dyn Any).cast::<Vec<N>>() };
    column.get(slot)
}

fn create_ports_thunk<N: BlueprintNode>(column: &dyn Any, index: usize, ports: &mut PortSet, id: NodeId) {
    if let Some(node) = slot::<N>(column, index) {
        node.create_ports(ports, id);
    }
}

fn enter_thunk<N: EnterPort>(
    column: &dyn Any,
    index: usize,
    ctx: &mut ExecutionContext<'_>,
    token: NodeToken,
    port: PortIndex,
) {
    if let Some(node) = slot::<N>(column, index) {
        node.on_enter_port(ctx, token, port);
    }
}

fn value_thunk<N: PortValueSource>(
    column: &dyn Any,
    index: usize,
    ctx: &mut ExecutionContext<'_>,
    token: NodeToken,
    port: PortIndex,
) -> Option<Value> {
    slot::<N>(column, index)?.get_port_value(ctx, token, port)
}

fn initialize_thunk<N: NodeLifecycle>(
    column: &dyn Any,
    index: usize,
    ctx: &mut ExecutionContext<'_>,
    token: NodeToken,
    root: RootId,
) {
    if let Some(node) = slot::<N>(column, index) {
        node.on_initialize(ctx, token, root);
    }
}

fn deinitialize_thunk<N: NodeLifecycle>(
    column: &dyn Any,
    index: usize,
    ctx: &mut ExecutionContext<'_>,
    token: NodeToken,
    root: RootId,
) {
    if let Some(node) = slot::<N>(column, index) {
        node.on_deinitialize(ctx, token, root);
    }
}

fn publish_thunk<N: HashLinkPublisher>(
    column: &dyn Any,
    index: usize,
    id: NodeId,
) -> Option<(PortIndex, LabelHash)> {
    slot::<N>(column, index)?.published_label(id)
}

fn consume_thunk<N: HashLinkConsumer>(
    column: &dyn Any,
    index: usize,
    port: PortIndex,
) -> Option<LabelHash> {
    slot::<N>(column, index)?.consumed_label(port)
}
