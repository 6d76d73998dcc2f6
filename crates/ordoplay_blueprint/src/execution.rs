// SPDX-License-Identifier: MIT OR Apache-2.0
//! The context nodes call back into while executing.
//!
//! Two protocols share it:
//! - control (push): [`ExecutionContext::call`] invokes every enter port linked
//!   to an exit port, depth first and in authored order, before returning;
//! - data (pull): [`ExecutionContext::read`] evaluates the output linked to an
//!   input port on demand, falling back to the caller's default.
//!
//! Reads are not memoized. A value feeding two inputs is evaluated once per read.
//! The context keeps no reentry guard either; nodes that must not be re-entered
//! latch themselves (see [`crate::activation::ReentryLatch`]).

use crate::activation::{ActivationId, ActivationTable, NodeToken, RootId, ScopeHandle};
use crate::blueprint::Blueprint;
use crate::deferred::DeferredQueue;
use crate::port::{PortIndex, PortKind};
use crate::storage::NodeAddress;
use crate::value::{PortData, Value};

/// Execution state borrowed from a [`crate::runtime::Runtime`] for one host call
pub struct ExecutionContext<'r> {
    blueprint: &'r Blueprint,
    activations: &'r mut ActivationTable,
    deferred: &'r mut DeferredQueue,
    clock: f64,
}

impl<'r> ExecutionContext<'r> {
    pub(crate) fn new(
        blueprint: &'r Blueprint,
        activations: &'r mut ActivationTable,
        deferred: &'r mut DeferredQueue,
        clock: f64,
    ) -> Self {
        Self {
            blueprint,
            activations,
            deferred,
            clock,
        }
    }

    /// The blueprint being executed
    pub fn blueprint(&self) -> &'r Blueprint {
        self.blueprint
    }

    /// Host time in seconds, as advanced by the runtime
    pub fn now(&self) -> f64 {
        self.clock
    }

    /// Fire an exit port: run every linked enter port, in order, to completion
    pub fn call(&mut self, token: NodeToken, exit: PortIndex) {
        if !self.activations.is_live(token.activation) {
            tracing::debug!("Ignoring call on {}: activation is not live", token);
            return;
        }

        let blueprint = self.blueprint;
        match blueprint.port_kind(token.node, exit) {
            Some(PortKind::Exit) => {}
            Some(kind) => {
                tracing::warn!("Ignoring call on {}:{}: {:?} is not an exit", token, exit, kind);
                return;
            }
            None => {
                tracing::trace!("{}:{} is not a port", token, exit);
                return;
            }
        }
        let Some(runtime_port) = blueprint.runtime_port(token.node, exit) else {
            return;
        };

        tracing::trace!("Call {}:{} -> {} links", token, exit, runtime_port.len());
        for link in runtime_port.links() {
            self.dispatch_enter(token.with_node(link.node), link.address, link.port);
        }
    }

    /// Enter a node directly, as if an exit linked to `port` had fired
    pub fn enter(&mut self, token: NodeToken, port: PortIndex) {
        if !self.activations.is_live(token.activation) {
            tracing::debug!("Ignoring entry into {}: activation is not live", token);
            return;
        }
        let Some(address) = self.blueprint.address(token.node) else {
            tracing::debug!("Ignoring entry into unknown node {}", token.node);
            return;
        };
        self.dispatch_enter(token, address, port);
    }

    fn dispatch_enter(&mut self, token: NodeToken, address: NodeAddress, port: PortIndex) {
        let blueprint = self.blueprint;
        if blueprint.port_kind(token.node, port) != Some(PortKind::Enter) {
            tracing::warn!("Skipping entry into {}:{}: not an enter port", token, port);
            return;
        }

        let storage = blueprint.storage();
        let vtable = storage.vtable(address.type_index);
        let Some(on_enter_port) = vtable.on_enter_port else {
            tracing::warn!("{} ({}) has no enter ports", token, vtable.type_name());
            return;
        };
        on_enter_port(
            storage.column(address.type_index),
            address.slot as usize,
            self,
            token,
            port,
        );
    }

    /// Pull the value linked to an input port, or `default` if unlinked or unconvertible
    pub fn read<T: PortData>(&mut self, token: NodeToken, input: PortIndex, default: T) -> T {
        let Some(value) = self.read_value(token, input) else {
            return default;
        };
        convert(token, input, value, default)
    }

    /// Pull the raw value linked to an input port
    pub fn read_value(&mut self, token: NodeToken, input: PortIndex) -> Option<Value> {
        if !self.activations.is_live(token.activation) {
            return None;
        }

        let blueprint = self.blueprint;
        if !matches!(blueprint.port_kind(token.node, input), Some(PortKind::Input(_))) {
            tracing::trace!("{}:{} is not an input", token, input);
            return None;
        }
        let link = *blueprint.runtime_port(token.node, input)?.first()?;
        tracing::trace!("Read {}:{} <- {}:{}", token, input, link.node, link.port);
        self.dispatch_value(token.with_node(link.node), link.address, link.port)
    }

    /// Evaluate one of a node's own output ports
    pub fn output<T: PortData>(&mut self, token: NodeToken, output: PortIndex, default: T) -> T {
        if !self.activations.is_live(token.activation) {
            return default;
        }
        let Some(address) = self.blueprint.address(token.node) else {
            return default;
        };
        match self.dispatch_value(token, address, output) {
            Some(value) => convert(token, output, value, default),
            None => default,
        }
    }

    fn dispatch_value(
        &mut self,
        token: NodeToken,
        address: NodeAddress,
        port: PortIndex,
    ) -> Option<Value> {
        let blueprint = self.blueprint;
        if !matches!(blueprint.port_kind(token.node, port), Some(PortKind::Output(_))) {
            tracing::warn!("Skipping read of {}:{}: not an output", token, port);
            return None;
        }

        let storage = blueprint.storage();
        let get_port_value = storage.vtable(address.type_index).get_port_value?;
        get_port_value(
            storage.column(address.type_index),
            address.slot as usize,
            self,
            token,
            port,
        )
    }

    /// Mutable state of the node behind `token`, created on first use
    pub fn state_mut<S: Default + 'static>(&mut self, token: NodeToken) -> &mut S {
        self.activations.state_mut(token)
    }

    /// State of the node behind `token`, if any was created
    pub fn state<S: 'static>(&self, token: NodeToken) -> Option<&S> {
        self.activations.state(token)
    }

    /// Current cancellation scope of `token`
    pub fn scope(&self, token: NodeToken) -> Option<ScopeHandle> {
        self.activations.scope(token)
    }

    /// Cancel everything captured under the current scope and return the new one
    pub fn cancel(&mut self, token: NodeToken) -> Option<ScopeHandle> {
        self.activations.cancel_scope(token)
    }

    /// Check whether a captured scope is still current
    pub fn is_current(&self, handle: ScopeHandle) -> bool {
        self.activations.is_current(handle)
    }

    /// Run `continuation` once `delay` seconds of host time have passed.
    ///
    /// It is discarded without running if `scope` is no longer current by then.
    pub fn defer(
        &mut self,
        scope: ScopeHandle,
        delay: f32,
        continuation: impl FnOnce(&mut ExecutionContext<'_>) + 'static,
    ) {
        let due = self.clock + f64::from(delay.max(0.0));
        tracing::trace!("Deferred work for {} due at {:.3}", scope.token, due);
        self.deferred.push(due, scope, Box::new(continuation));
    }

    /// Owner of an activation
    pub fn root(&self, activation: ActivationId) -> Option<RootId> {
        self.activations.record(activation).map(|record| record.root)
    }

    /// Start another activation under the same owner as `parent`
    pub fn spawn_activation(&mut self, parent: ActivationId) -> Option<ActivationId> {
        let root = self.root(parent)?;
        Some(self.start_activation(root, Some(parent)))
    }

    pub(crate) fn start_activation(
        &mut self,
        root: RootId,
        parent: Option<ActivationId>,
    ) -> ActivationId {
        let activation = self.activations.mint(root, parent);
        let blueprint = self.blueprint;

        for id in blueprint.node_ids() {
            self.activations.open_scope(NodeToken::new(id, activation));
        }

        let storage = blueprint.storage();
        for id in blueprint.node_ids() {
            let Some(address) = blueprint.address(id) else {
                continue;
            };
            if let Some(on_initialize) = storage.vtable(address.type_index).on_initialize {
                on_initialize(
                    storage.column(address.type_index),
                    address.slot as usize,
                    self,
                    NodeToken::new(id, activation),
                    root,
                );
            }
        }

        tracing::debug!("Initialized activation {} of '{}'", activation, blueprint.name());
        activation
    }

    pub(crate) fn stop_activation(&mut self, activation: ActivationId) -> bool {
        for child in self.activations.children_of(activation) {
            self.stop_activation(child);
        }

        let Some(root) = self.root(activation) else {
            return false;
        };

        let blueprint = self.blueprint;
        let storage = blueprint.storage();
        for id in blueprint.node_ids() {
            let Some(address) = blueprint.address(id) else {
                continue;
            };
            if let Some(on_deinitialize) = storage.vtable(address.type_index).on_deinitialize {
                on_deinitialize(
                    storage.column(address.type_index),
                    address.slot as usize,
                    self,
                    NodeToken::new(id, activation),
                    root,
                );
            }
        }

        self.activations.retire(activation);
        let dropped = self.deferred.drop_activation(activation);
        tracing::debug!(
            "Deinitialized activation {} ({} pending continuations dropped)",
            activation,
            dropped
        );
        true
    }
}

fn convert<T: PortData>(token: NodeToken, port: PortIndex, value: Value, default: T) -> T {
    let value_type = value.value_type();
    match T::from_value(value) {
        Some(converted) => converted,
        None => {
            tracing::warn!(
                "{}:{} produced {}, expected {}; using default",
                token,
                port,
                value_type,
                T::VALUE_TYPE
            );
            default
        }
    }
}
