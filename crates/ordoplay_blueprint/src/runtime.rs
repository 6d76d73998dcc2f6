// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host-facing runtime: one blueprint, any number of activations.
//!
//! The host attaches the graph to owners with [`Runtime::initialize`], drives it
//! with [`Runtime::call`] / [`Runtime::read`], pumps asynchronous completions with
//! [`Runtime::advance`] and detaches with [`Runtime::deinitialize`].

use crate::activation::{ActivationId, ActivationTable, NodeToken, RootId};
use crate::blueprint::Blueprint;
use crate::deferred::DeferredQueue;
use crate::execution::ExecutionContext;
use crate::port::PortIndex;
use crate::value::PortData;

/// A compiled blueprint together with its live activations
#[derive(Debug)]
pub struct Runtime {
    blueprint: Blueprint,
    activations: ActivationTable,
    deferred: DeferredQueue,
    clock: f64,
}

impl Runtime {
    /// Host a compiled blueprint
    pub fn new(blueprint: Blueprint) -> Self {
        Self {
            blueprint,
            activations: ActivationTable::new(),
            deferred: DeferredQueue::new(),
            clock: 0.0,
        }
    }

    /// The hosted blueprint
    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    /// Mutable access for reconfiguration between host calls
    pub fn blueprint_mut(&mut self) -> &mut Blueprint {
        &mut self.blueprint
    }

    /// Live activations and their per-token state
    pub fn activations(&self) -> &ActivationTable {
        &self.activations
    }

    /// Pending asynchronous continuations
    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    /// Host time accumulated by [`Self::advance`]
    pub fn now(&self) -> f64 {
        self.clock
    }

    /// Borrow an execution context for custom host logic
    pub fn context(&mut self) -> ExecutionContext<'_> {
        ExecutionContext::new(
            &self.blueprint,
            &mut self.activations,
            &mut self.deferred,
            self.clock,
        )
    }

    /// Attach the graph to an owner, minting a fresh activation
    pub fn initialize(&mut self, root: RootId) -> ActivationId {
        self.context().start_activation(root, None)
    }

    /// Start another activation under the same owner as `parent`
    pub fn initialize_child(&mut self, parent: ActivationId) -> Option<ActivationId> {
        self.context().spawn_activation(parent)
    }

    /// Tear down an activation and every activation it spawned
    pub fn deinitialize(&mut self, activation: ActivationId) -> bool {
        self.context().stop_activation(activation)
    }

    /// Tear down every activation owned by `root`, returning how many were live
    pub fn deinitialize_root(&mut self, root: RootId) -> usize {
        let live = self.activations.len();
        for activation in self.activations.owned_by(root) {
            self.deinitialize(activation);
        }
        let stopped = live - self.activations.len();
        tracing::debug!("Deinitialized {} activations of root {:?}", stopped, root.0);
        stopped
    }

    /// Check if an activation is live
    pub fn is_active(&self, activation: ActivationId) -> bool {
        self.activations.is_live(activation)
    }

    /// Fire an exit port of a node
    pub fn call(&mut self, token: NodeToken, exit: PortIndex) {
        self.context().call(token, exit);
    }

    /// Enter a node through one of its enter ports
    pub fn enter(&mut self, token: NodeToken, port: PortIndex) {
        self.context().enter(token, port);
    }

    /// Pull the value linked to an input port
    pub fn read<T: PortData>(&mut self, token: NodeToken, input: PortIndex, default: T) -> T {
        self.context().read(token, input, default)
    }

    /// Evaluate an output port of a node
    pub fn read_output<T: PortData>(&mut self, token: NodeToken, output: PortIndex, default: T) -> T {
        self.context().output(token, output, default)
    }

    /// State of a node in one activation
    pub fn state<S: 'static>(&self, token: NodeToken) -> Option<&S> {
        self.activations.state(token)
    }

    /// Advance host time and run continuations that became due.
    ///
    /// Returns the number of continuations that ran. Work scheduled while pumping
    /// waits for the next call.
    pub fn advance(&mut self, seconds: f32) -> usize {
        self.clock += f64::from(seconds.max(0.0));
        let due = self.deferred.take_due(self.clock);
        let mut ran = 0;

        for job in due {
            if !self.activations.is_current(job.scope) {
                tracing::debug!("Discarding cancelled continuation of {}", job.scope.token);
                continue;
            }
            tracing::trace!("Running continuation of {} (due {:.3})", job.scope.token, job.due);
            (job.run)(&mut self.context());
            ran += 1;
        }

        ran
    }
}
