// SPDX-License-Identifier: MIT OR Apache-2.0
//! Delay: the asynchronous bridge.
//!
//! Entering starts a timer and returns immediately. `Completed` fires from the
//! runtime's completion pump, unless the activation was torn down or the delay
//! was cancelled in the meantime.

use crate::activation::{NodeToken, ReentryLatch, RootId};
use crate::execution::ExecutionContext;
use crate::node::{BlueprintNode, Capabilities, EnterPort, NodeId, NodeLifecycle};
use crate::port::{Port, PortIndex, PortSet};
use serde::{Deserialize, Serialize};

/// Per-token state of a [`Delay`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayState {
    /// Held while a timer is pending
    pub latch: ReentryLatch,
    /// Timers that ran to completion
    pub completed: u32,
}

/// Waits `seconds` of host time, then fires `Completed`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delay {
    /// Wait time
    pub seconds: f32,
}

impl Default for Delay {
    fn default() -> Self {
        Self { seconds: 1.0 }
    }
}

impl Delay {
    /// Start waiting; ignored while already waiting
    pub const IN: PortIndex = 0;
    /// Abandon the pending wait
    pub const CANCEL: PortIndex = 1;
    /// Fired when the wait elapses
    pub const COMPLETED: PortIndex = 2;

    /// Create a delay
    pub fn new(seconds: f32) -> Self {
        Self { seconds }
    }

    fn start(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken) {
        if !ctx.state_mut::<DelayState>(token).latch.try_enter() {
            tracing::trace!("{} already waiting", token);
            return;
        }
        let Some(scope) = ctx.scope(token) else {
            return;
        };

        ctx.defer(scope, self.seconds, move |ctx| {
            if !ctx.is_current(scope) {
                return;
            }
            let state = ctx.state_mut::<DelayState>(scope.token);
            state.latch.release();
            state.completed += 1;
            ctx.call(scope.token, Self::COMPLETED);
        });
    }

    fn cancel(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken) {
        if !ctx.state_mut::<DelayState>(token).latch.is_active() {
            return;
        }
        ctx.cancel(token);
        ctx.state_mut::<DelayState>(token).latch.release();
        tracing::debug!("{} cancelled", token);
    }
}

impl BlueprintNode for Delay {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        ports.push(Port::enter("Cancel"));
        ports.push(Port::exit("Completed"));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter().lifecycle()
    }
}

impl EnterPort for Delay {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        match port {
            Self::IN => self.start(ctx, token),
            Self::CANCEL => self.cancel(ctx, token),
            _ => {}
        }
    }
}

impl NodeLifecycle for Delay {
    fn on_deinitialize(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, root: RootId) {
        let waiting = ctx
            .state::<DelayState>(token)
            .is_some_and(|state| state.latch.is_active());
        if waiting {
            tracing::debug!("{} torn down while waiting (root {:?})", token, root.0);
        }
    }
}
