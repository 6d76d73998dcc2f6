// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deferred continuations for nodes that finish asynchronously.

use crate::activation::{ActivationId, ScopeHandle};
use crate::execution::ExecutionContext;
use std::fmt;

/// Work a node scheduled to run later
pub type Continuation = Box<dyn FnOnce(&mut ExecutionContext<'_>)>;

pub(crate) struct Deferred {
    pub(crate) due: f64,
    sequence: u64,
    pub(crate) scope: ScopeHandle,
    pub(crate) run: Continuation,
}

/// Pending continuations ordered by due time, then by scheduling order
#[derive(Default)]
pub struct DeferredQueue {
    pending: Vec<Deferred>,
    sequence: u64,
}

impl DeferredQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, due: f64, scope: ScopeHandle, run: Continuation) {
        self.pending.push(Deferred {
            due,
            sequence: self.sequence,
            scope,
            run,
        });
        self.sequence += 1;
    }

    /// Remove and return everything due at `now`, earliest first
    pub(crate) fn take_due(&mut self, now: f64) -> Vec<Deferred> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|job| job.due <= now);
        self.pending = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.sequence.cmp(&b.sequence)));
        due
    }

    /// Forget everything scheduled from `activation`
    pub(crate) fn drop_activation(&mut self, activation: ActivationId) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|job| job.scope.token.activation != activation);
        before - self.pending.len()
    }

    /// Number of pending continuations
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest due time, if anything is pending
    pub fn next_due(&self) -> Option<f64> {
        self.pending.iter().map(|job| job.due).min_by(f64::total_cmp)
    }
}

impl fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.pending.len())
            .field("next_due", &self.next_due())
            .finish()
    }
}
