// SPDX-License-Identifier: MIT OR Apache-2.0
//! Activation identities, cancellation scopes and per-token node state.
//!
//! A node definition is shared by every run of its graph. Everything mutable is
//! keyed by [`NodeToken`], so two activations of the same node never observe
//! each other's state.

use crate::node::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identity of the owner a set of activations is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootId(pub Uuid);

impl RootId {
    /// Create a new random root ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RootId {
    fn default() -> Self {
        Self::new()
    }
}

/// One independent run of a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivationId(pub u32);

impl fmt::Display for ActivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0)
    }
}

/// Runtime key of a node: its definition plus the activation it runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeToken {
    /// Authored node
    pub node: NodeId,
    /// Activation the node runs in
    pub activation: ActivationId,
}

impl NodeToken {
    /// Create a token
    pub fn new(node: NodeId, activation: ActivationId) -> Self {
        Self { node, activation }
    }

    /// Token of another node in the same activation
    pub fn with_node(self, node: NodeId) -> Self {
        Self {
            node,
            activation: self.activation,
        }
    }
}

impl fmt::Display for NodeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node, self.activation)
    }
}

/// Snapshot of a token's cancellation scope.
///
/// Asynchronous continuations capture one of these and check it is still
/// current before touching state or calling further ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeHandle {
    /// Token the scope belongs to
    pub token: NodeToken,
    generation: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    generation: u64,
    open: bool,
}

/// Two-state latch for nodes that must not be re-entered mid-activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReentryLatch {
    /// Ready to accept entry
    #[default]
    Idle,
    /// Currently running
    Active,
}

impl ReentryLatch {
    /// Move to `Active`. Returns false if already active.
    pub fn try_enter(&mut self) -> bool {
        match self {
            Self::Idle => {
                *self = Self::Active;
                true
            }
            Self::Active => false,
        }
    }

    /// Move back to `Idle`
    pub fn release(&mut self) {
        *self = Self::Idle;
    }

    /// Check if the latch is held
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Bookkeeping for one live activation
#[derive(Debug, Clone, Copy)]
pub struct ActivationRecord {
    /// Owner the activation was initialized for
    pub root: RootId,
    /// Activation that spawned this one, if any
    pub parent: Option<ActivationId>,
}

/// Live activations with their scopes and node state
#[derive(Default)]
pub struct ActivationTable {
    next: u32,
    live: IndexMap<ActivationId, ActivationRecord>,
    scopes: HashMap<NodeToken, Scope>,
    states: HashMap<(NodeToken, TypeId), Box<dyn Any>>,
}

impl ActivationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mint(&mut self, root: RootId, parent: Option<ActivationId>) -> ActivationId {
        let id = ActivationId(self.next);
        self.next += 1;
        self.live.insert(id, ActivationRecord { root, parent });
        id
    }

    pub(crate) fn retire(&mut self, activation: ActivationId) -> Option<ActivationRecord> {
        let record = self.live.shift_remove(&activation)?;
        self.scopes.retain(|token, _| token.activation != activation);
        self.states.retain(|(token, _), _| token.activation != activation);
        Some(record)
    }

    /// Check if an activation is live
    pub fn is_live(&self, activation: ActivationId) -> bool {
        self.live.contains_key(&activation)
    }

    /// Look up a live activation
    pub fn record(&self, activation: ActivationId) -> Option<&ActivationRecord> {
        self.live.get(&activation)
    }

    /// Live activations in creation order
    pub fn ids(&self) -> impl Iterator<Item = ActivationId> + '_ {
        self.live.keys().copied()
    }

    /// Live activations owned by `root`
    pub fn owned_by(&self, root: RootId) -> Vec<ActivationId> {
        self.live
            .iter()
            .filter(|(_, record)| record.root == root)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Live activations spawned by `parent`
    pub fn children_of(&self, parent: ActivationId) -> Vec<ActivationId> {
        self.live
            .iter()
            .filter(|(_, record)| record.parent == Some(parent))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of live activations
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no activation is live
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Open a fresh scope for `token`, invalidating any earlier handle
    pub(crate) fn open_scope(&mut self, token: NodeToken) -> ScopeHandle {
        let scope = self.scopes.entry(token).or_default();
        scope.generation += 1;
        scope.open = true;
        ScopeHandle {
            token,
            generation: scope.generation,
        }
    }

    /// Cancel outstanding work for `token` and hand out the new handle
    pub(crate) fn cancel_scope(&mut self, token: NodeToken) -> Option<ScopeHandle> {
        if !self.is_live(token.activation) {
            return None;
        }
        Some(self.open_scope(token))
    }

    /// Current scope of `token`, if its activation is live
    pub fn scope(&self, token: NodeToken) -> Option<ScopeHandle> {
        let scope = self.scopes.get(&token)?;
        scope.open.then_some(ScopeHandle {
            token,
            generation: scope.generation,
        })
    }

    /// Check if a captured handle still matches its token's scope
    pub fn is_current(&self, handle: ScopeHandle) -> bool {
        self.scopes
            .get(&handle.token)
            .is_some_and(|scope| scope.open && scope.generation == handle.generation)
    }

    /// Per-token state of type `S`, created on first access.
    ///
    /// A token may hold one state of each type.
    pub fn state_mut<S: Default + 'static>(&mut self, token: NodeToken) -> &mut S {
        let slot = self
            .states
            .entry((token, TypeId::of::<S>()))
            .or_insert_with(|| Box::new(S::default()));
        match slot.downcast_mut::<S>() {
            Some(state) => state,
            None => unreachable!("state slots are keyed by their type"),
        }
    }

    /// Per-token state of type `S`, if it exists
    pub fn state<S: 'static>(&self, token: NodeToken) -> Option<&S> {
        self.states.get(&(token, TypeId::of::<S>()))?.downcast_ref::<S>()
    }

    /// Number of scopes held for live activations
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }
}

impl fmt::Debug for ActivationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationTable")
            .field("live", &self.live)
            .field("scopes", &self.scopes.len())
            .field("states", &self.states.len())
            .finish()
    }
}
