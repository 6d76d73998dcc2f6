// SPDX-License-Identifier: MIT OR Apache-2.0
//! Blueprint runtime for `OrdoPlay`.
//!
//! Executes authored node graphs against a running game. Graphs are compiled
//! once and then shared by any number of activations, each with its own state.
//!
//! ## Architecture
//!
//! - Nodes live in per-type contiguous storage and expose optional
//!   capabilities (enter ports, port values, lifecycle, hash links) through a
//!   per-type vtable
//! - Control flow is pushed: firing an exit runs every linked enter port in
//!   authored order before returning
//! - Data flow is pulled: reading an input evaluates the linked output on demand
//! - Runtime links are resolved lazily per port and invalidated explicitly
//! - All mutable node state is keyed by [`NodeToken`], never by [`NodeId`]
//! - Asynchronous work is bridged through cancellation scopes and a deferred
//!   queue pumped by [`Runtime::advance`]

pub mod activation;
pub mod blueprint;
pub mod deferred;
pub mod definition;
pub mod dependency;
pub mod error;
pub mod execution;
pub mod hash_link;
pub mod link;
pub mod node;
pub mod nodes;
pub mod port;
pub mod runtime;
pub mod settings;
pub mod storage;
pub mod value;

pub use activation::{ActivationId, ActivationTable, NodeToken, ReentryLatch, RootId, ScopeHandle};
pub use blueprint::{Blueprint, BlueprintBuilder, LinkInvalidation};
pub use definition::{GraphDefinition, NodeDefinition, NodeFactory};
pub use dependency::{DependencyResolver, DependencySetup, DependencyUser};
pub use error::{BlueprintError, Result};
pub use execution::ExecutionContext;
pub use hash_link::{HashLinkTable, LabelHash};
pub use link::Link;
pub use node::{
    BlueprintNode, Capabilities, EnterPort, HashLinkConsumer, HashLinkPublisher, NodeId,
    NodeLifecycle, PortValueSource,
};
pub use port::{Port, PortCapacity, PortIndex, PortKind, PortSet};
pub use runtime::Runtime;
pub use settings::{DuplicateLabelPolicy, RuntimeSettings};
pub use value::{PortData, Value, ValueType};

#[cfg(test)]
mod tests;
