// SPDX-License-Identifier: MIT OR Apache-2.0
//! Nodes shipped with the runtime.
//!
//! Gameplay code implements its own nodes against the same contracts; these
//! cover the basic control and data plumbing every graph needs.

pub mod actions;
pub mod data;
pub mod delay;
pub mod flow;
pub mod labels;

pub use actions::{Action, ActionList, ActionState, ResolvedAction};
pub use data::{AddInt, Constant};
pub use delay::{Delay, DelayState};
pub use flow::{Branch, Counter, CounterState, EventEntry, Print, PrintLog, Sequence};
pub use labels::{Goto, Label};
