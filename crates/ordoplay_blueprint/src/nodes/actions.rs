// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action lists: a node whose nested actions pull their own inputs.
//!
//! Each [`Action`] asks for the value types it needs while the list creates its
//! ports. The list exposes one dynamic input per distinct type, so two actions
//! asking for an `Int` share the same `Int` port.

use crate::activation::NodeToken;
use crate::dependency::{DependencyResolver, DependencySetup, DependencyUser};
use crate::execution::ExecutionContext;
use crate::node::{BlueprintNode, Capabilities, EnterPort, NodeId, PortValueSource};
use crate::port::{Port, PortIndex, PortSet};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A nested action of an [`ActionList`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Add an `Int` to the score
    AddScore {
        /// Used when the `Int` port is unlinked
        default: i32,
    },
    /// Record a `String`
    Announce {
        /// Used when the `String` port is unlinked
        default: String,
    },
    /// Store a `Bool`
    SetFlag {
        /// Used when the `Bool` port is unlinked
        default: bool,
    },
}

/// An [`Action`] with its input read for one activation
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedAction {
    /// Add to the score
    AddScore(i32),
    /// Record a message
    Announce(String),
    /// Store the flag
    SetFlag(bool),
}

impl DependencyUser for Action {
    type Resolved = ResolvedAction;

    fn setup_dependencies(&self, setup: &mut DependencySetup) {
        match self {
            Self::AddScore { .. } => setup.request::<i32>(),
            Self::Announce { .. } => setup.request::<String>(),
            Self::SetFlag { .. } => setup.request::<bool>(),
        }
    }

    fn resolve_dependencies(
        &self,
        resolver: &mut DependencyResolver<'_>,
        ctx: &mut ExecutionContext<'_>,
    ) -> ResolvedAction {
        match self {
            Self::AddScore { default } => ResolvedAction::AddScore(resolver.resolve(ctx, *default)),
            Self::Announce { default } => {
                ResolvedAction::Announce(resolver.resolve(ctx, default.clone()))
            }
            Self::SetFlag { default } => ResolvedAction::SetFlag(resolver.resolve(ctx, *default)),
        }
    }
}

/// Per-token state of an [`ActionList`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionState {
    /// Sum of every applied `AddScore`
    pub score: i32,
    /// Every applied `Announce`, in order
    pub announcements: Vec<String>,
    /// Last applied `SetFlag`
    pub flag: bool,
}

impl ActionState {
    fn apply(&mut self, action: ResolvedAction) {
        match action {
            ResolvedAction::AddScore(amount) => self.score = self.score.wrapping_add(amount),
            ResolvedAction::Announce(message) => self.announcements.push(message),
            ResolvedAction::SetFlag(flag) => self.flag = flag,
        }
    }
}

/// Runs its actions in order, then continues
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionList {
    /// Actions, applied in order
    pub actions: Vec<Action>,
}

impl ActionList {
    /// Control input
    pub const IN: PortIndex = 0;
    /// Fired after all actions ran
    pub const OUT: PortIndex = 1;
    /// Accumulated score
    pub const SCORE: PortIndex = 2;

    /// Create a list
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }
}

impl BlueprintNode for ActionList {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        ports.push(Port::exit("Out"));
        ports.push(Port::output::<i32>("Score"));

        let mut setup = DependencySetup::new();
        for action in &self.actions {
            action.setup_dependencies(&mut setup);
        }
        setup.append_ports(ports);
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter().values()
    }
}

impl EnterPort for ActionList {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        if port != Self::IN {
            return;
        }

        let mut resolver = DependencyResolver::begin(ctx, token);
        let resolved: Vec<_> = self
            .actions
            .iter()
            .map(|action| action.resolve_dependencies(&mut resolver, ctx))
            .collect();

        let state = ctx.state_mut::<ActionState>(token);
        for action in resolved {
            state.apply(action);
        }
        ctx.call(token, Self::OUT);
    }
}

impl PortValueSource for ActionList {
    fn get_port_value(
        &self,
        ctx: &mut ExecutionContext<'_>,
        token: NodeToken,
        port: PortIndex,
    ) -> Option<Value> {
        (port == Self::SCORE)
            .then(|| Value::Int(ctx.state::<ActionState>(token).map_or(0, |s| s.score)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::RootId;
    use crate::blueprint::Blueprint;
    use crate::nodes::{Constant, Counter};
    use crate::runtime::Runtime;
    use crate::settings::RuntimeSettings;
    use crate::value::ValueType;

    fn list() -> ActionList {
        ActionList::new(vec![
            Action::AddScore { default: 1 },
            Action::Announce {
                default: "hello".to_string(),
            },
            Action::AddScore { default: 2 },
            Action::SetFlag { default: true },
        ])
    }

    #[test]
    fn test_dynamic_ports_follow_static_ports() {
        let mut builder = Blueprint::builder("actions");
        builder.add_node(NodeId(0), list()).unwrap();
        let blueprint = builder.build(&RuntimeSettings::default()).unwrap();

        let ports = blueprint.ports(NodeId(0)).unwrap();
        assert_eq!(ports.len(), 6);
        let deps = ports.dependencies().unwrap();
        assert_eq!(deps.first(), 3);
        assert_eq!(deps.port_for(ValueType::Int), Some(3));
        assert_eq!(deps.port_for(ValueType::String), Some(4));
        assert_eq!(deps.port_for(ValueType::Bool), Some(5));
    }

    #[test]
    fn test_unlinked_dependencies_use_defaults() {
        let mut builder = Blueprint::builder("actions");
        builder.add_node(NodeId(0), list()).unwrap();
        let mut runtime = Runtime::new(builder.build(&RuntimeSettings::default()).unwrap());
        let token = NodeToken::new(NodeId(0), runtime.initialize(RootId::new()));

        runtime.enter(token, ActionList::IN);

        let state = runtime.state::<ActionState>(token).unwrap();
        assert_eq!(state.score, 3);
        assert_eq!(state.announcements, vec!["hello".to_string()]);
        assert!(state.flag);
        assert_eq!(runtime.read_output(token, ActionList::SCORE, 0), 3);
    }

    #[test]
    fn test_shared_port_feeds_every_request() {
        let mut builder = Blueprint::builder("actions");
        builder.add_node(NodeId(0), list()).unwrap();
        builder.add_node(NodeId(1), Constant::new(Value::Int(10))).unwrap();
        builder.add_node(NodeId(2), Counter).unwrap();
        builder
            .link(NodeId(1), Constant::VALUE, NodeId(0), 3)
            .link(NodeId(0), ActionList::OUT, NodeId(2), Counter::IN);
        let mut runtime = Runtime::new(builder.build(&RuntimeSettings::default()).unwrap());
        let activation = runtime.initialize(RootId::new());
        let token = NodeToken::new(NodeId(0), activation);

        runtime.enter(token, ActionList::IN);
        runtime.enter(token, ActionList::IN);

        assert_eq!(runtime.state::<ActionState>(token).map(|s| s.score), Some(40));
        assert_eq!(
            runtime
                .state::<crate::nodes::CounterState>(NodeToken::new(NodeId(2), activation))
                .map(|s| s.count),
            Some(2)
        );
    }
}
