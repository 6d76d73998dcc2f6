// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end scenarios across compilation, execution and activations.

use crate::activation::{NodeToken, RootId};
use crate::blueprint::{Blueprint, LinkInvalidation};
use crate::error::BlueprintError;
use crate::execution::ExecutionContext;
use crate::node::{BlueprintNode, Capabilities, EnterPort, NodeId};
use crate::nodes::{AddInt, Constant, Counter, CounterState, EventEntry, Goto, Label, Sequence};
use crate::port::{Port, PortIndex, PortSet};
use crate::runtime::Runtime;
use crate::settings::{DuplicateLabelPolicy, RuntimeSettings};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

type Journal = Rc<RefCell<Vec<String>>>;

/// Writes its name to a shared journal on entry
struct Recorder {
    name: &'static str,
    journal: Journal,
}

impl Recorder {
    const IN: PortIndex = 0;
    const OUT: PortIndex = 1;

    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Rc::clone(journal),
        }
    }
}

impl BlueprintNode for Recorder {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::enter("In"));
        ports.push(Port::exit("Out"));
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter()
    }
}

impl EnterPort for Recorder {
    fn on_enter_port(&self, ctx: &mut ExecutionContext<'_>, token: NodeToken, port: PortIndex) {
        if port == Self::IN {
            self.journal.borrow_mut().push(self.name.to_string());
            ctx.call(token, Self::OUT);
        }
    }
}

/// Inputs of every scalar type, never linked
struct AllInputs;

impl AllInputs {
    const BOOL: PortIndex = 0;
    const INT: PortIndex = 1;
    const FLOAT: PortIndex = 2;
    const VECTOR: PortIndex = 3;
    const TEXT: PortIndex = 4;
}

impl BlueprintNode for AllInputs {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        ports.push(Port::input::<bool>("Bool"));
        ports.push(Port::input::<i32>("Int"));
        ports.push(Port::input::<f32>("Float"));
        ports.push(Port::input::<[f32; 3]>("Vector"));
        ports.push(Port::input::<String>("Text"));
    }
}

/// Configurable number of enter ports; journals the port it was entered through
struct Gate {
    enters: usize,
    journal: Journal,
}

impl BlueprintNode for Gate {
    fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
        for i in 0..self.enters {
            ports.push(Port::enter(format!("In {i}")));
        }
    }

    fn capabilities(caps: Capabilities<Self>) -> Capabilities<Self> {
        caps.enter()
    }
}

impl EnterPort for Gate {
    fn on_enter_port(&self, _ctx: &mut ExecutionContext<'_>, _token: NodeToken, port: PortIndex) {
        self.journal
            .borrow_mut()
            .push(format!("port {port} of {}", self.enters));
    }
}

fn runtime(builder: crate::blueprint::BlueprintBuilder) -> Runtime {
    Runtime::new(builder.build(&RuntimeSettings::default()).unwrap())
}

fn count(runtime: &Runtime, token: NodeToken) -> i32 {
    runtime.state::<CounterState>(token).map_or(0, |s| s.count)
}

#[test]
fn test_multicast_runs_in_authored_order() {
    let journal = Journal::default();
    let mut builder = Blueprint::builder("multicast");
    builder.add_node(NodeId(0), Recorder::new("A", &journal)).unwrap();
    builder.add_node(NodeId(1), Recorder::new("B", &journal)).unwrap();
    builder.add_node(NodeId(2), Recorder::new("C", &journal)).unwrap();
    builder.add_node(NodeId(3), Recorder::new("D", &journal)).unwrap();
    builder
        .link(NodeId(0), Recorder::OUT, NodeId(1), Recorder::IN)
        .link(NodeId(0), Recorder::OUT, NodeId(2), Recorder::IN)
        .link(NodeId(1), Recorder::OUT, NodeId(3), Recorder::IN);
    let mut runtime = runtime(builder);
    let activation = runtime.initialize(RootId::new());

    runtime.call(NodeToken::new(NodeId(0), activation), Recorder::OUT);

    // B's cascade completes before C is entered
    assert_eq!(*journal.borrow(), vec!["B", "D", "C"]);
}

#[test]
fn test_unlinked_reads_return_default() {
    let mut builder = Blueprint::builder("inputs");
    builder.add_node(NodeId(0), AllInputs).unwrap();
    let mut runtime = runtime(builder);
    let token = NodeToken::new(NodeId(0), runtime.initialize(RootId::new()));

    assert!(runtime.read(token, AllInputs::BOOL, true));
    assert_eq!(runtime.read(token, AllInputs::INT, -7), -7);
    assert_eq!(runtime.read(token, AllInputs::FLOAT, 2.5_f32), 2.5);
    assert_eq!(runtime.read(token, AllInputs::VECTOR, [1.0_f32, 2.0, 3.0]), [1.0, 2.0, 3.0]);
    assert_eq!(runtime.read(token, AllInputs::TEXT, "none".to_string()), "none");

    // Ports that do not exist and nodes that do not exist behave the same
    assert_eq!(runtime.read(token, 99, 11), 11);
    assert_eq!(runtime.read(token.with_node(NodeId(42)), 0, 12), 12);
}

#[test]
fn test_reads_after_teardown_return_default() {
    let mut builder = Blueprint::builder("teardown");
    builder.add_node(NodeId(0), Constant::new(Value::Int(9))).unwrap();
    builder.add_node(NodeId(1), AddInt::default()).unwrap();
    builder.link(NodeId(0), Constant::VALUE, NodeId(1), AddInt::A);
    let mut runtime = runtime(builder);
    let activation = runtime.initialize(RootId::new());
    let add = NodeToken::new(NodeId(1), activation);

    assert_eq!(runtime.read_output(add, AddInt::SUM, 0), 9);
    runtime.deinitialize(activation);
    assert_eq!(runtime.read_output(add, AddInt::SUM, -1), -1);
}

#[test]
fn test_sum_with_linked_and_unlinked_inputs() {
    let mut builder = Blueprint::builder("sum");
    builder.add_node(NodeId(0), Constant::new(Value::Int(3))).unwrap();
    builder.add_node(NodeId(1), AddInt { a: 5, b: 0 }).unwrap();
    builder.link(NodeId(0), Constant::VALUE, NodeId(1), AddInt::A);
    let mut runtime = runtime(builder);
    let token = NodeToken::new(NodeId(1), runtime.initialize(RootId::new()));

    assert_eq!(runtime.read_output(token, AddInt::SUM, 0), 3);
}

#[test]
fn test_invalidation_drops_stale_links() {
    let mut builder = Blueprint::builder("invalidate");
    builder.add_node(NodeId(0), Sequence::new(2)).unwrap();
    builder.add_node(NodeId(1), Counter).unwrap();
    builder
        .link(NodeId(0), Sequence::then(0), NodeId(1), Counter::IN)
        .link(NodeId(0), Sequence::then(1), NodeId(1), Counter::IN);
    let mut runtime = runtime(builder);
    let activation = runtime.initialize(RootId::new());
    let sequence = NodeToken::new(NodeId(0), activation);
    let counter = NodeToken::new(NodeId(1), activation);

    runtime.enter(sequence, Sequence::IN);
    assert_eq!(count(&runtime, counter), 2);

    runtime.blueprint_mut().node_mut::<Sequence>(NodeId(0)).unwrap().steps = 1;
    runtime
        .blueprint_mut()
        .invalidate_ports(NodeId(0), LinkInvalidation::PortsAndLinks)
        .unwrap();
    assert_eq!(runtime.blueprint().ports(NodeId(0)).unwrap().len(), 2);
    assert!(runtime.blueprint().runtime_port(NodeId(0), Sequence::then(1)).is_none());

    runtime.enter(sequence, Sequence::IN);
    assert_eq!(count(&runtime, counter), 3);

    runtime.blueprint_mut().node_mut::<Sequence>(NodeId(0)).unwrap().steps = 2;
    runtime
        .blueprint_mut()
        .invalidate_ports(NodeId(0), LinkInvalidation::PortsOnly)
        .unwrap();

    runtime.enter(sequence, Sequence::IN);
    assert_eq!(count(&runtime, counter), 5);
}

fn labelled(policy: DuplicateLabelPolicy) -> crate::error::Result<Blueprint> {
    let mut builder = Blueprint::builder("labels");
    builder.add_node(NodeId(0), Goto::new("loop")).unwrap();
    builder.add_node(NodeId(1), Label::new("loop")).unwrap();
    builder.add_node(NodeId(2), Label::new("loop")).unwrap();
    builder.add_node(NodeId(3), Counter).unwrap();
    builder.add_node(NodeId(4), Counter).unwrap();
    builder
        .link(NodeId(1), Label::OUT, NodeId(3), Counter::IN)
        .link(NodeId(2), Label::OUT, NodeId(4), Counter::IN);
    let settings = RuntimeSettings {
        duplicate_labels: policy,
        ..RuntimeSettings::default()
    };
    builder.build(&settings)
}

#[test]
fn test_duplicate_label_first_publisher_wins() {
    let blueprint = labelled(DuplicateLabelPolicy::Warn).unwrap();
    assert_eq!(blueprint.hash_links().duplicates().len(), 1);

    let mut runtime = Runtime::new(blueprint);
    let activation = runtime.initialize(RootId::new());
    runtime.enter(NodeToken::new(NodeId(0), activation), Goto::IN);

    assert_eq!(count(&runtime, NodeToken::new(NodeId(3), activation)), 1);
    assert_eq!(count(&runtime, NodeToken::new(NodeId(4), activation)), 0);
}

#[test]
fn test_duplicate_label_rejected() {
    let err = labelled(DuplicateLabelPolicy::Reject).unwrap_err();
    assert!(matches!(
        err,
        BlueprintError::DuplicateLabel {
            first: NodeId(1),
            second: NodeId(2),
            ..
        }
    ));
}

#[test]
fn test_activations_have_independent_state() {
    let mut builder = Blueprint::builder("shared");
    builder.add_node(NodeId(0), EventEntry::new("tick")).unwrap();
    builder.add_node(NodeId(1), Counter).unwrap();
    builder.link(NodeId(0), EventEntry::OUT, NodeId(1), Counter::IN);
    let mut runtime = runtime(builder);

    let first = runtime.initialize(RootId::new());
    let second = runtime.initialize(RootId::new());
    runtime.call(NodeToken::new(NodeId(0), first), EventEntry::OUT);
    runtime.call(NodeToken::new(NodeId(0), first), EventEntry::OUT);
    runtime.call(NodeToken::new(NodeId(0), second), EventEntry::OUT);

    assert_eq!(count(&runtime, NodeToken::new(NodeId(1), first)), 2);
    assert_eq!(count(&runtime, NodeToken::new(NodeId(1), second)), 1);
    assert_eq!(runtime.read_output(NodeToken::new(NodeId(1), second), Counter::COUNT, 0), 1);

    runtime.enter(NodeToken::new(NodeId(1), first), Counter::RESET);
    assert_eq!(count(&runtime, NodeToken::new(NodeId(1), first)), 0);
    assert_eq!(count(&runtime, NodeToken::new(NodeId(1), second)), 1);
}

#[test]
fn test_root_teardown_cascades_to_children() {
    let mut builder = Blueprint::builder("children");
    builder.add_node(NodeId(0), Counter).unwrap();
    let mut runtime = runtime(builder);

    let root = RootId::new();
    let other = RootId::new();
    let parent = runtime.initialize(root);
    let child = runtime.initialize_child(parent).unwrap();
    let grandchild = runtime.initialize_child(child).unwrap();
    let unrelated = runtime.initialize(other);
    assert_eq!(runtime.activations().len(), 4);
    assert_eq!(runtime.activations().record(grandchild).map(|r| r.root), Some(root));

    runtime.enter(NodeToken::new(NodeId(0), child), Counter::IN);
    assert_eq!(count(&runtime, NodeToken::new(NodeId(0), child)), 1);
    assert_eq!(count(&runtime, NodeToken::new(NodeId(0), parent)), 0);

    assert_eq!(runtime.deinitialize_root(root), 3);
    assert!(!runtime.is_active(parent));
    assert!(!runtime.is_active(child));
    assert!(!runtime.is_active(grandchild));
    assert!(runtime.is_active(unrelated));
    assert!(runtime.state::<CounterState>(NodeToken::new(NodeId(0), child)).is_none());

    // Calls into a retired activation do nothing
    runtime.enter(NodeToken::new(NodeId(0), child), Counter::IN);
    assert!(runtime.state::<CounterState>(NodeToken::new(NodeId(0), child)).is_none());
    assert!(runtime.initialize_child(parent).is_none());
}

#[test]
fn test_shrunk_node_is_not_entered_through_removed_port() {
    let journal = Journal::default();
    let mut builder = Blueprint::builder("gate");
    builder.add_node(NodeId(0), EventEntry::new("start")).unwrap();
    builder
        .add_node(
            NodeId(1),
            Gate {
                enters: 3,
                journal: Rc::clone(&journal),
            },
        )
        .unwrap();
    builder.link(NodeId(0), EventEntry::OUT, NodeId(1), 2);
    let mut runtime = runtime(builder);
    let start = NodeToken::new(NodeId(0), runtime.initialize(RootId::new()));

    runtime.call(start, EventEntry::OUT);
    assert_eq!(*journal.borrow(), vec!["port 2 of 3"]);

    runtime.blueprint_mut().node_mut::<Gate>(NodeId(1)).unwrap().enters = 2;
    runtime
        .blueprint_mut()
        .invalidate_ports(NodeId(1), LinkInvalidation::PortsOnly)
        .unwrap();
    runtime.call(start, EventEntry::OUT);
    assert_eq!(*journal.borrow(), vec!["port 2 of 3"]);

    // A direct entry through the removed port is refused as well
    runtime.enter(start.with_node(NodeId(1)), 2);
    runtime.enter(start.with_node(NodeId(1)), 1);
    assert_eq!(*journal.borrow(), vec!["port 2 of 3", "port 1 of 2"]);
}

#[test]
fn test_ports_are_used_only_in_their_direction() {
    let mut builder = Blueprint::builder("directions");
    builder.add_node(NodeId(0), Constant::new(Value::Int(4))).unwrap();
    builder.add_node(NodeId(1), AddInt { a: 0, b: 1 }).unwrap();
    builder.add_node(NodeId(2), Counter).unwrap();
    builder.add_node(NodeId(3), EventEntry::new("start")).unwrap();
    builder
        .link(NodeId(0), Constant::VALUE, NodeId(1), AddInt::A)
        .link(NodeId(3), EventEntry::OUT, NodeId(2), Counter::IN);
    let mut runtime = runtime(builder);
    let activation = runtime.initialize(RootId::new());
    let add = NodeToken::new(NodeId(1), activation);
    let counter = NodeToken::new(NodeId(2), activation);

    // Calling an input does not reach its source, reading an exit pulls nothing
    runtime.call(add, AddInt::A);
    let start = NodeToken::new(NodeId(3), activation);
    assert_eq!(runtime.read(start, EventEntry::OUT, -1), -1);
    assert_eq!(runtime.read(counter, Counter::IN, -2), -2);
    assert_eq!(runtime.read(add, AddInt::A, 0), 4);

    // Entering an exit or an output does not run the node
    runtime.enter(counter, Counter::OUT);
    runtime.enter(counter, Counter::COUNT);
    assert_eq!(count(&runtime, counter), 0);
    assert_eq!(runtime.read_output(counter, Counter::IN, -3), -3);

    runtime.call(start, EventEntry::OUT);
    assert_eq!(count(&runtime, counter), 1);
    assert_eq!(runtime.read_output(add, AddInt::SUM, 0), 5);
}

#[test]
fn test_teardown_releases_scopes() {
    let mut builder = Blueprint::builder("churn");
    for id in 0..10 {
        builder.add_node(NodeId(id), Counter).unwrap();
    }
    let mut runtime = runtime(builder);
    let root = RootId::new();

    for _ in 0..1000 {
        let activation = runtime.initialize(root);
        runtime.enter(NodeToken::new(NodeId(0), activation), Counter::IN);
        assert_eq!(runtime.activations().scope_count(), 10);
        runtime.deinitialize(activation);
    }

    assert!(runtime.activations().is_empty());
    assert_eq!(runtime.activations().scope_count(), 0);
}
