// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiled blueprints.
//!
//! A [`Blueprint`] owns the node storage, the authored links and two lazily
//! filled caches per node: its [`PortSet`] and one [`RuntimePort`] per port.
//! Both are computed on first traversal. Reconfiguring a node requires `&mut`
//! access, so it can only happen between executions, and must be followed by
//! [`Blueprint::invalidate_ports`].

use crate::error::{BlueprintError, Result};
use crate::hash_link::{HashLinkTable, LabelHash};
use crate::link::{Link, RuntimeLink, RuntimePort};
use crate::node::{BlueprintNode, NodeId};
use crate::port::{PortIndex, PortKind, PortSet};
use crate::settings::{DuplicateLabelPolicy, RuntimeSettings};
use crate::storage::{NodeAddress, NodeStorage};
use indexmap::IndexMap;
use std::cell::OnceCell;
use std::collections::HashMap;

/// Which caches [`Blueprint::invalidate_ports`] drops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkInvalidation {
    /// The node's own ports and every cached link into or out of the node
    PortsOnly,
    /// Also the label table and the cached jumps of every label consumer
    PortsAndLinks,
}

struct NodeEntry {
    address: NodeAddress,
    ports: OnceCell<PortSet>,
    runtime: OnceCell<Box<[OnceCell<RuntimePort>]>>,
}

impl NodeEntry {
    fn new(address: NodeAddress) -> Self {
        Self {
            address,
            ports: OnceCell::new(),
            runtime: OnceCell::new(),
        }
    }

    fn reset(&mut self) {
        self.ports = OnceCell::new();
        self.runtime = OnceCell::new();
    }
}

/// Collects nodes and links before compilation
#[derive(Debug, Default)]
pub struct BlueprintBuilder {
    name: String,
    storage: NodeStorage,
    nodes: IndexMap<NodeId, NodeAddress>,
    links: Vec<Link>,
}

impl BlueprintBuilder {
    /// Start a new blueprint
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a node under an authored id
    pub fn add_node<N: BlueprintNode>(&mut self, id: NodeId, node: N) -> Result<NodeId> {
        if self.nodes.contains_key(&id) {
            return Err(BlueprintError::DuplicateNode(id));
        }
        let address = self.storage.insert(node);
        self.nodes.insert(id, address);
        Ok(id)
    }

    /// Record an authored link. Validation happens in [`Self::build`].
    pub fn link(
        &mut self,
        from: NodeId,
        from_port: PortIndex,
        to: NodeId,
        to_port: PortIndex,
    ) -> &mut Self {
        self.links.push(Link::new(from, from_port, to, to_port));
        self
    }

    /// Record a batch of authored links
    pub fn links(&mut self, links: impl IntoIterator<Item = Link>) -> &mut Self {
        self.links.extend(links);
        self
    }

    /// Validate links against the nodes' ports and compile
    pub fn build(self, settings: &RuntimeSettings) -> Result<Blueprint> {
        let mut blueprint = Blueprint {
            name: self.name,
            storage: self.storage,
            nodes: self
                .nodes
                .into_iter()
                .map(|(id, address)| (id, NodeEntry::new(address)))
                .collect(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            links: Vec::with_capacity(self.links.len()),
            hash_links: HashLinkTable::default(),
            duplicate_labels: settings.duplicate_labels,
        };

        for link in self.links {
            blueprint.validate_link(&link, settings.validate_value_types)?;
            blueprint.push_link(link);
        }
        blueprint.hash_links = blueprint.build_hash_links()?;

        tracing::debug!(
            "Compiled blueprint '{}': {} nodes, {} links, {} labels",
            blueprint.name,
            blueprint.nodes.len(),
            blueprint.links.len(),
            blueprint.hash_links.len()
        );
        Ok(blueprint)
    }
}

/// A compiled graph, shared by every activation that runs it
pub struct Blueprint {
    name: String,
    storage: NodeStorage,
    nodes: IndexMap<NodeId, NodeEntry>,
    links: Vec<Link>,
    outgoing: HashMap<(NodeId, PortIndex), Vec<usize>>,
    incoming: HashMap<(NodeId, PortIndex), Vec<usize>>,
    hash_links: HashLinkTable,
    duplicate_labels: DuplicateLabelPolicy,
}

impl Blueprint {
    /// Start building a blueprint
    pub fn builder(name: impl Into<String>) -> BlueprintBuilder {
        BlueprintBuilder::new(name)
    }

    /// Blueprint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node storage
    pub fn storage(&self) -> &NodeStorage {
        &self.storage
    }

    /// Authored node ids in authoring order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if a node exists
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Storage address of a node
    pub fn address(&self, id: NodeId) -> Option<NodeAddress> {
        self.nodes.get(&id).map(|entry| entry.address)
    }

    /// Borrow a node as its concrete type
    pub fn node<N: BlueprintNode>(&self, id: NodeId) -> Option<&N> {
        self.storage.get(self.address(id)?)
    }

    /// Mutably borrow a node to reconfigure it.
    ///
    /// If the change affects the node's ports, call [`Self::invalidate_ports`] afterwards.
    pub fn node_mut<N: BlueprintNode>(&mut self, id: NodeId) -> Option<&mut N> {
        let address = self.address(id)?;
        self.storage.get_mut(address)
    }

    /// Authored links in authoring order
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Compiled label table
    pub fn hash_links(&self) -> &HashLinkTable {
        &self.hash_links
    }

    /// Port set of a node, created on first access
    pub fn ports(&self, id: NodeId) -> Option<&PortSet> {
        let entry = self.nodes.get(&id)?;
        Some(self.entry_ports(id, entry))
    }

    fn entry_ports<'a>(&'a self, id: NodeId, entry: &'a NodeEntry) -> &'a PortSet {
        entry.ports.get_or_init(|| {
            let ports = self.storage.create_ports(entry.address, id);
            tracing::debug!("Created {} ports for {}", ports.len(), id);
            ports
        })
    }

    /// Kind of one port in the node's current port set
    pub fn port_kind(&self, id: NodeId, port: PortIndex) -> Option<PortKind> {
        self.ports(id)?.get(port).map(|p| p.kind)
    }

    /// Resolved links of one port, computed on first traversal
    pub fn runtime_port(&self, id: NodeId, port: PortIndex) -> Option<&RuntimePort> {
        let entry = self.nodes.get(&id)?;
        let ports = self.entry_ports(id, entry);
        let cells = entry
            .runtime
            .get_or_init(|| (0..ports.len()).map(|_| OnceCell::new()).collect());
        let cell = cells.get(port)?;
        Some(cell.get_or_init(|| self.resolve_port(id, entry, ports, port)))
    }

    fn resolve_port(
        &self,
        id: NodeId,
        entry: &NodeEntry,
        ports: &PortSet,
        port: PortIndex,
    ) -> RuntimePort {
        let Some(kind) = ports.get(port).map(|p| p.kind) else {
            return RuntimePort::default();
        };

        let links = match kind {
            PortKind::Exit => match self.consumed_label(entry, port) {
                Some(hash) => self.resolve_label(id, hash),
                None => self.resolve_links(&self.outgoing, id, port, |link| (link.to, link.to_port)),
            },
            PortKind::Input(_) => {
                self.resolve_links(&self.incoming, id, port, |link| (link.from, link.from_port))
            }
            PortKind::Enter | PortKind::Output(_) => Vec::new(),
        };

        tracing::debug!("Resolved {}:{} -> {} links", id, port, links.len());
        RuntimePort::new(links)
    }

    fn resolve_links(
        &self,
        index: &HashMap<(NodeId, PortIndex), Vec<usize>>,
        id: NodeId,
        port: PortIndex,
        far_end: impl Fn(&Link) -> (NodeId, PortIndex),
    ) -> Vec<RuntimeLink> {
        let Some(link_indices) = index.get(&(id, port)) else {
            return Vec::new();
        };

        link_indices
            .iter()
            .filter_map(|&i| {
                let (node, far_port) = far_end(&self.links[i]);
                self.runtime_link(node, far_port)
            })
            .collect()
    }

    fn resolve_label(&self, id: NodeId, hash: LabelHash) -> Vec<RuntimeLink> {
        match self.hash_links.resolve(hash) {
            Some(target) => self.runtime_link(target.node, target.port).into_iter().collect(),
            None => {
                tracing::debug!("{} jumps to unpublished label {}", id, hash);
                Vec::new()
            }
        }
    }

    fn runtime_link(&self, node: NodeId, port: PortIndex) -> Option<RuntimeLink> {
        let entry = self.nodes.get(&node)?;
        let ports = self.entry_ports(node, entry);
        if port >= ports.len() {
            tracing::warn!(
                "Skipping link to {}:{}, node now has {} ports",
                node,
                port,
                ports.len()
            );
            return None;
        }
        Some(RuntimeLink {
            node,
            address: entry.address,
            port,
        })
    }

    fn consumed_label(&self, entry: &NodeEntry, port: PortIndex) -> Option<LabelHash> {
        let consume = self.storage.vtable(entry.address.type_index).consumed_label?;
        consume(
            self.storage.column(entry.address.type_index),
            entry.address.slot as usize,
            port,
        )
    }

    fn build_hash_links(&self) -> Result<HashLinkTable> {
        let publishers = self.nodes.iter().filter_map(|(id, entry)| {
            let vtable = self.storage.vtable(entry.address.type_index);
            let publish = vtable.published_label?;
            let (port, hash) = publish(
                self.storage.column(entry.address.type_index),
                entry.address.slot as usize,
                *id,
            )?;
            Some((*id, port, hash))
        });
        HashLinkTable::build(publishers, self.duplicate_labels)
    }

    fn validate_link(&self, link: &Link, check_types: bool) -> Result<()> {
        let from = self
            .ports(link.from)
            .ok_or(BlueprintError::UnknownNode(link.from))?;
        let to = self
            .ports(link.to)
            .ok_or(BlueprintError::UnknownNode(link.to))?;

        let source = from.get(link.from_port).ok_or(BlueprintError::PortOutOfRange {
            node: link.from,
            port: link.from_port,
            count: from.len(),
        })?;
        let target = to.get(link.to_port).ok_or(BlueprintError::PortOutOfRange {
            node: link.to,
            port: link.to_port,
            count: to.len(),
        })?;

        if !source.kind.can_link_to(&target.kind) {
            return Err(BlueprintError::KindMismatch {
                from: source.kind,
                to: target.kind,
            });
        }

        if check_types {
            if let (Some(a), Some(b)) = (source.kind.value_type(), target.kind.value_type()) {
                if !a.can_connect_to(&b) {
                    return Err(BlueprintError::TypeMismatch { from: a, to: b });
                }
            }
        }

        Ok(())
    }

    fn push_link(&mut self, link: Link) {
        let index = self.links.len();
        self.outgoing
            .entry((link.from, link.from_port))
            .or_default()
            .push(index);
        self.incoming
            .entry((link.to, link.to_port))
            .or_default()
            .push(index);
        self.links.push(link);
    }

    /// Drop cached ports and links of a node after its configuration changed.
    ///
    /// The next traversal recomputes them, including the cached links of every
    /// neighbour that points into the node. With [`LinkInvalidation::PortsAndLinks`]
    /// the label table is rebuilt and every label consumer re-resolves its jumps.
    pub fn invalidate_ports(&mut self, id: NodeId, mode: LinkInvalidation) -> Result<()> {
        self.nodes
            .get_mut(&id)
            .ok_or(BlueprintError::UnknownNode(id))?
            .reset();

        let neighbours: Vec<NodeId> = self
            .links
            .iter()
            .filter(|link| link.involves_node(id))
            .map(|link| if link.from == id { link.to } else { link.from })
            .collect();
        for neighbour in neighbours {
            if let Some(entry) = self.nodes.get_mut(&neighbour) {
                entry.runtime = OnceCell::new();
            }
        }

        if mode == LinkInvalidation::PortsAndLinks {
            self.hash_links = self.build_hash_links()?;
            for entry in self.nodes.values_mut() {
                if self.storage.vtable(entry.address.type_index).consumes_labels() {
                    entry.runtime = OnceCell::new();
                }
            }
        }

        tracing::debug!("Invalidated ports of {} ({:?})", id, mode);
        Ok(())
    }
}

impl std::fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blueprint")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("links", &self.links.len())
            .field("labels", &self.hash_links.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Port;

    struct Fan(usize);

    impl BlueprintNode for Fan {
        fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
            ports.push(Port::enter("In"));
            for i in 0..self.0 {
                ports.push(Port::exit(format!("Out {i}")));
            }
        }
    }

    struct Source;

    impl BlueprintNode for Source {
        fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
            ports.push(Port::output::<String>("Text"));
        }
    }

    struct Sink;

    impl BlueprintNode for Sink {
        fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
            ports.push(Port::enter("In"));
            ports.push(Port::input::<i32>("Amount"));
        }
    }

    fn fan_out() -> Blueprint {
        let mut builder = Blueprint::builder("fan");
        builder.add_node(NodeId(1), Fan(2)).unwrap();
        builder.add_node(NodeId(2), Fan(0)).unwrap();
        builder.add_node(NodeId(3), Fan(0)).unwrap();
        builder.link(NodeId(1), 1, NodeId(2), 0);
        builder.link(NodeId(1), 1, NodeId(3), 0);
        builder.link(NodeId(1), 2, NodeId(3), 0);
        builder.build(&RuntimeSettings::default()).unwrap()
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut builder = Blueprint::builder("dup");
        builder.add_node(NodeId(1), Sink).unwrap();
        assert!(matches!(
            builder.add_node(NodeId(1), Sink),
            Err(BlueprintError::DuplicateNode(NodeId(1)))
        ));
    }

    #[test]
    fn test_link_validation() {
        let settings = RuntimeSettings::default();

        let mut builder = Blueprint::builder("range");
        builder.add_node(NodeId(1), Fan(1)).unwrap();
        builder.add_node(NodeId(2), Sink).unwrap();
        builder.link(NodeId(1), 5, NodeId(2), 0);
        assert!(matches!(
            builder.build(&settings),
            Err(BlueprintError::PortOutOfRange { port: 5, count: 2, .. })
        ));

        let mut builder = Blueprint::builder("kind");
        builder.add_node(NodeId(1), Fan(1)).unwrap();
        builder.add_node(NodeId(2), Sink).unwrap();
        builder.link(NodeId(1), 1, NodeId(2), 1);
        assert!(matches!(builder.build(&settings), Err(BlueprintError::KindMismatch { .. })));

        let mut builder = Blueprint::builder("type");
        builder.add_node(NodeId(1), Source).unwrap();
        builder.add_node(NodeId(2), Sink).unwrap();
        builder.link(NodeId(1), 0, NodeId(2), 1);
        assert!(matches!(builder.build(&settings), Err(BlueprintError::TypeMismatch { .. })));

        let lenient = RuntimeSettings {
            validate_value_types: false,
            ..RuntimeSettings::default()
        };
        let mut builder = Blueprint::builder("type");
        builder.add_node(NodeId(1), Source).unwrap();
        builder.add_node(NodeId(2), Sink).unwrap();
        builder.link(NodeId(1), 0, NodeId(2), 1);
        assert!(builder.build(&lenient).is_ok());

        let mut builder = Blueprint::builder("missing");
        builder.add_node(NodeId(1), Fan(1)).unwrap();
        builder.link(NodeId(1), 1, NodeId(9), 0);
        assert!(matches!(builder.build(&settings), Err(BlueprintError::UnknownNode(NodeId(9)))));
    }

    #[test]
    fn test_runtime_ports_follow_authored_order() {
        let blueprint = fan_out();

        let exit = blueprint.runtime_port(NodeId(1), 1).unwrap();
        let targets: Vec<NodeId> = exit.links().iter().map(|l| l.node).collect();
        assert_eq!(targets, vec![NodeId(2), NodeId(3)]);

        assert!(blueprint.runtime_port(NodeId(1), 0).unwrap().is_empty());
        assert!(blueprint.runtime_port(NodeId(1), 9).is_none());
        assert!(blueprint.runtime_port(NodeId(42), 0).is_none());
    }

    #[test]
    fn test_invalidation_recomputes_ports() {
        let mut blueprint = fan_out();
        assert_eq!(blueprint.ports(NodeId(1)).unwrap().len(), 3);
        assert_eq!(blueprint.runtime_port(NodeId(1), 2).unwrap().len(), 1);

        blueprint.node_mut::<Fan>(NodeId(1)).unwrap().0 = 1;
        blueprint
            .invalidate_ports(NodeId(1), LinkInvalidation::PortsAndLinks)
            .unwrap();

        assert_eq!(blueprint.ports(NodeId(1)).unwrap().len(), 2);
        assert!(blueprint.runtime_port(NodeId(1), 2).is_none());
        assert_eq!(blueprint.runtime_port(NodeId(1), 1).unwrap().len(), 2);
    }

    struct Gate(usize);

    impl BlueprintNode for Gate {
        fn create_ports(&self, ports: &mut PortSet, _id: NodeId) {
            for i in 0..self.0 {
                ports.push(Port::enter(format!("In {i}")));
            }
        }
    }

    #[test]
    fn test_stale_links_into_shrunk_node_are_skipped() {
        let mut builder = Blueprint::builder("shrink");
        builder.add_node(NodeId(1), Fan(1)).unwrap();
        builder.add_node(NodeId(2), Gate(3)).unwrap();
        builder.link(NodeId(1), 1, NodeId(2), 2);
        let mut blueprint = builder.build(&RuntimeSettings::default()).unwrap();
        assert_eq!(blueprint.runtime_port(NodeId(1), 1).unwrap().len(), 1);
        assert_eq!(blueprint.port_kind(NodeId(2), 2), Some(PortKind::Enter));

        blueprint.node_mut::<Gate>(NodeId(2)).unwrap().0 = 2;
        blueprint
            .invalidate_ports(NodeId(2), LinkInvalidation::PortsOnly)
            .unwrap();
        assert!(blueprint.runtime_port(NodeId(1), 1).unwrap().is_empty());
        assert_eq!(blueprint.port_kind(NodeId(2), 2), None);

        blueprint.node_mut::<Gate>(NodeId(2)).unwrap().0 = 3;
        blueprint
            .invalidate_ports(NodeId(2), LinkInvalidation::PortsAndLinks)
            .unwrap();
        assert_eq!(blueprint.runtime_port(NodeId(1), 1).unwrap().len(), 1);

        assert!(blueprint.node_mut::<Fan>(NodeId(2)).is_none());
        assert!(matches!(
            blueprint.invalidate_ports(NodeId(77), LinkInvalidation::PortsOnly),
            Err(BlueprintError::UnknownNode(NodeId(77)))
        ));
    }
}
