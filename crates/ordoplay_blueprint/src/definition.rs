// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph definition files.
//!
//! A [`GraphDefinition`] is the authored form of a blueprint: nodes named by
//! kind with their configuration as RON text, plus the ordered link list.
//! A [`NodeFactory`] turns kinds into concrete node types at compile time.

use crate::blueprint::{Blueprint, BlueprintBuilder};
use crate::error::{BlueprintError, Result};
use crate::link::Link;
use crate::node::{BlueprintNode, NodeId};
use crate::nodes::{
    ActionList, AddInt, Branch, Constant, Counter, Delay, EventEntry, Goto, Label, Print, Sequence,
};
use crate::settings::RuntimeSettings;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One authored node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Authored id, referenced by links
    pub id: NodeId,
    /// Kind name registered in the [`NodeFactory`]
    pub kind: String,
    /// The node's own RON configuration; empty means default
    #[serde(default)]
    pub config: String,
}

impl NodeDefinition {
    /// Create a definition with default configuration
    pub fn new(id: NodeId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            config: String::new(),
        }
    }

    /// Set the configuration text
    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }
}

/// Authored graph: nodes and links in authoring order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDefinition {
    /// Graph name
    pub name: String,
    /// Nodes
    pub nodes: Vec<NodeDefinition>,
    /// Links
    #[serde(default)]
    pub links: Vec<Link>,
}

impl GraphDefinition {
    /// Create an empty definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Serialize to RON format
    pub fn to_ron(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Deserialize from RON format
    pub fn from_ron(s: &str) -> Result<Self> {
        Ok(ron::from_str(s)?)
    }

    /// Load a definition from file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let definition = Self::from_ron(&contents)?;
        tracing::debug!("Loaded graph '{}' from {:?}", definition.name, path);
        Ok(definition)
    }

    /// Save the definition to file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Instantiate every node through `factory` and compile the blueprint
    pub fn compile(&self, factory: &NodeFactory, settings: &RuntimeSettings) -> Result<Blueprint> {
        let mut builder = Blueprint::builder(self.name.clone());
        for node in &self.nodes {
            factory.construct(&mut builder, node)?;
        }
        builder.links(self.links.iter().copied());
        builder.build(settings)
    }
}

type NodeConstructor = fn(&mut BlueprintBuilder, NodeId, &str) -> Result<()>;

fn construct<N>(builder: &mut BlueprintBuilder, id: NodeId, config: &str) -> Result<()>
where
    N: BlueprintNode + DeserializeOwned + Default,
{
    let node = if config.trim().is_empty() {
        N::default()
    } else {
        ron::from_str::<N>(config).map_err(|source| BlueprintError::Config { node: id, source })?
    };
    builder.add_node(id, node)?;
    Ok(())
}

/// Maps kind names in graph definitions to node types
#[derive(Clone, Default)]
pub struct NodeFactory {
    kinds: IndexMap<String, NodeConstructor>,
}

impl std::fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeFactory")
            .field("kinds", &self.kinds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeFactory {
    /// Create an empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory knowing every node shipped with the runtime
    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory
            .register::<EventEntry>("event")
            .register::<Constant>("constant")
            .register::<AddInt>("add_int")
            .register::<Branch>("branch")
            .register::<Sequence>("sequence")
            .register::<Counter>("counter")
            .register::<Print>("print")
            .register::<Label>("label")
            .register::<Goto>("goto")
            .register::<Delay>("delay")
            .register::<ActionList>("action_list");
        factory
    }

    /// Register a node type under `kind`, replacing any previous registration
    pub fn register<N>(&mut self, kind: impl Into<String>) -> &mut Self
    where
        N: BlueprintNode + DeserializeOwned + Default,
    {
        self.kinds.insert(kind.into(), construct::<N>);
        self
    }

    /// Check if a kind is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kinds, in registration order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    fn construct(&self, builder: &mut BlueprintBuilder, node: &NodeDefinition) -> Result<()> {
        let constructor = self
            .kinds
            .get(&node.kind)
            .ok_or_else(|| BlueprintError::UnknownKind(node.kind.clone()))?;
        constructor(builder, node.id, &node.config)
    }
}
