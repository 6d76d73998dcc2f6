// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` Blueprint Runner - headless blueprint host
//!
//! Loads a graph definition, attaches it to a fresh owner, fires every event
//! entry, pumps asynchronous completions frame by frame and prints a RON
//! report of the node state left behind.
//!
//! ```text
//! ordoplay_blueprint_runner <graph.ron> [settings.ron]
//! ```

use ordoplay_blueprint::nodes::{ActionState, CounterState, DelayState, EventEntry, PrintLog};
use ordoplay_blueprint::{
    ActivationId, Blueprint, BlueprintError, GraphDefinition, NodeFactory, NodeId, NodeToken,
    RootId, Runtime, RuntimeSettings,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Errors that end a run
#[derive(Debug, Error)]
enum RunnerError {
    #[error("Usage: ordoplay_blueprint_runner <graph.ron> [settings.ron]")]
    Usage,

    #[error("Failed to load settings from {path:?}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load graph from {path:?}: {source}")]
    Graph {
        path: PathBuf,
        #[source]
        source: BlueprintError,
    },

    #[error("Failed to compile graph: {0}")]
    Compile(#[from] BlueprintError),

    #[error("Failed to write report: {0}")]
    Report(#[from] ron::Error),
}

struct Args {
    graph: PathBuf,
    settings: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self, RunnerError> {
        let mut args = std::env::args_os().skip(1);
        let graph = args.next().map(PathBuf::from).ok_or(RunnerError::Usage)?;
        let settings = args.next().map(PathBuf::from);
        if args.next().is_some() {
            return Err(RunnerError::Usage);
        }
        Ok(Self { graph, settings })
    }
}

/// State of one node after the run
#[derive(Debug, Serialize)]
struct NodeReport {
    id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    printed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delays_completed: Option<u32>,
}

/// Summary printed to stdout
#[derive(Debug, Serialize)]
struct RunReport {
    graph: String,
    frames: u32,
    seconds: f64,
    continuations: usize,
    pending: usize,
    nodes: Vec<NodeReport>,
}

fn load_settings(path: Option<&Path>) -> Result<RuntimeSettings, RunnerError> {
    match path {
        Some(path) => RuntimeSettings::load(path).map_err(|source| RunnerError::Settings {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(RuntimeSettings::default()),
    }
}

fn init_tracing(settings: &RuntimeSettings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn entry_points(blueprint: &Blueprint) -> Vec<NodeId> {
    blueprint
        .node_ids()
        .filter(|id| blueprint.node::<EventEntry>(*id).is_some())
        .collect()
}

fn node_report(runtime: &Runtime, activation: ActivationId, id: NodeId) -> Option<NodeReport> {
    let token = NodeToken::new(id, activation);
    let report = NodeReport {
        id: id.0,
        count: runtime.state::<CounterState>(token).map(|s| s.count),
        score: runtime.state::<ActionState>(token).map(|s| s.score),
        printed: runtime
            .state::<PrintLog>(token)
            .map(|log| log.lines.clone())
            .unwrap_or_default(),
        delays_completed: runtime.state::<DelayState>(token).map(|s| s.completed),
    };

    let empty = report.count.is_none()
        && report.score.is_none()
        && report.printed.is_empty()
        && report.delays_completed.is_none();
    (!empty).then_some(report)
}

/// Attach the graph to one owner, fire its entries and pump deferred work
fn execute(
    definition: &GraphDefinition,
    settings: &RuntimeSettings,
) -> Result<RunReport, RunnerError> {
    let blueprint = definition.compile(&NodeFactory::with_builtins(), settings)?;
    tracing::info!(
        "Compiled '{}' ({} nodes, {} links)",
        blueprint.name(),
        blueprint.node_count(),
        blueprint.links().len()
    );

    let entries = entry_points(&blueprint);
    let mut runtime = Runtime::new(blueprint);
    let root = RootId::new();
    let activation = runtime.initialize(root);

    for id in &entries {
        tracing::info!("Firing event entry {}", id);
        runtime.call(NodeToken::new(*id, activation), EventEntry::OUT);
    }

    let mut frames = 0;
    let mut continuations = 0;
    while frames < settings.frames && !runtime.deferred().is_empty() {
        continuations += runtime.advance(settings.frame_seconds);
        frames += 1;
    }
    let pending = runtime.deferred().len();
    if pending > 0 {
        tracing::warn!("{} continuations still pending after {} frames", pending, frames);
    }

    let report = RunReport {
        graph: runtime.blueprint().name().to_string(),
        frames,
        seconds: runtime.now(),
        continuations,
        pending,
        nodes: runtime
            .blueprint()
            .node_ids()
            .filter_map(|id| node_report(&runtime, activation, id))
            .collect(),
    };

    let stopped = runtime.deinitialize_root(root);
    tracing::info!("Finished after {} frames, {} activations torn down", frames, stopped);
    Ok(report)
}

fn run(args: Args) -> Result<String, RunnerError> {
    let settings = load_settings(args.settings.as_deref())?;
    init_tracing(&settings);
    tracing::info!("Starting OrdoPlay Blueprint Runner v{}", env!("CARGO_PKG_VERSION"));

    let definition = GraphDefinition::load(&args.graph).map_err(|source| RunnerError::Graph {
        path: args.graph.clone(),
        source,
    })?;
    let report = execute(&definition, &settings)?;

    let config = ron::ser::PrettyConfig::default().struct_names(true);
    Ok(ron::ser::to_string_pretty(&report, config)?)
}

fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Run failed: {e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(report: &RunReport, id: u32) -> &NodeReport {
        report.nodes.iter().find(|n| n.id == id).unwrap()
    }

    #[test]
    fn test_demo_graph() {
        let definition =
            GraphDefinition::from_ron(include_str!("../assets/demo.blueprint.ron")).unwrap();
        let report = execute(&definition, &RuntimeSettings::default()).unwrap();

        assert_eq!(report.graph, "demo");
        assert_eq!(report.continuations, 1);
        assert_eq!(report.pending, 0);
        assert!(report.frames >= 30 && report.frames < 120);

        assert_eq!(node(&report, 3).printed, vec!["Blueprint started".to_string()]);
        assert_eq!(node(&report, 4).score, Some(10));
        assert_eq!(node(&report, 6).delays_completed, Some(1));
        assert_eq!(node(&report, 7).count, Some(1));
        assert_eq!(node(&report, 10).printed, vec!["Finished after delay".to_string()]);
    }

    #[test]
    fn test_frame_budget_leaves_work_pending() {
        let definition =
            GraphDefinition::from_ron(include_str!("../assets/demo.blueprint.ron")).unwrap();
        let settings = RuntimeSettings {
            frames: 10,
            ..RuntimeSettings::default()
        };
        let report = execute(&definition, &settings).unwrap();

        assert_eq!(report.frames, 10);
        assert_eq!(report.pending, 1);
        assert!(report.nodes.iter().all(|n| n.id != 7));
    }

    #[test]
    fn test_shipped_settings_parse() {
        let settings: RuntimeSettings = ron::from_str(include_str!("../assets/runtime.ron")).unwrap();
        assert_eq!(settings.frames, 120);
    }
}
