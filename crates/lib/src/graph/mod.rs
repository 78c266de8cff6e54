//! Dependency graph of configurations within one environment.
//!
//! Nodes are keyed by [`Coordinate`]; an edge `a -> b` means configuration `a`
//! references a property of configuration `b`, so `b` has to be deployed
//! first. References of skipped configurations are not followed, and a
//! configuration's references to itself only order its own parameters.

pub mod sort;

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::dot::{Config as DotConfig, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, Configuration};
use crate::identity::Coordinate;

pub use sort::{SortError, format_cycle, project_order, topo_sort};

/// Errors that can occur while building a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  /// A configuration references a configuration that is not loaded for the
  /// environment.
  #[error("{referencer} references {target}.{property}, but {target} is not loaded in environment '{environment}'")]
  UnresolvedReference {
    environment: String,
    referencer: Coordinate,
    target: Coordinate,
    property: String,
  },

  #[error("{coordinate} is defined more than once in environment '{environment}'")]
  DuplicateCoordinate { environment: String, coordinate: Coordinate },

  #[error("{coordinate} belongs to environment '{actual}', not '{expected}'")]
  EnvironmentMismatch {
    expected: String,
    actual: String,
    coordinate: Coordinate,
  },

  /// Malformed references or parameter cycles inside a configuration.
  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// The dependency graph of one environment.
#[derive(Debug)]
pub struct DependencyGraph {
  environment: String,

  /// Edges point from the referencing configuration to the referenced one.
  graph: DiGraph<Coordinate, ()>,

  nodes: BTreeMap<Coordinate, NodeIndex>,

  configs: BTreeMap<Coordinate, Configuration>,

  /// Project -> projects it references.
  project_dependencies: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
  /// Build the graph of `environment` from its configurations.
  ///
  /// # Errors
  ///
  /// Fails on the first configuration that belongs to another environment, is
  /// defined twice, has a malformed reference or parameter cycle, or
  /// references a configuration that is not part of `configs`.
  pub fn build(
    environment: impl Into<String>,
    configs: impl IntoIterator<Item = Configuration>,
  ) -> Result<Self, GraphError> {
    let environment = environment.into();
    let mut by_coordinate: BTreeMap<Coordinate, Configuration> = BTreeMap::new();

    for config in configs {
      if config.environment != environment {
        return Err(GraphError::EnvironmentMismatch {
          expected: environment,
          actual: config.environment.clone(),
          coordinate: config.coordinate.clone(),
        });
      }
      if by_coordinate.contains_key(&config.coordinate) {
        return Err(GraphError::DuplicateCoordinate {
          environment,
          coordinate: config.coordinate.clone(),
        });
      }
      by_coordinate.insert(config.coordinate.clone(), config);
    }

    // Nodes are added in coordinate order so node indices, and with them the
    // DOT output, are stable.
    let mut graph = DiGraph::new();
    let mut nodes = BTreeMap::new();
    for coordinate in by_coordinate.keys() {
      nodes.insert(coordinate.clone(), graph.add_node(coordinate.clone()));
    }

    let mut project_dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (coordinate, config) in &by_coordinate {
      if config.skip {
        debug!(coordinate = %coordinate, environment = %environment, "skipped, references not followed");
        continue;
      }

      config.parameter_order()?;

      let referencer = nodes[coordinate];
      for (name, parameter) in &config.parameters {
        let refs = parameter
          .references(coordinate)
          .map_err(|source| ConfigError::InvalidReference {
            coordinate: coordinate.clone(),
            parameter: name.clone(),
            source,
          })?;

        for reference in refs {
          if &reference.coordinate == coordinate {
            continue;
          }

          let Some(&target) = nodes.get(&reference.coordinate) else {
            return Err(GraphError::UnresolvedReference {
              environment,
              referencer: coordinate.clone(),
              target: reference.coordinate,
              property: reference.property,
            });
          };

          graph.update_edge(referencer, target, ());

          if !reference.coordinate.same_project(coordinate) {
            project_dependencies
              .entry(coordinate.project.clone())
              .or_default()
              .insert(reference.coordinate.project.clone());
          }
        }
      }
    }

    debug!(
      environment = %environment,
      nodes = graph.node_count(),
      edges = graph.edge_count(),
      "built dependency graph"
    );

    Ok(Self {
      environment,
      graph,
      nodes,
      configs: by_coordinate,
      project_dependencies,
    })
  }

  pub fn environment(&self) -> &str {
    &self.environment
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn edge_count(&self) -> usize {
    self.graph.edge_count()
  }

  /// All coordinates, in ascending order.
  pub fn coordinates(&self) -> impl Iterator<Item = &Coordinate> {
    self.nodes.keys()
  }

  pub fn config(&self, coordinate: &Coordinate) -> Option<&Configuration> {
    self.configs.get(coordinate)
  }

  pub fn configs(&self) -> impl Iterator<Item = &Configuration> {
    self.configs.values()
  }

  /// Configurations directly referenced by `coordinate`, sorted.
  pub fn dependencies(&self, coordinate: &Coordinate) -> Vec<Coordinate> {
    self.neighbors(coordinate, Direction::Outgoing)
  }

  /// Configurations directly referencing `coordinate`, sorted.
  pub fn dependents(&self, coordinate: &Coordinate) -> Vec<Coordinate> {
    self.neighbors(coordinate, Direction::Incoming)
  }

  fn neighbors(&self, coordinate: &Coordinate, direction: Direction) -> Vec<Coordinate> {
    let Some(&idx) = self.nodes.get(coordinate) else {
      return Vec::new();
    };

    let mut neighbors: Vec<Coordinate> = self
      .graph
      .neighbors_directed(idx, direction)
      .map(|n| self.graph[n].clone())
      .collect();
    neighbors.sort();
    neighbors
  }

  /// All edges as `(referencer, referenced)` pairs, sorted.
  pub fn edges(&self) -> Vec<(Coordinate, Coordinate)> {
    let mut edges: Vec<(Coordinate, Coordinate)> = self
      .graph
      .edge_indices()
      .filter_map(|e| self.graph.edge_endpoints(e))
      .map(|(from, to)| (self.graph[from].clone(), self.graph[to].clone()))
      .collect();
    edges.sort();
    edges
  }

  /// Every coordinate with the set of coordinates it references.
  pub fn dependency_map(&self) -> BTreeMap<Coordinate, BTreeSet<Coordinate>> {
    self
      .nodes
      .keys()
      .map(|c| (c.clone(), self.dependencies(c).into_iter().collect()))
      .collect()
  }

  /// Project -> projects it references, for projects with cross-project
  /// references.
  pub fn project_dependencies(&self) -> &BTreeMap<String, BTreeSet<String>> {
    &self.project_dependencies
  }

  /// `roots` plus everything they reference, directly or indirectly.
  ///
  /// Unknown roots are ignored.
  pub fn transitive_dependencies<'a>(&self, roots: impl IntoIterator<Item = &'a Coordinate>) -> BTreeSet<Coordinate> {
    let mut closure = BTreeSet::new();

    for root in roots {
      let Some(&start) = self.nodes.get(root) else {
        continue;
      };
      let mut dfs = Dfs::new(&self.graph, start);
      while let Some(idx) = dfs.next(&self.graph) {
        closure.insert(self.graph[idx].clone());
      }
    }

    closure
  }

  /// Render the graph in Graphviz DOT format.
  pub fn to_dot(&self) -> String {
    let labelled = self.graph.map(|_, coordinate| coordinate.to_string(), |_, _| "");
    format!("{}", Dot::with_config(&labelled, &[DotConfig::EdgeNoLabel]))
  }
}

/// Group configurations by environment and build one graph per environment.
///
/// Each environment succeeds or fails on its own.
pub fn build_graph(
  configs: impl IntoIterator<Item = Configuration>,
) -> BTreeMap<String, Result<DependencyGraph, GraphError>> {
  let mut by_environment: BTreeMap<String, Vec<Configuration>> = BTreeMap::new();
  for config in configs {
    by_environment.entry(config.environment.clone()).or_default().push(config);
  }

  by_environment
    .into_iter()
    .map(|(environment, configs)| {
      let graph = DependencyGraph::build(environment.clone(), configs);
      (environment, graph)
    })
    .collect()
}
