//! Deterministic topological sorting.
//!
//! Kahn's algorithm with an ordered ready set: whenever several nodes are ready,
//! the smallest one (by `Ord`) is emitted first. The same input therefore always
//! produces the same order, which keeps dry runs and logs diffable.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use thiserror::Error;

use super::DependencyGraph;
use crate::identity::Coordinate;

/// Errors that can occur while sorting a dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
  /// Configurations depend on each other in a cycle.
  #[error("dependency cycle detected in environment '{environment}': {}", format_cycle(.cycle))]
  CycleDetected { environment: String, cycle: Vec<Coordinate> },

  /// Projects depend on each other in a cycle.
  #[error("project dependency cycle detected in environment '{environment}': {}", format_cycle(.cycle))]
  ProjectCycle { environment: String, cycle: Vec<String> },
}

/// Render a cycle as `a -> b -> a`.
pub fn format_cycle<N: Display>(cycle: &[N]) -> String {
  let mut parts: Vec<String> = cycle.iter().map(ToString::to_string).collect();
  if let Some(first) = parts.first().cloned() {
    parts.push(first);
  }
  parts.join(" -> ")
}

/// Sort the configurations of a graph so that every configuration comes after
/// all configurations it references.
///
/// # Errors
///
/// Returns [`SortError::CycleDetected`] with one concrete cycle if the graph is
/// not acyclic.
pub fn topo_sort(graph: &DependencyGraph) -> Result<Vec<Coordinate>, SortError> {
  kahn_order(&graph.dependency_map()).map_err(|cycle| SortError::CycleDetected {
    environment: graph.environment().to_string(),
    cycle,
  })
}

/// Sort the projects of a graph so that every project comes after the projects
/// it references.
pub fn project_order(graph: &DependencyGraph) -> Result<Vec<String>, SortError> {
  let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
  for coordinate in graph.coordinates() {
    dependencies.entry(coordinate.project.clone()).or_default();
  }
  for (project, deps) in graph.project_dependencies() {
    dependencies.entry(project.clone()).or_default().extend(deps.iter().cloned());
  }

  kahn_order(&dependencies).map_err(|cycle| SortError::ProjectCycle {
    environment: graph.environment().to_string(),
    cycle,
  })
}

/// Order the keys of `dependencies` so that every node follows the nodes it
/// depends on.
///
/// Dependencies that are not keys of the map are ignored. On failure the
/// returned vector is one cycle, starting at the smallest node that could not
/// be sorted and following dependency edges.
pub(crate) fn kahn_order<N: Ord + Clone>(dependencies: &BTreeMap<N, BTreeSet<N>>) -> Result<Vec<N>, Vec<N>> {
  let mut pending: BTreeMap<&N, usize> = BTreeMap::new();
  let mut dependents: BTreeMap<&N, Vec<&N>> = BTreeMap::new();

  for (node, deps) in dependencies {
    let known: Vec<&N> = deps.iter().filter(|d| dependencies.contains_key(*d)).collect();
    pending.insert(node, known.len());
    for dep in known {
      dependents.entry(dep).or_default().push(node);
    }
  }

  let mut ready: BTreeSet<&N> = pending.iter().filter(|(_, count)| **count == 0).map(|(n, _)| *n).collect();
  let mut order: Vec<N> = Vec::with_capacity(dependencies.len());

  while let Some(node) = ready.pop_first() {
    order.push(node.clone());
    for &dependent in dependents.get(node).into_iter().flatten() {
      if let Some(count) = pending.get_mut(dependent) {
        *count = count.saturating_sub(1);
        if *count == 0 {
          ready.insert(dependent);
        }
      }
    }
  }

  if order.len() == dependencies.len() {
    return Ok(order);
  }

  let sorted: BTreeSet<&N> = order.iter().collect();
  Err(find_cycle(dependencies, &sorted))
}

/// Walk dependency edges among unsorted nodes until a node repeats.
///
/// Every unsorted node still waits on at least one unsorted dependency, so the
/// walk cannot dead-end.
fn find_cycle<N: Ord + Clone>(dependencies: &BTreeMap<N, BTreeSet<N>>, sorted: &BTreeSet<&N>) -> Vec<N> {
  let unsorted = |n: &&N| !sorted.contains(n) && dependencies.contains_key(*n);

  let Some(mut current) = dependencies.keys().find(unsorted) else {
    return Vec::new();
  };

  let mut path: Vec<&N> = Vec::new();
  let mut seen: BTreeMap<&N, usize> = BTreeMap::new();

  loop {
    if let Some(&start) = seen.get(current) {
      return path[start..].iter().map(|n| (*n).clone()).collect();
    }
    seen.insert(current, path.len());
    path.push(current);

    match dependencies.get(current).and_then(|deps| deps.iter().find(unsorted)) {
      Some(next) => current = next,
      None => return path.into_iter().cloned().collect(),
    }
  }
}
