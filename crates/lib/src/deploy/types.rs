//! Types for deploying configurations.
//!
//! This module defines the options, error type, and per-configuration
//! outcomes of a deployment run.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::client::{ClientError, InventoryError};
use crate::config::ConfigError;
use crate::graph::{GraphError, SortError};
use crate::identity::Coordinate;
use crate::parameter::ResolveError;
use crate::template::TemplateError;

/// Errors that can occur while deploying.
///
/// Graph, sort and inventory errors fail a whole environment. All other
/// variants fail a single configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error(transparent)]
  Sort(#[from] SortError),

  #[error("inventory: {0}")]
  Inventory(#[from] InventoryError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("{coordinate}: parameter '{parameter}': {source}")]
  Resolve {
    coordinate: Coordinate,
    parameter: String,
    #[source]
    source: ResolveError,
  },

  #[error("{coordinate}: {source}")]
  Render {
    coordinate: Coordinate,
    #[source]
    source: TemplateError,
  },

  /// Entities are never created, so their remote id has to be known.
  #[error("{coordinate}: entity configurations need an origin object id")]
  MissingOriginId { coordinate: Coordinate },

  #[error("{coordinate}: {} remote objects match, refusing to pick one: {}", .candidates.len(), .candidates.join(", "))]
  AmbiguousExisting { coordinate: Coordinate, candidates: Vec<String> },

  #[error("{coordinate}: {source}")]
  Client {
    coordinate: Coordinate,
    #[source]
    source: ClientError,
  },

  #[error("deployment task failed: {0}")]
  Task(String),
}

/// Restricts a deployment to some projects and/or configuration types.
///
/// Empty sets select everything. Selected configurations pull in everything
/// they depend on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
  pub projects: BTreeSet<String>,
  pub types: BTreeSet<String>,
}

impl Selection {
  pub fn all() -> Self {
    Self::default()
  }

  pub fn projects<I, S>(projects: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      projects: projects.into_iter().map(Into::into).collect(),
      types: BTreeSet::new(),
    }
  }

  pub fn with_types<I, S>(mut self, types: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.types = types.into_iter().map(Into::into).collect();
    self
  }

  pub fn is_all(&self) -> bool {
    self.projects.is_empty() && self.types.is_empty()
  }

  pub fn matches(&self, coordinate: &Coordinate) -> bool {
    (self.projects.is_empty() || self.projects.contains(&coordinate.project))
      && (self.types.is_empty() || self.types.contains(&coordinate.config_type))
  }
}

/// Options for a deployment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployOptions {
  /// Keep deploying after a configuration failed.
  pub continue_on_error: bool,

  /// Resolve, render and validate only; never call the remote platform.
  pub dry_run: bool,

  pub selection: Selection,

  /// Upper bound for each single remote call, in seconds.
  pub call_timeout_secs: Option<u64>,
}

impl DeployOptions {
  pub fn call_timeout(&self) -> Option<Duration> {
    self.call_timeout_secs.map(Duration::from_secs)
  }
}

/// Final state of one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeployState {
  Success,
  Error,
  Skipped,
  Excluded,
}

impl DeployState {
  pub fn as_str(self) -> &'static str {
    match self {
      DeployState::Success => "SUCCESS",
      DeployState::Error => "ERROR",
      DeployState::Skipped => "SKIPPED",
      DeployState::Excluded => "EXCLUDED",
    }
  }
}

impl fmt::Display for DeployState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What happened to one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
  pub coordinate: Coordinate,
  pub state: DeployState,

  /// Remote id of the deployed object (or entity).
  pub remote_id: Option<String>,

  pub error: Option<DeployError>,

  /// Structured context for reporters, e.g. the external id and whether an
  /// existing object was updated.
  pub details: Option<Value>,
}

impl Outcome {
  pub fn success(coordinate: Coordinate, remote_id: Option<String>) -> Self {
    Self {
      coordinate,
      state: DeployState::Success,
      remote_id,
      error: None,
      details: None,
    }
  }

  pub fn failed(coordinate: Coordinate, error: DeployError) -> Self {
    Self {
      coordinate,
      state: DeployState::Error,
      remote_id: None,
      error: Some(error),
      details: None,
    }
  }

  pub fn skipped(coordinate: Coordinate) -> Self {
    Self {
      coordinate,
      state: DeployState::Skipped,
      remote_id: None,
      error: None,
      details: None,
    }
  }

  pub fn with_details(mut self, details: Value) -> Self {
    self.details = Some(details);
    self
  }

  pub fn excluded(coordinate: Coordinate) -> Self {
    Self {
      coordinate,
      state: DeployState::Excluded,
      remote_id: None,
      error: None,
      details: None,
    }
  }
}

/// Result of deploying one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployResult {
  pub environment: String,

  /// One outcome per processed configuration, in deployment order.
  pub outcomes: Vec<Outcome>,

  /// Deployment stopped at the first error; configurations after it have no
  /// outcome.
  pub aborted: bool,
}

impl DeployResult {
  pub fn new(environment: impl Into<String>) -> Self {
    Self {
      environment: environment.into(),
      ..Self::default()
    }
  }

  pub fn is_success(&self) -> bool {
    !self.aborted && self.error_count() == 0
  }

  pub fn error_count(&self) -> usize {
    self.count(DeployState::Error)
  }

  pub fn count(&self, state: DeployState) -> usize {
    self.outcomes.iter().filter(|o| o.state == state).count()
  }

  pub fn outcome(&self, coordinate: &Coordinate) -> Option<&Outcome> {
    self.outcomes.iter().find(|o| &o.coordinate == coordinate)
  }

  pub fn state(&self, coordinate: &Coordinate) -> Option<DeployState> {
    self.outcome(coordinate).map(|o| o.state)
  }
}
