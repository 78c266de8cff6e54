//! Coordinates identifying a configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a configuration within one project/type namespace.
///
/// Coordinates are ordered field by field (project, then type, then config id).
/// This ordering is the tie-break used wherever a deterministic order is needed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
  pub project: String,
  #[serde(rename = "type")]
  pub config_type: String,
  pub config_id: String,
}

impl Coordinate {
  pub fn new(project: impl Into<String>, config_type: impl Into<String>, config_id: impl Into<String>) -> Self {
    Self {
      project: project.into(),
      config_type: config_type.into(),
      config_id: config_id.into(),
    }
  }

  /// Returns true if both coordinates live in the same project.
  pub fn same_project(&self, other: &Coordinate) -> bool {
    self.project == other.project
  }
}

impl fmt::Display for Coordinate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.project, self.config_type, self.config_id)
  }
}
