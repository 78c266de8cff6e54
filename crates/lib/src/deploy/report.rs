//! Deployment reporting.
//!
//! The executor hands one [`ReportRecord`] per configuration to a
//! [`Reporter`]. Reporters must not fail the deployment; write errors are
//! logged and dropped.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::types::{DeployState, Outcome};
use crate::identity::Coordinate;

/// One reported configuration outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
  pub timestamp: DateTime<Utc>,
  pub environment: String,
  pub coordinate: Coordinate,
  pub state: DeployState,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub remote_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details: Option<Value>,
  #[serde(default)]
  pub dry_run: bool,
}

impl ReportRecord {
  pub fn from_outcome(environment: &str, outcome: &Outcome, dry_run: bool) -> Self {
    Self {
      timestamp: Utc::now(),
      environment: environment.to_string(),
      coordinate: outcome.coordinate.clone(),
      state: outcome.state,
      remote_id: outcome.remote_id.clone(),
      error: outcome.error.as_ref().map(ToString::to_string),
      details: outcome.details.clone(),
      dry_run,
    }
  }
}

/// Receives outcomes as they happen.
pub trait Reporter: Send + Sync {
  fn report(&self, record: ReportRecord);
}

/// Discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
  fn report(&self, _record: ReportRecord) {}
}

/// Keeps all records in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
  records: Mutex<Vec<ReportRecord>>,
}

impl MemoryReporter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn records(&self) -> Vec<ReportRecord> {
    self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

impl Reporter for MemoryReporter {
  fn report(&self, record: ReportRecord) {
    self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
  }
}

/// Writes one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesReporter<W: Write + Send> {
  writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesReporter<W> {
  pub fn new(writer: W) -> Self {
    Self {
      writer: Mutex::new(writer),
    }
  }

  pub fn into_inner(self) -> W {
    self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<W: Write + Send> Reporter for JsonLinesReporter<W> {
  fn report(&self, record: ReportRecord) {
    let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    let written = serde_json::to_writer(&mut *writer, &record)
      .map_err(std::io::Error::from)
      .and_then(|()| writer.write_all(b"\n"))
      .and_then(|()| writer.flush());

    if let Err(e) = written {
      warn!(coordinate = %record.coordinate, error = %e, "failed to write report record");
    }
  }
}
