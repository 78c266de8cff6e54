//! Loading of plan documents.
//!
//! A plan document is a JSON file listing configurations:
//!
//! ```json
//! {"configs": [{
//!   "project": "infra",
//!   "type": {"kind": "classic-api", "api": "dashboard"},
//!   "id": "overview",
//!   "environment": "prod",
//!   "template": "{\"name\": \"{{ .name }}\"}",
//!   "parameters": {"name": "Overview"}
//! }]}
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use cfgdeploy_lib::config::{DEFAULT_GROUP, resolve_skip};
use cfgdeploy_lib::template::TextTemplate;
use cfgdeploy_lib::{ConfigType, Configuration, ParserRegistry};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanDocument {
  pub configs: Vec<ConfigEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigEntry {
  pub project: String,
  #[serde(rename = "type")]
  pub config_type: ConfigType,
  pub id: String,
  pub environment: String,
  #[serde(default)]
  pub group: Option<String>,
  pub template: String,
  #[serde(default)]
  pub parameters: Map<String, Value>,
  /// A boolean, or a parameter definition resolving to one.
  #[serde(default)]
  pub skip: Option<Value>,
  #[serde(default)]
  pub origin_object_id: Option<String>,
}

/// Read a plan document and turn it into configurations.
pub fn load_plan(path: &Path) -> Result<Vec<Configuration>> {
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read plan: {}", path.display()))?;
  parse_plan(&content).with_context(|| format!("Invalid plan: {}", path.display()))
}

pub fn parse_plan(content: &str) -> Result<Vec<Configuration>> {
  let document: PlanDocument = serde_json::from_str(content).context("Failed to parse plan document")?;
  let registry = ParserRegistry::default();

  document
    .configs
    .into_iter()
    .map(|entry| into_configuration(entry, &registry))
    .collect()
}

fn into_configuration(entry: ConfigEntry, registry: &ParserRegistry) -> Result<Configuration> {
  let template = TextTemplate::new(format!("{}/{}", entry.project, entry.id), &entry.template)
    .with_context(|| format!("Invalid template of {}:{}", entry.project, entry.id))?;

  let mut config = Configuration::new(
    entry.project,
    entry.config_type,
    entry.id,
    entry.environment,
    Arc::new(template),
  )
  .with_group(entry.group.unwrap_or_else(|| DEFAULT_GROUP.to_string()));

  config.parameters = registry
    .parse_all(&entry.parameters)
    .with_context(|| format!("Invalid parameters of {}", config.coordinate))?;

  config.skip = match entry.skip {
    None | Some(Value::Null) => false,
    Some(Value::Bool(skip)) => skip,
    Some(raw) => {
      let parameter = registry
        .parse("skip", &raw)
        .with_context(|| format!("Invalid skip of {}", config.coordinate))?;
      resolve_skip(&config.coordinate, &parameter)?
    }
  };

  config.origin_object_id = entry.origin_object_id;

  debug!(
    coordinate = %config.coordinate,
    environment = %config.environment,
    parameters = config.parameters.len(),
    skip = config.skip,
    "loaded configuration"
  );

  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn loads_configuration_fields() {
    let configs = parse_plan(
      r#"{"configs": [{
        "project": "infra",
        "type": {"kind": "classic-api", "api": "dashboard"},
        "id": "overview",
        "environment": "prod",
        "group": "eu",
        "template": "{\"zone\": \"{{ .zone }}\"}",
        "parameters": {"zone": ["management-zone", "main", "id"]},
        "originObjectId": "abc"
      }]}"#,
    )
    .unwrap();

    let config = &configs[0];
    assert_eq!(config.coordinate.to_string(), "infra:dashboard:overview");
    assert_eq!(config.group, "eu");
    assert_eq!(config.origin_object_id.as_deref(), Some("abc"));
    assert!(!config.skip);
    assert!(config.parameters.contains_key("zone"));
  }

  #[test]
  fn skip_accepts_a_value_parameter() {
    let configs = parse_plan(
      r#"{"configs": [{
        "project": "p",
        "type": {"kind": "segment"},
        "id": "a",
        "environment": "prod",
        "template": "{}",
        "skip": {"type": "value", "value": "TRUE"}
      }]}"#,
    )
    .unwrap();
    assert!(configs[0].skip);
  }

  #[test]
  fn skip_rejects_references() {
    let err = parse_plan(
      r#"{"configs": [{
        "project": "p",
        "type": {"kind": "segment"},
        "id": "a",
        "environment": "prod",
        "template": "{}",
        "skip": ["segment", "b", "id"]
      }]}"#,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("p:segment:a"));
  }

  #[test]
  fn unknown_fields_are_rejected() {
    assert!(parse_plan(r#"{"configs": [], "extra": 1}"#).is_err());
  }
}
