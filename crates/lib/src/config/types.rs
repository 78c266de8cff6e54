//! Configuration type classifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::{Coordinate, ExternalId};

/// The kind of remote resource a configuration deploys to.
///
/// Clients are registered per kind; the payload of [`ConfigType`] carries the
/// details (API name, schema, ...) a client needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeKind {
  ClassicApi,
  Settings,
  Entity,
  Bucket,
  Document,
  Segment,
  Slo,
  Automation,
}

impl TypeKind {
  pub fn as_str(self) -> &'static str {
    match self {
      TypeKind::ClassicApi => "classic-api",
      TypeKind::Settings => "settings",
      TypeKind::Entity => "entity",
      TypeKind::Bucket => "bucket",
      TypeKind::Document => "document",
      TypeKind::Segment => "segment",
      TypeKind::Slo => "slo",
      TypeKind::Automation => "automation",
    }
  }
}

impl fmt::Display for TypeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
  Dashboard,
  Notebook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutomationResource {
  Workflow,
  BusinessCalendar,
  SchedulingRule,
}

impl AutomationResource {
  pub fn as_str(self) -> &'static str {
    match self {
      AutomationResource::Workflow => "workflow",
      AutomationResource::BusinessCalendar => "business-calendar",
      AutomationResource::SchedulingRule => "scheduling-rule",
    }
  }
}

/// Classifies a configuration by the remote resource it deploys to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ConfigType {
  /// A classic API object, addressed by name.
  ClassicApi { api: String },

  /// A settings object of a schema.
  Settings {
    schema_id: String,
    #[serde(default)]
    schema_version: Option<String>,
  },

  /// A monitored entity. Entities are never deployed, only referenced.
  Entity { entity_type: String },

  Bucket,

  Document { document_kind: DocumentKind },

  Segment,

  Slo,

  Automation { resource: AutomationResource },
}

impl ConfigType {
  pub fn kind(&self) -> TypeKind {
    match self {
      ConfigType::ClassicApi { .. } => TypeKind::ClassicApi,
      ConfigType::Settings { .. } => TypeKind::Settings,
      ConfigType::Entity { .. } => TypeKind::Entity,
      ConfigType::Bucket => TypeKind::Bucket,
      ConfigType::Document { .. } => TypeKind::Document,
      ConfigType::Segment => TypeKind::Segment,
      ConfigType::Slo => TypeKind::Slo,
      ConfigType::Automation { .. } => TypeKind::Automation,
    }
  }

  /// The type component of coordinates of this type.
  pub fn id(&self) -> &str {
    match self {
      ConfigType::ClassicApi { api } => api.as_str(),
      ConfigType::Settings { schema_id, .. } => schema_id.as_str(),
      ConfigType::Entity { entity_type } => entity_type.as_str(),
      ConfigType::Bucket => "bucket",
      ConfigType::Document { .. } => "document",
      ConfigType::Segment => "segment",
      ConfigType::Slo => "slo-v2",
      ConfigType::Automation { resource } => resource.as_str(),
    }
  }

  /// Classic API objects are found by name rather than by external id.
  pub fn is_name_addressed(&self) -> bool {
    matches!(self, ConfigType::ClassicApi { .. })
  }

  pub fn is_deployable(&self) -> bool {
    !matches!(self, ConfigType::Entity { .. })
  }

  /// The external id a configuration of this type carries.
  pub fn external_id(&self, coordinate: &Coordinate) -> ExternalId {
    match self {
      ConfigType::Document { .. } => ExternalId::for_document(coordinate),
      _ => ExternalId::for_coordinate(coordinate),
    }
  }
}

impl fmt::Display for ConfigType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.id(), self.kind())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn ids_and_kinds() {
    let settings = ConfigType::Settings {
      schema_id: "builtin:alerting.profile".to_string(),
      schema_version: None,
    };
    assert_eq!(settings.id(), "builtin:alerting.profile");
    assert_eq!(settings.kind(), TypeKind::Settings);

    let workflow = ConfigType::Automation {
      resource: AutomationResource::Workflow,
    };
    assert_eq!(workflow.id(), "workflow");
    assert_eq!(workflow.kind().to_string(), "automation");
  }

  #[test]
  fn only_classic_is_name_addressed() {
    assert!(ConfigType::ClassicApi { api: "dashboard".into() }.is_name_addressed());
    assert!(!ConfigType::Bucket.is_name_addressed());
  }

  #[test]
  fn entities_are_not_deployable() {
    assert!(!ConfigType::Entity { entity_type: "HOST".into() }.is_deployable());
    assert!(ConfigType::Slo.is_deployable());
  }

  #[test]
  fn documents_use_document_ids() {
    let coord = Coordinate::new("p", "document", "c");
    let doc = ConfigType::Document {
      document_kind: DocumentKind::Notebook,
    };
    assert_eq!(doc.external_id(&coord), ExternalId::for_document(&coord));
    assert_eq!(ConfigType::Segment.external_id(&coord), ExternalId::for_coordinate(&coord));
  }

  #[test]
  fn deserializes_tagged() {
    let parsed: ConfigType = serde_json::from_value(json!({"kind": "classic-api", "api": "alerting-profile"})).unwrap();
    assert_eq!(parsed, ConfigType::ClassicApi { api: "alerting-profile".into() });

    let parsed: ConfigType = serde_json::from_value(json!({"kind": "settings", "schema_id": "builtin:x"})).unwrap();
    assert_eq!(
      parsed,
      ConfigType::Settings {
        schema_id: "builtin:x".into(),
        schema_version: None
      }
    );

    let parsed: ConfigType = serde_json::from_value(json!({"kind": "slo"})).unwrap();
    assert_eq!(parsed, ConfigType::Slo);
  }
}
