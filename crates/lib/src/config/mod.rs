//! Configuration entities.
//!
//! A [`Configuration`] is created once by the loader and is immutable
//! afterwards. Its skip flag may come from a parameter; that parameter is
//! resolved at load time with [`resolve_skip`].

pub mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::graph::sort::kahn_order;
use crate::identity::{Coordinate, ExternalId};
use crate::parameter::{NoReferences, Parameter, Properties, ReferenceError, ResolveContext, ResolveError};
use crate::template::Template;

pub use types::{AutomationResource, ConfigType, DocumentKind, TypeKind};

/// Parameter holding the display name of a configuration.
pub const NAME_PARAMETER: &str = "name";

/// Parameter holding the parent scope of a configuration (e.g. a settings scope).
pub const SCOPE_PARAMETER: &str = "scope";

/// Property holding the remote object id of a deployed configuration.
pub const ID_PROPERTY: &str = "id";

/// Group used when the loader does not assign one.
pub const DEFAULT_GROUP: &str = "default";

/// Errors about a single configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("{coordinate}: parameter '{parameter}': {source}")]
  InvalidReference {
    coordinate: Coordinate,
    parameter: String,
    #[source]
    source: ReferenceError,
  },

  #[error("{coordinate}: parameter '{parameter}' references unknown parameter '{property}'")]
  UnknownParameter {
    coordinate: Coordinate,
    parameter: String,
    property: String,
  },

  #[error("{coordinate}: parameters reference each other in a cycle: {}", crate::graph::sort::format_cycle(.cycle))]
  ParameterCycle { coordinate: Coordinate, cycle: Vec<String> },

  #[error("{coordinate}: '{parameter}' is reserved and cannot be used as a parameter name")]
  ReservedParameter { coordinate: Coordinate, parameter: String },

  #[error("{coordinate}: skip: {source}")]
  SkipResolution {
    coordinate: Coordinate,
    #[source]
    source: ResolveError,
  },

  #[error("{coordinate}: skip must be a boolean, got {value}")]
  InvalidSkip { coordinate: Coordinate, value: Value },
}

/// A configuration to deploy to one environment.
#[derive(Debug, Clone)]
pub struct Configuration {
  pub coordinate: Coordinate,
  pub group: String,
  pub environment: String,
  pub config_type: ConfigType,
  pub template: Arc<dyn Template>,
  pub parameters: BTreeMap<String, Parameter>,
  pub skip: bool,
  pub origin_object_id: Option<String>,
}

impl Configuration {
  /// Create a configuration without parameters.
  ///
  /// The coordinate's type component is taken from `config_type`.
  pub fn new(
    project: impl Into<String>,
    config_type: ConfigType,
    config_id: impl Into<String>,
    environment: impl Into<String>,
    template: Arc<dyn Template>,
  ) -> Self {
    Self {
      coordinate: Coordinate::new(project, config_type.id(), config_id),
      group: DEFAULT_GROUP.to_string(),
      environment: environment.into(),
      config_type,
      template,
      parameters: BTreeMap::new(),
      skip: false,
      origin_object_id: None,
    }
  }

  pub fn with_parameter(mut self, name: impl Into<String>, parameter: Parameter) -> Self {
    self.parameters.insert(name.into(), parameter);
    self
  }

  pub fn with_group(mut self, group: impl Into<String>) -> Self {
    self.group = group.into();
    self
  }

  pub fn with_skip(mut self, skip: bool) -> Self {
    self.skip = skip;
    self
  }

  pub fn with_origin_object_id(mut self, id: impl Into<String>) -> Self {
    self.origin_object_id = Some(id.into());
    self
  }

  pub fn external_id(&self) -> ExternalId {
    self.config_type.external_id(&self.coordinate)
  }

  /// Order the parameters so that each one comes after the sibling parameters
  /// it reads.
  ///
  /// References to other configurations are ignored here; they are the
  /// dependency graph's concern.
  pub fn parameter_order(&self) -> Result<Vec<String>, ConfigError> {
    if self.parameters.contains_key(ID_PROPERTY) {
      return Err(ConfigError::ReservedParameter {
        coordinate: self.coordinate.clone(),
        parameter: ID_PROPERTY.to_string(),
      });
    }

    let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (name, parameter) in &self.parameters {
      let refs = parameter
        .references(&self.coordinate)
        .map_err(|source| ConfigError::InvalidReference {
          coordinate: self.coordinate.clone(),
          parameter: name.clone(),
          source,
        })?;

      let siblings = dependencies.entry(name.clone()).or_default();
      for reference in refs.into_iter().filter(|r| r.coordinate == self.coordinate) {
        if !self.parameters.contains_key(&reference.property) {
          return Err(ConfigError::UnknownParameter {
            coordinate: self.coordinate.clone(),
            parameter: name.clone(),
            property: reference.property,
          });
        }
        siblings.insert(reference.property);
      }
    }

    kahn_order(&dependencies).map_err(|cycle| ConfigError::ParameterCycle {
      coordinate: self.coordinate.clone(),
      cycle,
    })
  }
}

/// Resolve a skip parameter at load time.
///
/// Accepts booleans and the strings `"true"`/`"false"` (any case), so that
/// environment variables can toggle skipping. References cannot be used.
pub fn resolve_skip(coordinate: &Coordinate, parameter: &Parameter) -> Result<bool, ConfigError> {
  let properties = Properties::new();
  let ctx = ResolveContext::new(coordinate, &properties, &NoReferences);

  if let Parameter::Reference(_) | Parameter::Compound(_) = parameter {
    return Err(ConfigError::SkipResolution {
      coordinate: coordinate.clone(),
      source: ResolveError::Unsupported {
        kind: parameter.kind(),
        reason: "skip is resolved before any configuration is deployed".to_string(),
      },
    });
  }

  let value = parameter.resolve(&ctx).map_err(|source| ConfigError::SkipResolution {
    coordinate: coordinate.clone(),
    source,
  })?;

  match &value {
    Value::Bool(b) => Ok(*b),
    Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
    Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
    _ => Err(ConfigError::InvalidSkip {
      coordinate: coordinate.clone(),
      value,
    }),
  }
}
