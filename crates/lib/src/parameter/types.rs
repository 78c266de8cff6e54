//! Types shared by all parameter kinds.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::reference::ReferenceError;
use crate::identity::Coordinate;
use crate::template::TemplateError;

/// Resolved property values of one configuration, keyed by property name.
pub type Properties = BTreeMap<String, Value>;

/// A dependency of a parameter on a property of some configuration.
///
/// The coordinate may be the owning configuration itself, for parameters that
/// read sibling parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParameterReference {
  pub coordinate: Coordinate,
  pub property: String,
}

impl ParameterReference {
  pub fn new(coordinate: Coordinate, property: impl Into<String>) -> Self {
    Self {
      coordinate,
      property: property.into(),
    }
  }
}

impl fmt::Display for ParameterReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.coordinate, self.property)
  }
}

/// Errors that can occur while resolving a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
  #[error("environment variable '{name}' is not set and has no default")]
  MissingEnvironmentVariable { name: String },

  #[error("environment variable '{name}' is not valid unicode")]
  NonUnicodeEnvironmentVariable { name: String },

  #[error("invalid reference: {0}")]
  InvalidReference(#[from] ReferenceError),

  /// The referenced configuration has not been deployed in this run, either
  /// because it failed, was excluded, or is not part of the environment.
  #[error("referenced configuration {target} has no resolved value for '{property}'")]
  UnresolvedReference { target: Coordinate, property: String },

  #[error("referenced configuration {target} is skipped")]
  ReferencedSkipped { target: Coordinate },

  #[error("configuration {target} has no property '{property}'")]
  PropertyNotFound { target: Coordinate, property: String },

  #[error("list element {index}: {source}")]
  ListElement {
    index: usize,
    #[source]
    source: Box<ResolveError>,
  },

  #[error("template error: {0}")]
  Template(#[from] TemplateError),

  #[error("cannot use {kind} parameter here: {reason}")]
  Unsupported { kind: &'static str, reason: String },
}

/// Resolves properties of other configurations during deployment.
pub trait ReferenceResolver {
  /// Resolve `property` of the configuration at `target`.
  fn resolve_reference(&self, target: &Coordinate, property: &str) -> Result<Value, ResolveError>;
}

/// A resolver for contexts where no other configuration has been processed,
/// such as load-time evaluation of skip flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
  fn resolve_reference(&self, target: &Coordinate, property: &str) -> Result<Value, ResolveError> {
    Err(ResolveError::UnresolvedReference {
      target: target.clone(),
      property: property.to_string(),
    })
  }
}

/// Everything a parameter can read while it is resolved.
pub struct ResolveContext<'a> {
  /// The configuration the parameter belongs to.
  pub owner: &'a Coordinate,

  /// Parameters of the owner resolved so far.
  pub properties: &'a Properties,

  /// Access to previously processed configurations.
  pub references: &'a dyn ReferenceResolver,
}

impl<'a> ResolveContext<'a> {
  pub fn new(owner: &'a Coordinate, properties: &'a Properties, references: &'a dyn ReferenceResolver) -> Self {
    Self {
      owner,
      properties,
      references,
    }
  }
}
