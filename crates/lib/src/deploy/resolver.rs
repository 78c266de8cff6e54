//! Reference resolver for deployment.
//!
//! Records the properties of every configuration processed so far in an
//! environment. Later configurations read them through
//! [`ReferenceResolver`].

use std::collections::HashMap;

use serde_json::Value;

use crate::identity::Coordinate;
use crate::parameter::{Properties, ReferenceResolver, ResolveError};

/// A configuration that has been processed.
#[derive(Debug, Clone, PartialEq)]
enum Entity {
  Deployed(Properties),
  Skipped,
}

/// Properties of the configurations processed so far.
///
/// Configurations that failed, were excluded, or have not been reached are
/// absent, so references to them fail with
/// [`ResolveError::UnresolvedReference`].
#[derive(Debug, Clone, Default)]
pub struct ResolvedEntities {
  entities: HashMap<Coordinate, Entity>,
}

impl ResolvedEntities {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a deployed configuration with its resolved parameters plus `id`
  /// and `name`.
  pub fn insert(&mut self, coordinate: Coordinate, properties: Properties) {
    self.entities.insert(coordinate, Entity::Deployed(properties));
  }

  pub fn insert_skipped(&mut self, coordinate: Coordinate) {
    self.entities.insert(coordinate, Entity::Skipped);
  }

}

impl ReferenceResolver for ResolvedEntities {
  fn resolve_reference(&self, target: &Coordinate, property: &str) -> Result<Value, ResolveError> {
    match self.entities.get(target) {
      Some(Entity::Deployed(properties)) => {
        properties
          .get(property)
          .cloned()
          .ok_or_else(|| ResolveError::PropertyNotFound {
            target: target.clone(),
            property: property.to_string(),
          })
      }
      Some(Entity::Skipped) => Err(ResolveError::ReferencedSkipped { target: target.clone() }),
      None => Err(ResolveError::UnresolvedReference {
        target: target.clone(),
        property: property.to_string(),
      }),
    }
  }
}
