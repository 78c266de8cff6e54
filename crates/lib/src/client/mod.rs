//! Remote platform access.
//!
//! The engine never talks HTTP itself. Every remote call goes through a
//! [`ResourceClient`] registered per [`TypeKind`] in a [`ClientRegistry`].

pub mod cache;
pub mod context;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::{ConfigType, TypeKind};
use crate::identity::{Coordinate, ExternalId};

pub use cache::{InventoryCache, InventoryError};
pub use context::{CallContext, CancelHandle};

/// Errors returned by remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
  #[error("object '{id}' not found")]
  NotFound { id: String },

  #[error("API error ({status}): {message}")]
  Api { status: u16, message: String },

  #[error("transport error: {0}")]
  Transport(String),

  #[error("call timed out")]
  Timeout,

  #[error("call cancelled")]
  Cancelled,

  #[error("no client registered for {0} configurations")]
  NoClient(TypeKind),
}

impl ClientError {
  /// Whether the remote object does not exist (anymore).
  pub fn is_not_found(&self) -> bool {
    matches!(self, ClientError::NotFound { .. } | ClientError::Api { status: 404, .. })
  }
}

/// An object as listed by the remote platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub external_id: Option<ExternalId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scope: Option<String>,
  /// Read-only objects (e.g. built-in ones) cannot be deleted.
  #[serde(default = "default_deletable")]
  pub deletable: bool,
}

fn default_deletable() -> bool {
  true
}

impl RemoteObject {
  pub fn new(id: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: None,
      external_id: None,
      scope: None,
      deletable: true,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_external_id(mut self, external_id: ExternalId) -> Self {
    self.external_id = Some(external_id);
    self
  }

  pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
    self.scope = Some(scope.into());
    self
  }

  pub fn read_only(mut self) -> Self {
    self.deletable = false;
    self
  }
}

/// Narrows a listing. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
  pub external_id: Option<ExternalId>,
  pub name: Option<String>,
  pub scope: Option<String>,
}

impl ListFilter {
  pub fn by_external_id(external_id: ExternalId) -> Self {
    Self {
      external_id: Some(external_id),
      ..Self::default()
    }
  }

  pub fn by_name(name: impl Into<String>) -> Self {
    Self {
      name: Some(name.into()),
      ..Self::default()
    }
  }

  pub fn in_scope(mut self, scope: Option<String>) -> Self {
    self.scope = scope;
    self
  }

  /// Apply the filter locally. Clients whose API cannot filter server-side
  /// may use this on the full listing.
  pub fn matches(&self, object: &RemoteObject) -> bool {
    fn field_matches<T: PartialEq>(wanted: &Option<T>, actual: &Option<T>) -> bool {
      wanted.is_none() || wanted == actual
    }

    field_matches(&self.external_id, &object.external_id)
      && field_matches(&self.name, &object.name)
      && field_matches(&self.scope, &object.scope)
  }
}

/// A create-or-update call for one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRequest {
  pub coordinate: Coordinate,
  pub config_type: ConfigType,
  pub external_id: ExternalId,
  /// Remote id of the object to update, if one is known.
  pub existing_id: Option<String>,
  pub name: Option<String>,
  pub scope: Option<String>,
  /// The rendered and validated template.
  pub payload: Value,
}

/// Client for one kind of remote resource.
#[async_trait]
pub trait ResourceClient: Send + Sync {
  /// Create the object, or update it when `request.existing_id` is set.
  ///
  /// Implementations embed `request.external_id` in the remote object.
  async fn upsert(&self, ctx: &CallContext, request: UpsertRequest) -> Result<RemoteObject, ClientError>;

  async fn list(
    &self,
    ctx: &CallContext,
    config_type: &ConfigType,
    filter: &ListFilter,
  ) -> Result<Vec<RemoteObject>, ClientError>;

  async fn delete(&self, ctx: &CallContext, config_type: &ConfigType, id: &str) -> Result<(), ClientError>;
}

/// Clients keyed by the kind of configuration they handle.
#[derive(Clone, Default)]
pub struct ClientRegistry {
  clients: BTreeMap<TypeKind, Arc<dyn ResourceClient>>,
}

impl std::fmt::Debug for ClientRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ClientRegistry")
      .field("kinds", &self.clients.keys().collect::<Vec<_>>())
      .finish()
  }
}

impl ClientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `client` for `kind`, replacing any previous one.
  pub fn register(&mut self, kind: TypeKind, client: Arc<dyn ResourceClient>) {
    self.clients.insert(kind, client);
  }

  pub fn with(mut self, kind: TypeKind, client: Arc<dyn ResourceClient>) -> Self {
    self.register(kind, client);
    self
  }

  pub fn get(&self, config_type: &ConfigType) -> Result<&Arc<dyn ResourceClient>, ClientError> {
    let kind = config_type.kind();
    self.clients.get(&kind).ok_or(ClientError::NoClient(kind))
  }
}
