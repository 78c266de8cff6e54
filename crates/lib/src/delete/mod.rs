//! Deletion of deployed configurations.
//!
//! A [`DeletePointer`] names a configuration that should no longer exist
//! remotely. When its remote id is not known, the remote object is looked up
//! by external id, or by name for name-addressed (classic) types. A pointer
//! matching several objects is never deleted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::client::{CallContext, ClientError, ClientRegistry, ListFilter, ResourceClient};
use crate::config::{ConfigType, TypeKind};
use crate::identity::{Coordinate, ExternalId};

/// Identifies a remote object to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePointer {
  pub project: String,
  #[serde(rename = "type")]
  pub config_type: ConfigType,
  /// A name for name-addressed types, a config id otherwise.
  pub identifier: String,
  /// Parent entity the object lives under, if any.
  #[serde(default)]
  pub scope: Option<String>,
  #[serde(default)]
  pub origin_object_id: Option<String>,
}

impl DeletePointer {
  pub fn new(project: impl Into<String>, config_type: ConfigType, identifier: impl Into<String>) -> Self {
    Self {
      project: project.into(),
      config_type,
      identifier: identifier.into(),
      scope: None,
      origin_object_id: None,
    }
  }

  pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
    self.scope = Some(scope.into());
    self
  }

  pub fn with_origin_object_id(mut self, id: impl Into<String>) -> Self {
    self.origin_object_id = Some(id.into());
    self
  }

  /// The coordinate the object was deployed from.
  pub fn coordinate(&self) -> Coordinate {
    Coordinate::new(&self.project, self.config_type.id(), &self.identifier)
  }

  pub fn external_id(&self) -> ExternalId {
    self.config_type.external_id(&self.coordinate())
  }
}

impl fmt::Display for DeletePointer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.project, self.config_type.id(), self.identifier)?;
    if let Some(scope) = &self.scope {
      write!(f, " (scope {scope})")?;
    }
    Ok(())
  }
}

/// Errors for a single pointer or listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteError {
  #[error("{pointer}: {} remote objects match, refusing to delete: {}", .candidates.len(), .candidates.join(", "))]
  AmbiguousMatch {
    pointer: DeletePointer,
    candidates: Vec<String>,
  },

  #[error("{pointer}: lookup failed: {source}")]
  Lookup {
    pointer: DeletePointer,
    #[source]
    source: ClientError,
  },

  #[error("{pointer}: deleting '{id}' failed: {source}")]
  Delete {
    pointer: DeletePointer,
    id: String,
    #[source]
    source: ClientError,
  },

  #[error("listing {config_type} objects failed: {source}")]
  List {
    config_type: ConfigType,
    #[source]
    source: ClientError,
  },

  #[error("deleting {config_type} object '{id}' failed: {source}")]
  Purge {
    config_type: ConfigType,
    id: String,
    #[source]
    source: ClientError,
  },
}

/// Result of a batch of deletions. A batch always runs to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
  /// Remote ids that were deleted.
  pub deleted: Vec<String>,

  /// Pointers without a remote object, and objects that were already gone.
  pub not_found: usize,

  /// Read-only objects left in place by [`delete_all`].
  pub skipped: usize,

  pub errors: Vec<DeleteError>,
}

impl DeleteSummary {
  pub fn is_success(&self) -> bool {
    self.errors.is_empty()
  }

  pub fn failure_count(&self) -> usize {
    self.errors.len()
  }

  fn record(&mut self, result: Result<Deletion, DeleteError>) {
    match result {
      Ok(Deletion::Deleted(id)) => self.deleted.push(id),
      Ok(Deletion::NotFound) => self.not_found += 1,
      Err(e) => self.errors.push(e),
    }
  }
}

/// What happened to one pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deletion {
  Deleted(String),
  NotFound,
}

/// Delete the objects named by `pointers`.
///
/// Pointers are grouped by type; the pointers of one type are processed one
/// after another, and types in a fixed order.
pub async fn reconcile(ctx: &CallContext, clients: &ClientRegistry, pointers: &[DeletePointer]) -> DeleteSummary {
  let mut by_type: BTreeMap<(TypeKind, &str), Vec<&DeletePointer>> = BTreeMap::new();
  for pointer in pointers {
    by_type
      .entry((pointer.config_type.kind(), pointer.config_type.id()))
      .or_default()
      .push(pointer);
  }

  let mut summary = DeleteSummary::default();

  for ((kind, type_id), pointers) in by_type {
    debug!(kind = %kind, config_type = type_id, pointers = pointers.len(), "deleting");

    for pointer in pointers {
      let result = match clients.get(&pointer.config_type) {
        Ok(client) => delete_pointer(ctx, client.as_ref(), pointer).await,
        Err(source) => Err(DeleteError::Lookup {
          pointer: pointer.clone(),
          source,
        }),
      };

      if let Err(e) = &result {
        error!(pointer = %pointer, error = %e, "delete failed");
      }
      summary.record(result);
    }
  }

  info!(
    deleted = summary.deleted.len(),
    not_found = summary.not_found,
    failed = summary.failure_count(),
    "deletion complete"
  );

  summary
}

/// Delete the object named by one pointer.
///
/// # Errors
///
/// Returns [`DeleteError::AmbiguousMatch`] without deleting anything when the
/// pointer matches several remote objects. Not-found answers are not errors.
pub async fn delete_pointer(
  ctx: &CallContext,
  client: &dyn ResourceClient,
  pointer: &DeletePointer,
) -> Result<Deletion, DeleteError> {
  let Some(id) = find_remote_id(ctx, client, pointer).await? else {
    debug!(pointer = %pointer, "no remote object, nothing to delete");
    return Ok(Deletion::NotFound);
  };

  match ctx.run(client.delete(ctx, &pointer.config_type, &id)).await {
    Ok(()) => {
      info!(pointer = %pointer, id = %id, "deleted");
      Ok(Deletion::Deleted(id))
    }
    Err(e) if e.is_not_found() => {
      debug!(pointer = %pointer, id = %id, "already gone");
      Ok(Deletion::NotFound)
    }
    Err(source) => Err(DeleteError::Delete {
      pointer: pointer.clone(),
      id,
      source,
    }),
  }
}

/// Find the remote id a pointer refers to.
async fn find_remote_id(
  ctx: &CallContext,
  client: &dyn ResourceClient,
  pointer: &DeletePointer,
) -> Result<Option<String>, DeleteError> {
  if let Some(id) = &pointer.origin_object_id {
    return Ok(Some(id.clone()));
  }

  let name_addressed = pointer.config_type.is_name_addressed();
  let filter = if name_addressed {
    ListFilter::by_name(&pointer.identifier)
  } else {
    ListFilter::by_external_id(pointer.external_id())
  }
  .in_scope(pointer.scope.clone());

  let matches = ctx
    .run(client.list(ctx, &pointer.config_type, &filter))
    .await
    .map_err(|source| DeleteError::Lookup {
      pointer: pointer.clone(),
      source,
    })?;

  match matches.as_slice() {
    // Classic pointers may carry the remote id instead of a name.
    [] if name_addressed => Ok(Some(pointer.identifier.clone())),
    [] => Ok(None),
    [object] => Ok(Some(object.id.clone())),
    many => {
      let candidates: Vec<String> = many.iter().map(|o| o.id.clone()).collect();
      warn!(pointer = %pointer, candidates = ?candidates, "several remote objects match");
      Err(DeleteError::AmbiguousMatch {
        pointer: pointer.clone(),
        candidates,
      })
    }
  }
}

/// Delete every deletable remote object of `config_type`.
pub async fn delete_all(ctx: &CallContext, clients: &ClientRegistry, config_type: &ConfigType) -> DeleteSummary {
  let mut summary = DeleteSummary::default();

  let client = match clients.get(config_type) {
    Ok(client) => client,
    Err(source) => {
      summary.errors.push(DeleteError::List {
        config_type: config_type.clone(),
        source,
      });
      return summary;
    }
  };

  let filter = ListFilter::default();
  let objects = match ctx.run(client.list(ctx, config_type, &filter)).await {
    Ok(objects) => objects,
    Err(source) => {
      error!(config_type = %config_type, error = %source, "listing failed");
      summary.errors.push(DeleteError::List {
        config_type: config_type.clone(),
        source,
      });
      return summary;
    }
  };

  info!(config_type = %config_type, objects = objects.len(), "deleting all objects");

  for object in objects {
    if !object.deletable {
      debug!(config_type = %config_type, id = %object.id, "read-only, skipped");
      summary.skipped += 1;
      continue;
    }

    match ctx.run(client.delete(ctx, config_type, &object.id)).await {
      Ok(()) => summary.deleted.push(object.id),
      Err(e) if e.is_not_found() => summary.not_found += 1,
      Err(source) => {
        error!(config_type = %config_type, id = %object.id, error = %source, "delete failed");
        summary.errors.push(DeleteError::Purge {
          config_type: config_type.clone(),
          id: object.id,
          source,
        });
      }
    }
  }

  summary
}
