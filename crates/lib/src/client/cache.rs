//! Read-only snapshot of remote objects, taken before a deployment starts.

use std::collections::HashMap;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error};

use super::{CallContext, ClientError, ClientRegistry, ListFilter, RemoteObject};
use crate::config::ConfigType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
  #[error("listing {config_type} objects failed: {source}")]
  List {
    config_type: ConfigType,
    #[source]
    source: ClientError,
  },

  #[error("inventory task failed: {0}")]
  Task(String),
}

/// Remote objects per configuration type.
#[derive(Debug, Clone, Default)]
pub struct InventoryCache {
  objects: HashMap<ConfigType, Vec<RemoteObject>>,
}

impl InventoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// List every type once, concurrently.
  ///
  /// Duplicate types are listed once. The first failing listing fails the
  /// whole warm-up; the remaining listings are aborted.
  pub async fn warm(
    ctx: &CallContext,
    clients: &ClientRegistry,
    types: impl IntoIterator<Item = ConfigType>,
  ) -> Result<Self, InventoryError> {
    let mut unique: Vec<ConfigType> = Vec::new();
    for config_type in types {
      if !unique.contains(&config_type) {
        unique.push(config_type);
      }
    }

    let mut join_set = JoinSet::new();

    for config_type in unique {
      let client = clients
        .get(&config_type)
        .map_err(|source| InventoryError::List {
          config_type: config_type.clone(),
          source,
        })?
        .clone();
      let ctx = ctx.clone();

      join_set.spawn(async move {
        let filter = ListFilter::default();
        let result = ctx.run(client.list(&ctx, &config_type, &filter)).await;
        (config_type, result)
      });
    }

    let mut cache = Self::new();

    while let Some(join_result) = join_set.join_next().await {
      match join_result {
        Ok((config_type, Ok(objects))) => {
          debug!(config_type = %config_type, count = objects.len(), "inventory listed");
          cache.objects.insert(config_type, objects);
        }
        Ok((config_type, Err(source))) => {
          error!(config_type = %config_type, error = %source, "inventory listing failed");
          return Err(InventoryError::List { config_type, source });
        }
        Err(e) => {
          error!(error = %e, "inventory task panicked");
          return Err(InventoryError::Task(e.to_string()));
        }
      }
    }

    Ok(cache)
  }

  pub fn insert(&mut self, config_type: ConfigType, objects: Vec<RemoteObject>) {
    self.objects.insert(config_type, objects);
  }

  /// Whether `config_type` was listed.
  pub fn contains(&self, config_type: &ConfigType) -> bool {
    self.objects.contains_key(config_type)
  }

  pub fn objects(&self, config_type: &ConfigType) -> &[RemoteObject] {
    self.objects.get(config_type).map(Vec::as_slice).unwrap_or_default()
  }

  /// Objects of `config_type` matching `filter`.
  pub fn find(&self, config_type: &ConfigType, filter: &ListFilter) -> Vec<&RemoteObject> {
    self.objects(config_type).iter().filter(|o| filter.matches(o)).collect()
  }
}
