//! Test helpers for cfgdeploy-lib.
//!
//! Provides configuration builders and an in-memory [`FakeClient`] standing in
//! for the remote platform.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{CallContext, ClientError, ListFilter, RemoteObject, ResourceClient, UpsertRequest};
use crate::config::{ConfigType, Configuration};
use crate::parameter::{Parameter, ReferenceParameter};
use crate::template::{Template, TextTemplate};

pub fn template(content: &str) -> Arc<dyn Template> {
  Arc::new(TextTemplate::new("test.json", content).unwrap())
}

/// A classic API configuration in environment `prod` with an empty JSON body.
pub fn classic(project: &str, api: &str, id: &str) -> Configuration {
  Configuration::new(
    project,
    ConfigType::ClassicApi { api: api.to_string() },
    id,
    "prod",
    template("{}"),
  )
}

pub fn reference(parts: &[&str]) -> Parameter {
  Parameter::Reference(ReferenceParameter::from_short_form(parts).unwrap())
}

#[derive(Default)]
struct FakeState {
  objects: HashMap<ConfigType, Vec<RemoteObject>>,
  upserts: Vec<UpsertRequest>,
  deleted: Vec<String>,
  list_calls: usize,
  failing_upserts: HashMap<String, ClientError>,
  failing_lists: HashMap<ConfigType, ClientError>,
  failing_deletes: HashMap<String, ClientError>,
  missing_on_delete: HashSet<String>,
}

/// In-memory remote platform.
///
/// Created objects get the id `remote-<config id>`.
#[derive(Default)]
pub struct FakeClient {
  state: Mutex<FakeState>,
}

impl FakeClient {
  pub fn new() -> Self {
    Self::default()
  }

  fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
    self.state.lock().unwrap()
  }

  pub fn seed(&self, config_type: &ConfigType, object: RemoteObject) {
    self.state().objects.entry(config_type.clone()).or_default().push(object);
  }

  /// Fail upserts of the configuration with this config id.
  pub fn fail_upsert(&self, config_id: &str, err: ClientError) {
    self.state().failing_upserts.insert(config_id.to_string(), err);
  }

  pub fn fail_list(&self, config_type: &ConfigType, err: ClientError) {
    self.state().failing_lists.insert(config_type.clone(), err);
  }

  pub fn fail_delete(&self, id: &str, err: ClientError) {
    self.state().failing_deletes.insert(id.to_string(), err);
  }

  /// Report not-found when `id` is deleted, as if someone else removed it.
  pub fn vanish_on_delete(&self, id: &str) {
    self.state().missing_on_delete.insert(id.to_string());
  }

  pub fn upserts(&self) -> Vec<UpsertRequest> {
    self.state().upserts.clone()
  }

  pub fn deleted(&self) -> Vec<String> {
    self.state().deleted.clone()
  }

  pub fn list_calls(&self) -> usize {
    self.state().list_calls
  }

  pub fn objects(&self, config_type: &ConfigType) -> Vec<RemoteObject> {
    self.state().objects.get(config_type).cloned().unwrap_or_default()
  }
}

#[async_trait]
impl ResourceClient for FakeClient {
  async fn upsert(&self, _ctx: &CallContext, request: UpsertRequest) -> Result<RemoteObject, ClientError> {
    let mut state = self.state();
    if let Some(err) = state.failing_upserts.get(&request.coordinate.config_id) {
      return Err(err.clone());
    }

    let id = request
      .existing_id
      .clone()
      .unwrap_or_else(|| format!("remote-{}", request.coordinate.config_id));
    let mut object = RemoteObject::new(id.clone()).with_external_id(request.external_id.clone());
    object.name = request.name.clone();
    object.scope = request.scope.clone();

    let objects = state.objects.entry(request.config_type.clone()).or_default();
    objects.retain(|o| o.id != id);
    objects.push(object.clone());
    state.upserts.push(request);

    Ok(object)
  }

  async fn list(
    &self,
    _ctx: &CallContext,
    config_type: &ConfigType,
    filter: &ListFilter,
  ) -> Result<Vec<RemoteObject>, ClientError> {
    let mut state = self.state();
    state.list_calls += 1;
    if let Some(err) = state.failing_lists.get(config_type) {
      return Err(err.clone());
    }

    Ok(
      state
        .objects
        .get(config_type)
        .map(|objects| objects.iter().filter(|o| filter.matches(o)).cloned().collect())
        .unwrap_or_default(),
    )
  }

  async fn delete(&self, _ctx: &CallContext, config_type: &ConfigType, id: &str) -> Result<(), ClientError> {
    let mut state = self.state();
    state.deleted.push(id.to_string());

    if let Some(err) = state.failing_deletes.get(id) {
      return Err(err.clone());
    }
    if state.missing_on_delete.contains(id) {
      return Err(ClientError::NotFound { id: id.to_string() });
    }

    let objects = state.objects.entry(config_type.clone()).or_default();
    let before = objects.len();
    objects.retain(|o| o.id != id);
    if objects.len() == before {
      return Err(ClientError::NotFound { id: id.to_string() });
    }
    Ok(())
  }
}
