//! Shared helpers for library integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use cfgdeploy_lib::client::{ListFilter, UpsertRequest};
use cfgdeploy_lib::config::TypeKind;
use cfgdeploy_lib::template::TextTemplate;
use cfgdeploy_lib::{
  CallContext, ClientError, ClientRegistry, ConfigType, Configuration, ParserRegistry, RemoteObject, ResourceClient,
};

/// A remote platform kept in memory.
#[derive(Default)]
pub struct MemoryPlatform {
  objects: Mutex<Vec<(ConfigType, RemoteObject)>>,
  upserts: Mutex<Vec<UpsertRequest>>,
  deletes: Mutex<Vec<String>>,
  rejected: Mutex<Vec<String>>,
}

impl MemoryPlatform {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn add(&self, config_type: &ConfigType, object: RemoteObject) {
    self.objects.lock().unwrap().push((config_type.clone(), object));
  }

  /// Reject upserts of configurations with this config id.
  pub fn reject(&self, config_id: &str) {
    self.rejected.lock().unwrap().push(config_id.to_string());
  }

  pub fn upserts(&self) -> Vec<UpsertRequest> {
    self.upserts.lock().unwrap().clone()
  }

  pub fn deletes(&self) -> Vec<String> {
    self.deletes.lock().unwrap().clone()
  }

  pub fn ids(&self, config_type: &ConfigType) -> Vec<String> {
    self
      .objects
      .lock()
      .unwrap()
      .iter()
      .filter(|(t, _)| t == config_type)
      .map(|(_, o)| o.id.clone())
      .collect()
  }

  /// A registry routing every kind to this platform.
  pub fn registry(self: &Arc<Self>) -> ClientRegistry {
    [
      TypeKind::ClassicApi,
      TypeKind::Settings,
      TypeKind::Bucket,
      TypeKind::Document,
      TypeKind::Segment,
      TypeKind::Slo,
      TypeKind::Automation,
    ]
    .into_iter()
    .fold(ClientRegistry::new(), |registry, kind| registry.with(kind, self.clone()))
  }
}

#[async_trait]
impl ResourceClient for MemoryPlatform {
  async fn upsert(&self, _ctx: &CallContext, request: UpsertRequest) -> Result<RemoteObject, ClientError> {
    if self.rejected.lock().unwrap().contains(&request.coordinate.config_id) {
      return Err(ClientError::Api {
        status: 400,
        message: format!("{} rejected", request.coordinate),
      });
    }

    let id = request
      .existing_id
      .clone()
      .unwrap_or_else(|| format!("{}-{}", request.coordinate.config_type, request.coordinate.config_id));

    let mut object = RemoteObject::new(&id).with_external_id(request.external_id.clone());
    object.name = request.name.clone();

    let mut objects = self.objects.lock().unwrap();
    objects.retain(|(t, o)| !(t == &request.config_type && o.id == id));
    objects.push((request.config_type.clone(), object.clone()));
    self.upserts.lock().unwrap().push(request);

    Ok(object)
  }

  async fn list(
    &self,
    _ctx: &CallContext,
    config_type: &ConfigType,
    filter: &ListFilter,
  ) -> Result<Vec<RemoteObject>, ClientError> {
    Ok(
      self
        .objects
        .lock()
        .unwrap()
        .iter()
        .filter(|(t, o)| t == config_type && filter.matches(o))
        .map(|(_, o)| o.clone())
        .collect(),
    )
  }

  async fn delete(&self, _ctx: &CallContext, config_type: &ConfigType, id: &str) -> Result<(), ClientError> {
    self.deletes.lock().unwrap().push(id.to_string());

    let mut objects = self.objects.lock().unwrap();
    let before = objects.len();
    objects.retain(|(t, o)| !(t == config_type && o.id == id));
    if objects.len() == before {
      return Err(ClientError::NotFound { id: id.to_string() });
    }
    Ok(())
  }
}

/// Build a configuration the way a loader would: raw parameter definitions
/// go through the parser registry.
pub fn load(project: &str, config_type: ConfigType, id: &str, template: &str, parameters: Value) -> Configuration {
  let registry = ParserRegistry::default();
  let raw: Map<String, Value> = match parameters {
    Value::Object(map) => map,
    Value::Null => Map::new(),
    other => panic!("parameters must be an object, got {other}"),
  };

  let mut config = Configuration::new(
    project,
    config_type,
    id,
    "prod",
    Arc::new(TextTemplate::new(format!("{id}.json"), template).unwrap()),
  );
  config.parameters = registry.parse_all(&raw).unwrap();
  config
}

pub fn classic(api: &str) -> ConfigType {
  ConfigType::ClassicApi { api: api.to_string() }
}
