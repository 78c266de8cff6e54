//! Deployment execution.
//!
//! This module provides the main entry points for deploying configurations:
//! - [`DeploymentPlan`] builds and sorts the dependency graph of one
//!   environment
//! - [`deploy`] walks a plan in order, resolving, rendering and upserting each
//!   configuration
//! - [`deploy_environments`] deploys independent environments concurrently
//!
//! Configurations of one environment are deployed strictly one after another,
//! in topological order.

pub mod report;
pub mod resolver;
pub mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::client::{CallContext, ClientRegistry, InventoryCache, ListFilter, RemoteObject, UpsertRequest};
use crate::config::{Configuration, ConfigType, ID_PROPERTY, NAME_PARAMETER, SCOPE_PARAMETER};
use crate::graph::{DependencyGraph, SortError, build_graph, project_order, topo_sort};
use crate::identity::{Coordinate, ExternalId};
use crate::parameter::{Properties, ResolveContext};
use crate::template::validate_json;

use report::ReportRecord;
use resolver::ResolvedEntities;

pub use report::{JsonLinesReporter, MemoryReporter, NoopReporter, Reporter};
pub use types::{DeployError, DeployOptions, DeployResult, DeployState, Outcome, Selection};

/// A sorted, ready-to-deploy environment.
#[derive(Debug)]
pub struct DeploymentPlan {
  graph: DependencyGraph,
  order: Vec<Coordinate>,
}

impl DeploymentPlan {
  /// Sort a dependency graph.
  ///
  /// # Errors
  ///
  /// Returns [`DeployError::Sort`] if the graph has a cycle.
  pub fn new(graph: DependencyGraph) -> Result<Self, DeployError> {
    let order = topo_sort(&graph)?;
    Ok(Self { graph, order })
  }

  /// Build and sort the graph of one environment.
  pub fn build(environment: impl Into<String>, configs: impl IntoIterator<Item = Configuration>) -> Result<Self, DeployError> {
    Self::new(DependencyGraph::build(environment, configs)?)
  }

  /// One plan per environment found in `configs`.
  ///
  /// An environment with a broken graph does not affect the others.
  pub fn for_environments(
    configs: impl IntoIterator<Item = Configuration>,
  ) -> BTreeMap<String, Result<Self, DeployError>> {
    build_graph(configs)
      .into_iter()
      .map(|(environment, graph)| {
        let plan = graph.map_err(DeployError::from).and_then(Self::new);
        (environment, plan)
      })
      .collect()
  }

  pub fn environment(&self) -> &str {
    self.graph.environment()
  }

  /// Coordinates in deployment order.
  pub fn order(&self) -> &[Coordinate] {
    &self.order
  }

  pub fn graph(&self) -> &DependencyGraph {
    &self.graph
  }

  /// The order in which projects can be deployed one after another.
  pub fn project_order(&self) -> Result<Vec<String>, SortError> {
    project_order(&self.graph)
  }

  /// Configurations matched by `selection`, plus everything they depend on.
  pub fn selected(&self, selection: &Selection) -> BTreeSet<Coordinate> {
    if selection.is_all() {
      return self.order.iter().cloned().collect();
    }

    let roots: Vec<&Coordinate> = self.order.iter().filter(|c| selection.matches(c)).collect();
    self.graph.transitive_dependencies(roots)
  }
}

/// Deploy one environment.
///
/// Every processed configuration gets one [`Outcome`], which is also handed to
/// `reporter`. Unless `options.continue_on_error` or `options.dry_run` is
/// set, the first error stops the deployment and marks the result as aborted.
///
/// # Errors
///
/// Only environment-wide failures are returned as errors, i.e. when the
/// remote inventory cannot be listed. Per-configuration failures are
/// recorded as [`DeployState::Error`] outcomes.
pub async fn deploy(
  plan: &DeploymentPlan,
  clients: &ClientRegistry,
  reporter: &dyn Reporter,
  options: &DeployOptions,
  ctx: &CallContext,
) -> Result<DeployResult, DeployError> {
  let environment = plan.environment();
  info!(
    environment = %environment,
    configs = plan.order().len(),
    dry_run = options.dry_run,
    "starting deployment"
  );

  let ctx = match options.call_timeout() {
    Some(timeout) => ctx.clone().with_timeout(timeout),
    None => ctx.clone(),
  };

  let selected = plan.selected(&options.selection);

  let inventory = if options.dry_run {
    InventoryCache::new()
  } else {
    let types: Vec<ConfigType> = plan
      .graph()
      .configs()
      .filter(|c| selected.contains(&c.coordinate) && !c.skip && c.origin_object_id.is_none())
      .filter(|c| c.config_type.is_deployable() && clients.get(&c.config_type).is_ok())
      .map(|c| c.config_type.clone())
      .collect();
    InventoryCache::warm(&ctx, clients, types).await?
  };

  let mut entities = ResolvedEntities::new();
  let mut result = DeployResult::new(environment);

  for coordinate in plan.order() {
    let Some(config) = plan.graph().config(coordinate) else {
      continue;
    };

    let outcome = if !selected.contains(coordinate) {
      debug!(environment = %environment, coordinate = %coordinate, "excluded by selection");
      Outcome::excluded(coordinate.clone())
    } else if config.skip {
      info!(environment = %environment, coordinate = %coordinate, "skipped");
      entities.insert_skipped(coordinate.clone());
      Outcome::skipped(coordinate.clone())
    } else {
      match deploy_config(config, clients, &inventory, &entities, options.dry_run, &ctx).await {
        Ok(deployed) => {
          info!(
            environment = %environment,
            coordinate = %coordinate,
            remote_id = deployed.remote_id.as_deref().unwrap_or("-"),
            "deployed"
          );
          entities.insert(coordinate.clone(), deployed.properties);
          Outcome::success(coordinate.clone(), deployed.remote_id).with_details(deployed.details)
        }
        Err(e) => {
          error!(environment = %environment, coordinate = %coordinate, error = %e, "deployment failed");
          Outcome::failed(coordinate.clone(), e)
        }
      }
    };

    reporter.report(ReportRecord::from_outcome(environment, &outcome, options.dry_run));

    let failed = outcome.state == DeployState::Error;
    result.outcomes.push(outcome);

    if failed && !options.continue_on_error && !options.dry_run {
      warn!(environment = %environment, coordinate = %coordinate, "stopping after first error");
      result.aborted = true;
      break;
    }
  }

  info!(
    environment = %environment,
    succeeded = result.count(DeployState::Success),
    failed = result.error_count(),
    skipped = result.count(DeployState::Skipped),
    excluded = result.count(DeployState::Excluded),
    aborted = result.aborted,
    "deployment complete"
  );

  Ok(result)
}

/// Deploy several environments concurrently.
///
/// Environments share no state, so a failure in one never affects another.
pub async fn deploy_environments(
  plans: Vec<DeploymentPlan>,
  clients: &ClientRegistry,
  reporter: Arc<dyn Reporter>,
  options: &DeployOptions,
  ctx: &CallContext,
) -> BTreeMap<String, Result<DeployResult, DeployError>> {
  let mut results = BTreeMap::new();
  let mut join_set = JoinSet::new();

  for plan in plans {
    let environment = plan.environment().to_string();
    results.insert(
      environment.clone(),
      Err(DeployError::Task(format!("deployment of '{environment}' did not complete"))),
    );

    let clients = clients.clone();
    let reporter = reporter.clone();
    let options = options.clone();
    let ctx = ctx.clone();

    join_set.spawn(async move {
      let result = deploy(&plan, &clients, reporter.as_ref(), &options, &ctx).await;
      (environment, result)
    });
  }

  while let Some(join_result) = join_set.join_next().await {
    match join_result {
      Ok((environment, result)) => {
        results.insert(environment, result);
      }
      Err(e) => {
        error!(error = %e, "deployment task panicked");
      }
    }
  }

  results
}

/// A successfully processed configuration.
struct Deployed {
  remote_id: Option<String>,

  /// Properties later configurations can reference.
  properties: Properties,

  details: Value,
}

/// Deploy a single configuration.
async fn deploy_config(
  config: &Configuration,
  clients: &ClientRegistry,
  inventory: &InventoryCache,
  entities: &ResolvedEntities,
  dry_run: bool,
  ctx: &CallContext,
) -> Result<Deployed, DeployError> {
  let mut properties = resolve_parameters(config, entities)?;

  if let ConfigType::Entity { .. } = config.config_type {
    let id = config.origin_object_id.clone().ok_or_else(|| DeployError::MissingOriginId {
      coordinate: config.coordinate.clone(),
    })?;
    properties.insert(ID_PROPERTY.to_string(), Value::String(id.clone()));
    return Ok(Deployed {
      details: json!({ "originObjectId": id }),
      remote_id: Some(id),
      properties,
    });
  }

  let payload = render(config, &properties)?;
  let external_id = config.external_id();
  let name = string_property(&properties, NAME_PARAMETER);
  let scope = string_property(&properties, SCOPE_PARAMETER);

  if dry_run {
    // Dependents still need an id to render against.
    let id = config
      .origin_object_id
      .clone()
      .unwrap_or_else(|| external_id.to_string());
    debug!(coordinate = %config.coordinate, "dry run, not calling the remote platform");
    properties.insert(ID_PROPERTY.to_string(), Value::String(id.clone()));
    return Ok(Deployed {
      remote_id: None,
      properties,
      details: json!({ "externalId": external_id.to_string(), "placeholderId": id }),
    });
  }

  let client = clients.get(&config.config_type).map_err(|source| DeployError::Client {
    coordinate: config.coordinate.clone(),
    source,
  })?;

  let existing_id = existing_id(config, inventory, &external_id, name.as_deref(), scope.as_deref())?;
  debug!(
    coordinate = %config.coordinate,
    external_id = %external_id,
    existing_id = existing_id.as_deref().unwrap_or("-"),
    "upserting"
  );

  let details = json!({
    "externalId": external_id.to_string(),
    "existingId": existing_id,
    "updated": existing_id.is_some(),
  });

  let request = UpsertRequest {
    coordinate: config.coordinate.clone(),
    config_type: config.config_type.clone(),
    external_id,
    existing_id,
    name,
    scope,
    payload,
  };

  let object = ctx
    .run(client.upsert(ctx, request))
    .await
    .map_err(|source| DeployError::Client {
      coordinate: config.coordinate.clone(),
      source,
    })?;

  properties.insert(ID_PROPERTY.to_string(), Value::String(object.id.clone()));
  if let Some(remote_name) = &object.name {
    properties
      .entry(NAME_PARAMETER.to_string())
      .or_insert_with(|| Value::String(remote_name.clone()));
  }

  Ok(Deployed {
    remote_id: Some(object.id),
    properties,
    details,
  })
}

/// Resolve all parameters, siblings first.
fn resolve_parameters(config: &Configuration, entities: &ResolvedEntities) -> Result<Properties, DeployError> {
  let mut properties = Properties::new();

  for name in config.parameter_order()? {
    let Some(parameter) = config.parameters.get(&name) else {
      continue;
    };

    let value = parameter
      .resolve(&ResolveContext::new(&config.coordinate, &properties, entities))
      .map_err(|source| DeployError::Resolve {
        coordinate: config.coordinate.clone(),
        parameter: name.clone(),
        source,
      })?;
    properties.insert(name, value);
  }

  Ok(properties)
}

fn render(config: &Configuration, properties: &Properties) -> Result<Value, DeployError> {
  let to_error = |source| DeployError::Render {
    coordinate: config.coordinate.clone(),
    source,
  };

  let rendered = config.template.render(properties).map_err(to_error)?;
  validate_json(config.template.id(), &rendered).map_err(to_error)
}

fn string_property(properties: &Properties, name: &str) -> Option<String> {
  properties.get(name).and_then(Value::as_str).map(str::to_string)
}

/// The remote id to update, if the object already exists.
///
/// A known origin id wins. Otherwise the inventory is searched by external id
/// and, for name-addressed types, by name.
fn existing_id(
  config: &Configuration,
  inventory: &InventoryCache,
  external_id: &ExternalId,
  name: Option<&str>,
  scope: Option<&str>,
) -> Result<Option<String>, DeployError> {
  if let Some(id) = &config.origin_object_id {
    return Ok(Some(id.clone()));
  }

  let by_external_id = inventory.find(&config.config_type, &ListFilter::by_external_id(external_id.clone()));
  if let Some(id) = single_match(&config.coordinate, &by_external_id)? {
    return Ok(Some(id));
  }

  if config.config_type.is_name_addressed()
    && let Some(name) = name
  {
    let filter = ListFilter::by_name(name).in_scope(scope.map(str::to_string));
    return single_match(&config.coordinate, &inventory.find(&config.config_type, &filter));
  }

  Ok(None)
}

fn single_match(coordinate: &Coordinate, matches: &[&RemoteObject]) -> Result<Option<String>, DeployError> {
  match matches {
    [] => Ok(None),
    [object] => Ok(Some(object.id.clone())),
    many => Err(DeployError::AmbiguousExisting {
      coordinate: coordinate.clone(),
      candidates: many.iter().map(|o| o.id.clone()).collect(),
    }),
  }
}
