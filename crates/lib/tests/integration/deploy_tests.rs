//! End-to-end deployment: raw definitions through parsing, graph building,
//! sorting and deployment.

use serde_json::json;

use cfgdeploy_lib::deploy::{MemoryReporter, NoopReporter};
use cfgdeploy_lib::graph::GraphError;
use cfgdeploy_lib::parameter::ParseError;
use cfgdeploy_lib::{
  CallContext, ConfigType, Coordinate, DeployOptions, DeployState, DeploymentPlan, ExternalId, ParserRegistry, deploy,
};

use super::common::{MemoryPlatform, classic, load};

#[tokio::test]
async fn zone_reference_scenario() {
  let platform = MemoryPlatform::new();
  let configs = vec![
    load(
      "infra",
      classic("dashboard"),
      "overview",
      r#"{"dashboardMetadata": {"name": "{{ .name }}", "zone": "{{ .zoneId }}"}}"#,
      json!({
        "name": "Overview",
        "zoneId": ["management-zone", "main", "id"],
      }),
    ),
    load(
      "infra",
      classic("management-zone"),
      "main",
      r#"{"name": "{{ .name }}"}"#,
      json!({"name": "Main zone"}),
    ),
  ];

  let plan = DeploymentPlan::build("prod", configs).unwrap();
  let overview = Coordinate::new("infra", "dashboard", "overview");
  let main = Coordinate::new("infra", "management-zone", "main");

  assert_eq!(plan.graph().edges(), vec![(overview.clone(), main.clone())]);
  assert_eq!(plan.order(), &[main.clone(), overview.clone()]);

  let reporter = MemoryReporter::new();
  let result = deploy(
    &plan,
    &platform.registry(),
    &reporter,
    &DeployOptions::default(),
    &CallContext::background(),
  )
  .await
  .unwrap();

  assert!(result.is_success());
  let upserts = platform.upserts();
  assert_eq!(
    upserts[1].payload,
    json!({"dashboardMetadata": {"name": "Overview", "zone": "management-zone-main"}})
  );
  assert_eq!(upserts[1].external_id, ExternalId::for_coordinate(&overview));
  assert_eq!(reporter.records().len(), 2);
}

#[tokio::test]
async fn continue_on_error_keeps_independent_configs() {
  let platform = MemoryPlatform::new();
  platform.reject("a");

  let configs = vec![
    load("p", classic("alerting-profile"), "a", "{}", json!(null)),
    load(
      "p",
      classic("alerting-profile"),
      "b",
      r#"{"parent": "{{ .parent }}"}"#,
      json!({"parent": ["a", "id"]}),
    ),
    load("p", classic("alerting-profile"), "c", "{}", json!(null)),
  ];
  let plan = DeploymentPlan::build("prod", configs).unwrap();

  let options = DeployOptions {
    continue_on_error: true,
    ..DeployOptions::default()
  };
  let result = deploy(&plan, &platform.registry(), &NoopReporter, &options, &CallContext::background())
    .await
    .unwrap();

  let state = |id: &str| result.state(&Coordinate::new("p", "alerting-profile", id));
  assert_eq!(state("a"), Some(DeployState::Error));
  assert_eq!(state("b"), Some(DeployState::Error));
  assert_eq!(state("c"), Some(DeployState::Success));
}

#[tokio::test]
async fn redeploy_updates_in_place() {
  let platform = MemoryPlatform::new();
  let config = || {
    load(
      "apps",
      ConfigType::Settings {
        schema_id: "builtin:alerting.profile".into(),
        schema_version: None,
      },
      "team",
      r#"{"name": "{{ .name }}"}"#,
      json!({"name": "Team"}),
    )
  };

  for _ in 0..2 {
    let plan = DeploymentPlan::build("prod", vec![config()]).unwrap();
    let result = deploy(
      &plan,
      &platform.registry(),
      &NoopReporter,
      &DeployOptions::default(),
      &CallContext::background(),
    )
    .await
    .unwrap();
    assert!(result.is_success());
  }

  let upserts = platform.upserts();
  assert_eq!(upserts[0].existing_id, None);
  assert_eq!(upserts[1].existing_id.as_deref(), Some("builtin:alerting.profile-team"));
  assert_eq!(
    platform.ids(&ConfigType::Settings {
      schema_id: "builtin:alerting.profile".into(),
      schema_version: None,
    }),
    vec!["builtin:alerting.profile-team"]
  );
}

#[test]
fn invalid_reference_fails_at_load_time() {
  let registry = ParserRegistry::default();
  let err = registry
    .parse(
      "zone",
      &json!({"type": "reference", "project": "infra", "configId": "main", "property": "id"}),
    )
    .unwrap_err();
  assert!(matches!(err, ParseError::InvalidReference { .. }));
}

#[test]
fn three_part_reference_uses_owner_project() {
  let config = load(
    "infra",
    classic("dashboard"),
    "overview",
    "{}",
    json!({"zoneId": ["management-zone", "main", "id"]}),
  );
  let refs = config.parameters["zoneId"].references(&config.coordinate).unwrap();
  assert_eq!(refs[0].coordinate, Coordinate::new("infra", "management-zone", "main"));
}

#[test]
fn unknown_target_fails_graph_build() {
  let configs = vec![load(
    "infra",
    classic("dashboard"),
    "overview",
    "{}",
    json!({"zoneId": ["management-zone", "missing", "id"]}),
  )];
  assert!(matches!(
    DeploymentPlan::build("prod", configs),
    Err(cfgdeploy_lib::deploy::DeployError::Graph(GraphError::UnresolvedReference { .. }))
  ));
}

#[test]
fn order_is_stable_across_runs() {
  let configs = || {
    vec![
      load("p", classic("t"), "d", "{}", json!({"b": ["b", "id"], "c": ["c", "id"]})),
      load("p", classic("t"), "c", "{}", json!({"a": ["a", "id"]})),
      load("p", classic("t"), "b", "{}", json!({"a": ["a", "id"]})),
      load("p", classic("t"), "a", "{}", json!(null)),
    ]
  };

  let first = DeploymentPlan::build("prod", configs()).unwrap().order().to_vec();
  let ids: Vec<&str> = first.iter().map(|c| c.config_id.as_str()).collect();
  assert_eq!(ids, vec!["a", "b", "c", "d"]);

  for _ in 0..5 {
    assert_eq!(DeploymentPlan::build("prod", configs()).unwrap().order(), first.as_slice());
  }
}
