//! Deploy-then-delete round trips: objects created by a deployment are found
//! again through their external id.

use serde_json::json;

use cfgdeploy_lib::delete::DeleteError;
use cfgdeploy_lib::deploy::NoopReporter;
use cfgdeploy_lib::{
  CallContext, ConfigType, DeletePointer, DeployOptions, DeploymentPlan, RemoteObject, delete_all, deploy, reconcile,
};

use super::common::{MemoryPlatform, classic, load};

#[tokio::test]
async fn deployed_objects_are_deleted_by_external_id() {
  let platform = MemoryPlatform::new();
  let plan = DeploymentPlan::build(
    "prod",
    vec![
      load("obs", ConfigType::Segment, "errors", "{}", json!(null)),
      load("obs", ConfigType::Segment, "latency", "{}", json!(null)),
    ],
  )
  .unwrap();
  deploy(
    &plan,
    &platform.registry(),
    &NoopReporter,
    &DeployOptions::default(),
    &CallContext::background(),
  )
  .await
  .unwrap();
  assert_eq!(platform.ids(&ConfigType::Segment).len(), 2);

  let summary = reconcile(
    &CallContext::background(),
    &platform.registry(),
    &[DeletePointer::new("obs", ConfigType::Segment, "errors")],
  )
  .await;

  assert!(summary.is_success());
  assert_eq!(summary.deleted, vec!["segment-errors"]);
  assert_eq!(platform.ids(&ConfigType::Segment), vec!["segment-latency"]);
}

#[tokio::test]
async fn pointer_for_other_project_matches_nothing() {
  let platform = MemoryPlatform::new();
  let plan = DeploymentPlan::build("prod", vec![load("obs", ConfigType::Slo, "availability", "{}", json!(null))]).unwrap();
  deploy(
    &plan,
    &platform.registry(),
    &NoopReporter,
    &DeployOptions::default(),
    &CallContext::background(),
  )
  .await
  .unwrap();

  let summary = reconcile(
    &CallContext::background(),
    &platform.registry(),
    &[DeletePointer::new("other", ConfigType::Slo, "availability")],
  )
  .await;

  assert!(summary.is_success());
  assert_eq!(summary.not_found, 1);
  assert!(platform.deletes().is_empty());
}

#[tokio::test]
async fn duplicate_names_are_never_deleted() {
  let platform = MemoryPlatform::new();
  let dashboards = classic("dashboard");
  platform.add(&dashboards, RemoteObject::new("d-1").with_name("Overview"));
  platform.add(&dashboards, RemoteObject::new("d-2").with_name("Overview"));

  let summary = reconcile(
    &CallContext::background(),
    &platform.registry(),
    &[DeletePointer::new("infra", dashboards.clone(), "Overview")],
  )
  .await;

  assert_eq!(summary.failure_count(), 1);
  assert!(matches!(
    &summary.errors[0],
    DeleteError::AmbiguousMatch { candidates, .. } if candidates == &["d-1", "d-2"]
  ));
  assert!(platform.deletes().is_empty());
  assert_eq!(platform.ids(&dashboards).len(), 2);
}

#[tokio::test]
async fn already_deleted_objects_count_as_success() {
  let platform = MemoryPlatform::new();
  let pointer = DeletePointer::new("obs", ConfigType::Segment, "errors").with_origin_object_id("gone-1");

  let summary = reconcile(&CallContext::background(), &platform.registry(), &[pointer]).await;

  assert!(summary.is_success());
  assert_eq!(summary.not_found, 1);
  assert_eq!(platform.deletes(), vec!["gone-1"]);
}

#[tokio::test]
async fn delete_all_purges_a_type() {
  let platform = MemoryPlatform::new();
  platform.add(&ConfigType::Bucket, RemoteObject::new("logs"));
  platform.add(&ConfigType::Bucket, RemoteObject::new("default_logs").read_only());
  platform.add(&ConfigType::Slo, RemoteObject::new("untouched"));

  let summary = delete_all(&CallContext::background(), &platform.registry(), &ConfigType::Bucket).await;

  assert!(summary.is_success());
  assert_eq!(summary.deleted, vec!["logs"]);
  assert_eq!(summary.skipped, 1);
  assert_eq!(platform.ids(&ConfigType::Bucket), vec!["default_logs"]);
  assert_eq!(platform.ids(&ConfigType::Slo), vec!["untouched"]);
}
