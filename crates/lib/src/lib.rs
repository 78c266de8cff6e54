//! cfgdeploy-lib: configuration identity and dependency resolution.
//!
//! This crate provides the engine behind `cfgdeploy`:
//! - `Parameter`: lazily resolved values (literals, environment variables,
//!   lists, references, compound formats)
//! - `Coordinate` / `ExternalId`: stable identity of a configuration
//! - `DependencyGraph`: references between configurations, per environment
//! - `deploy`: ordered deployment through injected clients
//! - `reconcile` / `delete_all`: deletion by id, external id, or name

pub mod client;
pub mod config;
pub mod delete;
pub mod deploy;
pub mod graph;
pub mod identity;
pub mod parameter;
pub mod template;
pub mod util;

pub use client::{CallContext, ClientError, ClientRegistry, RemoteObject, ResourceClient};
pub use config::{ConfigType, Configuration};
pub use delete::{DeletePointer, DeleteSummary, delete_all, reconcile};
pub use deploy::{DeployOptions, DeployResult, DeployState, DeploymentPlan, deploy, deploy_environments};
pub use graph::{DependencyGraph, build_graph, topo_sort};
pub use identity::{Coordinate, ExternalId};
pub use parameter::{Parameter, ParserRegistry};
