//! Implementation of the `cfgdeploy validate` command.
//!
//! Runs a dry-run deployment of every environment: parameters are resolved
//! and templates rendered and checked, but no remote API is called. A dry run
//! never stops at the first error, so every configuration is reported.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use cfgdeploy_lib::deploy::{JsonLinesReporter, NoopReporter, Reporter};
use cfgdeploy_lib::{CallContext, ClientRegistry, DeployOptions, DeployState, DeploymentPlan, deploy_environments};

use crate::load::load_plan;
use crate::output::{print_error, print_info, print_outcome, print_success, print_warning};

pub fn cmd_validate(file: &Path, report: Option<&Path>) -> Result<ExitCode> {
  let configs = load_plan(file)?;

  let reporter: Arc<dyn Reporter> = match report {
    Some(path) => {
      let file = File::create(path).with_context(|| format!("Failed to create report: {}", path.display()))?;
      Arc::new(JsonLinesReporter::new(BufWriter::new(file)))
    }
    None => Arc::new(NoopReporter),
  };

  let options = DeployOptions {
    dry_run: true,
    ..DeployOptions::default()
  };

  let mut failures = 0;
  let mut plans = Vec::new();
  for (environment, plan) in DeploymentPlan::for_environments(configs) {
    match plan {
      Ok(plan) => plans.push(plan),
      Err(e) => {
        failures += 1;
        print_error(&format!("{environment}: {e}"));
      }
    }
  }

  // Dry runs never reach a client.
  let clients = ClientRegistry::new();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let results = rt.block_on(deploy_environments(
    plans,
    &clients,
    reporter,
    &options,
    &CallContext::background(),
  ));

  for (environment, result) in results {
    let result = match result {
      Ok(result) => result,
      Err(e) => {
        failures += 1;
        print_error(&format!("{environment}: {e}"));
        continue;
      }
    };

    print_info(&format!("Environment: {environment}"));
    for outcome in &result.outcomes {
      let error = outcome.error.as_ref().map(ToString::to_string);
      print_outcome(outcome.state, &outcome.coordinate.to_string(), error.as_deref());
    }

    let errors = result.error_count();
    if errors > 0 {
      failures += errors;
      print_warning(&format!(
        "{}: {} of {} configuration(s) failed",
        environment,
        errors,
        result.outcomes.len()
      ));
    } else {
      print_success(&format!(
        "{}: {} configuration(s) valid, {} skipped",
        environment,
        result.count(DeployState::Success),
        result.count(DeployState::Skipped)
      ));
    }
  }

  Ok(if failures > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
