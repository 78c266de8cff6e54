//! Implementation of the `cfgdeploy plan` command.
//!
//! Loads a plan document and prints, per environment, the order in which the
//! configurations would be deployed.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Result, bail};
use serde::Serialize;

use cfgdeploy_lib::{Coordinate, DeploymentPlan};

use crate::load::load_plan;
use crate::output::{OutputFormat, print_error, print_info, print_json, print_stat, symbols};

#[derive(Debug, Serialize)]
struct EnvironmentPlan {
  environment: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  order: Option<Vec<Coordinate>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  projects: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

pub fn cmd_plan(file: &Path, environment: Option<&str>, output: OutputFormat) -> Result<ExitCode> {
  let configs = load_plan(file)?;

  let mut plans = DeploymentPlan::for_environments(configs);
  if let Some(environment) = environment {
    plans.retain(|name, _| name == environment);
    if plans.is_empty() {
      bail!("Environment '{}' not found in {}", environment, file.display());
    }
  }

  let summaries: Vec<EnvironmentPlan> = plans
    .into_iter()
    .map(|(environment, plan)| match plan {
      Ok(plan) => {
        // A project cycle does not block deployment; only the project order is missing.
        let (projects, error) = match plan.project_order() {
          Ok(projects) => (Some(projects), None),
          Err(e) => (None, Some(e.to_string())),
        };
        EnvironmentPlan {
          environment,
          order: Some(plan.order().to_vec()),
          projects,
          error,
        }
      }
      Err(e) => EnvironmentPlan {
        environment,
        order: None,
        projects: None,
        error: Some(e.to_string()),
      },
    })
    .collect();

  let failed = summaries.iter().any(|s| s.order.is_none());

  if output.is_json() {
    print_json(&summaries)?;
  } else {
    for summary in &summaries {
      print_environment(summary);
    }
  }

  Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn print_environment(summary: &EnvironmentPlan) {
  print_info(&format!("Environment: {}", summary.environment));

  if let Some(order) = &summary.order {
    print_stat("Configurations", &order.len().to_string());
    for (i, coordinate) in order.iter().enumerate() {
      println!("  {:>3}. {}", i + 1, coordinate);
    }
  }

  if let Some(projects) = &summary.projects {
    print_stat("Projects", &projects.join(&format!(" {} ", symbols::ARROW)));
  }

  if let Some(error) = &summary.error {
    print_error(error);
  }

  println!();
}
