//! Implementation of the `cfgdeploy graph` command.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use cfgdeploy_lib::build_graph;

use crate::load::load_plan;
use crate::output::{print_error, print_success};

/// Write one `<environment>.dot` file per environment with a valid graph.
pub fn cmd_graph(file: &Path, out_dir: &Path) -> Result<ExitCode> {
  let configs = load_plan(file)?;

  fs::create_dir_all(out_dir).with_context(|| format!("Failed to create directory: {}", out_dir.display()))?;

  let mut failed = false;

  for (environment, graph) in build_graph(configs) {
    match graph {
      Ok(graph) => {
        let path = out_dir.join(format!("{environment}.dot"));
        fs::write(&path, graph.to_dot()).with_context(|| format!("Failed to write graph: {}", path.display()))?;
        info!(environment = %environment, nodes = graph.len(), edges = graph.edge_count(), "graph written");
        print_success(&format!("{}: {}", environment, path.display()));
      }
      Err(e) => {
        failed = true;
        print_error(&format!("{environment}: {e}"));
      }
    }
  }

  Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
