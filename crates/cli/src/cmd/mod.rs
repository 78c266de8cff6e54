mod graph;
mod plan;
mod validate;

pub use graph::cmd_graph;
pub use plan::cmd_plan;
pub use validate::cmd_validate;
