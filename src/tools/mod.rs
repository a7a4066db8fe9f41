//! Tool catalog consumed by the reasoning loop.

mod registry;

pub use registry::{Tool, ToolOutcome, ToolRegistry};
