//! Built-in tool implementations for Reagent.
//!
//! Two small tools that an agent can call out of the box: arithmetic and
//! the current time.

pub mod calculator;
pub mod current_time;

use reagent_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use current_time::CurrentTimeTool;

/// Create a tool registry with every built-in tool.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CalculatorTool));
    registry.register(Box::new(CurrentTimeTool));
    registry
}
