// SPDX-License-Identifier: MIT

pub mod builder;
pub mod graph;
pub mod loader;
pub mod registry;
pub mod tabular;
pub mod types;
pub mod wiring;

pub use builder::{InputRef, WorkflowBuilder};
pub use graph::{Context, Engine, EngineConfig};
pub use loader::WorkflowLoader;
pub use registry::FunctionRegistry;
pub use tabular::TabularBuilder;
pub use types::{Step, Workflow};
