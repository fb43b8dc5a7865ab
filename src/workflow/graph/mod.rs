// SPDX-License-Identifier: MIT

//! Workflow execution
//!
//! The engine resolves each step's inputs through the store, calls the
//! catalog function and writes every output back under its pre-allocated id.

pub mod config;
pub mod executor;
pub mod order;

pub use config::{ArgumentPrecedence, EngineConfig, ExecutionOrder};
pub use executor::{Context, Engine};
pub use order::plan;
