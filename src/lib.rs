// SPDX-License-Identifier: MIT

//! fancy-rs - a deferred-execution dataflow graph
//!
//! Calling a registered step function records a `Step` instead of running
//! it. The `Engine` later executes the recorded `Workflow`, resolving inputs
//! through a `Store` and writing each output under the cell id allocated at
//! wiring time.

pub mod cell;
pub mod error;
pub mod function;
pub mod store;
pub mod workflow;

pub use cell::{Cell, CellId, Composite, StorageKind};
pub use error::{BuildError, FancyError, RunError};
pub use function::{Arguments, FunctionDef};
pub use store::{InMemoryStore, Store};
pub use workflow::wiring::{Bindings, StepFn};
pub use workflow::{Engine, FunctionRegistry, Workflow, WorkflowBuilder};
