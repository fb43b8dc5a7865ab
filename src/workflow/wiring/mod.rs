// SPDX-License-Identifier: MIT

//! Call-time graph capture
//!
//! Declare a function once with `StepFn::define(..).register(..)`, then call
//! the handle with `Bindings`. Each call records a `Step` and returns PENDING
//! cells that later calls can bind to. Nothing runs until the engine does;
//! collect the recorded steps with `WorkflowBuilder::add_wiring`.

pub mod contract;
pub mod shape;
pub mod step;

pub use shape::{Expand, GroupWiring, Reshape, Shape, Summarize, Vectorize};
pub use step::{Bindings, BoundArg, Param, PendingOutput, StepDef, StepFn, StepWiring};
