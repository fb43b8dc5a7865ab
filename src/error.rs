// SPDX-License-Identifier: MIT

//! Typed error handling for fancy-rs
//!
//! Errors are split by phase. `BuildError` is raised while a graph is being
//! wired and always before anything runs; `RunError` aborts an engine run at
//! the first failing step. `StoreError` and `ExecuteError` belong to the
//! store and catalog collaborators and are wrapped by the engine.

use thiserror::Error;
use uuid::Uuid;

use crate::cell::CellId;

/// Failure raised by user logic. Kept as a boxed trait object so any error
/// type can flow through the catalog unchanged.
pub type FunctionError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error type for fancy-rs
#[derive(Debug, Error)]
pub enum FancyError {
    /// Graph construction errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Workflow execution errors
    #[error("Run error: {0}")]
    Run(#[from] RunError),

    /// Store errors raised outside of a run
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catalog errors raised outside of a run
    #[error("Catalog error: {0}")]
    Execute(#[from] ExecuteError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised while wiring a graph
#[derive(Debug, Error)]
pub enum BuildError {
    /// Slug not registered in the catalog
    #[error("Function '{slug}' not found in registry")]
    UnknownFunction { slug: String },

    /// Builder reference to an alias that was never bound
    #[error("Input '{param}' uses alias '{alias}' which is not defined in this builder")]
    UndefinedAlias { param: String, alias: String },

    /// Multi-output wiring used where a single output is required
    #[error("Ambiguous wiring: step '{slug}' received a multi-output result for '{param}' (outputs: {outputs:?})")]
    AmbiguousWiring {
        slug: String,
        param: String,
        outputs: Vec<String>,
    },

    /// Wrong kind of value supplied as an input or config argument
    #[error("Type mismatch for '{param}': expected {expected}, found {found}")]
    TypeMismatch {
        param: String,
        expected: String,
        found: String,
    },

    /// Argument bound to a name the function does not declare
    #[error("Function '{slug}' has no parameter named '{param}'")]
    UnknownParameter { slug: String, param: String },

    /// Parameter with neither a binding nor a default
    #[error("Function '{slug}' is missing a value for parameter '{param}'")]
    MissingArgument { slug: String, param: String },

    /// Parameter supplied both as a wired input and as config
    #[error("Parameter '{param}' is supplied both as an input and as config")]
    DuplicateArgument { param: String },

    /// Tabular row without the requested input column
    #[error("Row {row} missing input column '{column}'")]
    MissingColumn { row: usize, column: String },
}

/// Errors raised while executing a workflow
#[derive(Debug, Error)]
pub enum RunError {
    /// A wired input id is not present in the context
    #[error("Step '{slug}' (ID: {step_id}) missing input cell {cell_id} for '{param}'")]
    MissingInputCell {
        step_id: Uuid,
        slug: String,
        param: String,
        cell_id: CellId,
    },

    /// Slug vanished from, or was never registered in, the catalog
    #[error("Function definition not found for slug '{slug}' (step {step_id})")]
    UnknownFunction { step_id: Uuid, slug: String },

    /// User logic failed
    #[error("Error executing step '{slug}' (ID: {step_id}): {source}")]
    StepExecution {
        step_id: Uuid,
        slug: String,
        #[source]
        source: FunctionError,
    },

    /// A REFERENCE cell's backing value is missing from the store
    #[error("Step {step_id}: data not found for cell {cell_id} at {uri}")]
    DataNotFound {
        step_id: Uuid,
        cell_id: CellId,
        uri: String,
    },

    /// Any other store failure during a run
    #[error("Step {step_id}: {source}")]
    Store {
        step_id: Uuid,
        #[source]
        source: StoreError,
    },

    /// Parameter supplied both ways under the `reject` precedence policy
    #[error("Step '{slug}' (ID: {step_id}) receives '{param}' both as input and as config")]
    ArgumentCollision {
        step_id: Uuid,
        slug: String,
        param: String,
    },

    /// Steps that depend on each other's outputs
    #[error("Circular dependency detected between steps: {0:?}")]
    CycleDetected(Vec<Uuid>),

    /// Input id neither provided initially nor produced by any step
    #[error("Step {step_id} input '{param}' references cell {cell_id} which nothing provides")]
    UnresolvedInput {
        step_id: Uuid,
        param: String,
        cell_id: CellId,
    },

    /// Output id pre-allocated by more than one step
    #[error("Cell {cell_id} is produced by more than one step")]
    DuplicateOutput { cell_id: CellId },
}

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No backing data for a REFERENCE cell's URI
    #[error("Data not found for URI: {uri}")]
    DataNotFound { uri: String },

    /// A PENDING placeholder was resolved
    #[error("Cell {id} is pending and has no value yet")]
    PendingCell { id: CellId },

    /// Backend failure in a custom `Store`
    #[error("Store internal error: {0}")]
    Internal(String),
}

/// Catalog execution errors
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Slug not registered
    #[error("Function '{slug}' not found in registry")]
    UnknownFunction { slug: String },

    /// Failure from the executable, passed through unchanged
    #[error("{0}")]
    Function(#[source] FunctionError),
}

impl BuildError {
    /// Create an unknown function error
    pub fn unknown_function(slug: impl Into<String>) -> Self {
        Self::UnknownFunction { slug: slug.into() }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(
        param: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            param: param.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl StoreError {
    /// Create a data not found error
    pub fn data_not_found(uri: impl Into<String>) -> Self {
        Self::DataNotFound { uri: uri.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_step_execution_keeps_source() {
        let cause: FunctionError = "division by zero".into();
        let err = RunError::StepExecution {
            step_id: Uuid::nil(),
            slug: "math.div".to_string(),
            source: cause,
        };

        assert!(err.to_string().contains("math.div"));
        assert_eq!(err.source().unwrap().to_string(), "division by zero");
    }

    #[test]
    fn test_build_error_converts_to_fancy_error() {
        let err: FancyError = BuildError::unknown_function("missing").into();
        assert!(matches!(
            err,
            FancyError::Build(BuildError::UnknownFunction { .. })
        ));
        assert!(err.to_string().contains("not found in registry"));
    }

    #[test]
    fn test_execute_error_displays_cause() {
        let err = ExecuteError::Function("boom".into());
        assert_eq!(err.to_string(), "boom");
    }
}
