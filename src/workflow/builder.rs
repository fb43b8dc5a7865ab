// SPDX-License-Identifier: MIT

//! Workflow builder - alias-indexed graph construction
//!
//! `WorkflowBuilder` appends steps by function slug and keeps a table of
//! aliases for the cells it allocates, so later steps can refer to earlier
//! outputs by name. Every call validates completely before touching the
//! workflow: a failed `add_step` leaves the builder unchanged.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::cell::{type_hint_of, Cell, CellId};
use crate::error::{BuildError, FancyError};
use crate::function::RETURN;
use crate::workflow::registry::FunctionRegistry;
use crate::workflow::types::{Step, Workflow};
use crate::workflow::wiring::contract;
use crate::workflow::wiring::{GroupWiring, StepWiring};

/// Source of a step input: a raw cell id or an alias known to the builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRef {
    Id(CellId),
    Alias(String),
}

impl From<Uuid> for InputRef {
    fn from(id: Uuid) -> Self {
        InputRef::Id(id)
    }
}

impl From<&str> for InputRef {
    fn from(alias: &str) -> Self {
        InputRef::Alias(alias.to_string())
    }
}

impl From<String> for InputRef {
    fn from(alias: String) -> Self {
        InputRef::Alias(alias)
    }
}

impl TryFrom<&Value> for InputRef {
    type Error = BuildError;

    /// Strings that parse as UUIDs are ids, other strings are aliases
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(match Uuid::parse_str(s) {
                Ok(id) => InputRef::Id(id),
                Err(_) => InputRef::Alias(s.clone()),
            }),
            other => Err(BuildError::type_mismatch(
                "input",
                "cell id or alias string",
                type_hint_of(other),
            )),
        }
    }
}

/// Programmatic workflow construction with alias resolution
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    workflow: Workflow,
    registry: FunctionRegistry,
    vars: BTreeMap<String, CellId>,
    initial_cells: Vec<Cell>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>, registry: &FunctionRegistry) -> Self {
        Self {
            workflow: Workflow::new(name),
            registry: registry.clone(),
            vars: BTreeMap::new(),
            initial_cells: Vec::new(),
        }
    }

    /// Append a step and return the id of its `return` output.
    ///
    /// `config` must be a JSON object (or null for none).
    pub fn add_step(
        &mut self,
        function_slug: &str,
        inputs: &[(&str, InputRef)],
        config: Value,
        output_alias: Option<&str>,
    ) -> Result<CellId, BuildError> {
        let def = self
            .registry
            .get(function_slug)
            .ok_or_else(|| BuildError::unknown_function(function_slug))?;

        let mut resolved = BTreeMap::new();
        for (name, source) in inputs {
            let id = match source {
                InputRef::Id(id) => *id,
                InputRef::Alias(alias) => {
                    *self
                        .vars
                        .get(alias)
                        .ok_or_else(|| BuildError::UndefinedAlias {
                            param: name.to_string(),
                            alias: alias.clone(),
                        })?
                }
            };
            resolved.insert(name.to_string(), id);
        }

        let config = match config {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(BuildError::type_mismatch(
                    "config",
                    "object",
                    type_hint_of(&other),
                ))
            }
        };

        for (name, value) in &config {
            if resolved.contains_key(name) {
                return Err(BuildError::DuplicateArgument {
                    param: name.clone(),
                });
            }
            if let Some(descriptor) = def.input_contract.get(name) {
                contract::check_literal(name, descriptor, value)?;
            }
        }

        let output_id = Uuid::new_v4();
        let step = Step {
            step_id: Uuid::new_v4(),
            function_slug: function_slug.to_string(),
            config: config.into_iter().collect(),
            inputs: resolved,
            outputs: BTreeMap::from([(RETURN.to_string(), output_id)]),
        };
        log::debug!(
            "Added step '{}' ({}) to '{}'",
            function_slug,
            step.step_id,
            self.workflow.name
        );
        self.workflow.add_step(step);

        if let Some(alias) = output_alias {
            self.vars.insert(alias.to_string(), output_id);
        }
        Ok(output_id)
    }

    /// Same as `add_step`, with inputs given as a JSON object of id or alias strings
    pub fn add_step_json(
        &mut self,
        function_slug: &str,
        inputs: &Value,
        config: Value,
        output_alias: Option<&str>,
    ) -> Result<CellId, BuildError> {
        let parsed: Vec<(String, InputRef)> = match inputs {
            Value::Null => Vec::new(),
            Value::Object(map) => map
                .iter()
                .map(|(name, v)| match v {
                    Value::String(_) => InputRef::try_from(v).map(|r| (name.clone(), r)),
                    other => Err(BuildError::type_mismatch(
                        name.as_str(),
                        "cell id or alias string",
                        type_hint_of(other),
                    )),
                })
                .collect::<Result<_, _>>()?,
            other => {
                return Err(BuildError::type_mismatch(
                    "inputs",
                    "object",
                    type_hint_of(other),
                ))
            }
        };
        let borrowed: Vec<(&str, InputRef)> = parsed
            .iter()
            .map(|(name, r)| (name.as_str(), r.clone()))
            .collect();
        self.add_step(function_slug, &borrowed, config, output_alias)
    }

    /// Append a step recorded by a `StepFn` call
    pub fn add_wiring(&mut self, wiring: &StepWiring) -> Result<&mut Self, BuildError> {
        self.append(wiring.step().clone())?;
        Ok(self)
    }

    /// Append every step of a shape operator call.
    ///
    /// The group's composite cell is kept as an initial cell, so a plain step
    /// wired with `&group` resolves it to the element ids.
    pub fn add_group(&mut self, group: &GroupWiring) -> Result<&mut Self, BuildError> {
        for step in group.steps() {
            self.append(step.clone())?;
        }
        let composite = group.composite();
        if !self.initial_cells.iter().any(|cell| cell.id == composite.id) {
            self.initial_cells.push(composite.clone());
        }
        Ok(self)
    }

    fn append(&mut self, step: Step) -> Result<(), BuildError> {
        if !self.registry.contains(&step.function_slug) {
            return Err(BuildError::unknown_function(step.function_slug));
        }
        self.workflow.add_step(step);
        Ok(())
    }

    /// Seed a VALUE cell, bind it under `alias` and keep it as an initial cell
    pub fn input(&mut self, alias: &str, value: Value) -> CellId {
        let cell = Cell::value(value, alias);
        let id = cell.id;
        self.vars.insert(alias.to_string(), id);
        self.initial_cells.push(cell);
        id
    }

    /// Register an existing cell (e.g. a decorator output) under an alias
    pub fn bind(&mut self, alias: impl Into<String>, id: CellId) {
        self.vars.insert(alias.into(), id);
    }

    /// The id bound to an alias
    pub fn variable(&self, alias: &str) -> Option<CellId> {
        self.vars.get(alias).copied()
    }

    pub fn initial_cells(&self) -> &[Cell] {
        &self.initial_cells
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }

    /// The workflow plus the initial cells created with `input` and `add_group`
    pub fn into_parts(self) -> (Workflow, Vec<Cell>) {
        (self.workflow, self.initial_cells)
    }

    pub fn export_json(&self) -> Result<String, FancyError> {
        self.workflow.to_json()
    }
}
