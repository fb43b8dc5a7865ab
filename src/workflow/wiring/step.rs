// SPDX-License-Identifier: MIT

//! Step definition and call-time capture
//!
//! `StepFn::define` declares a function's contract and registers it once.
//! Calling the returned handle does not run any logic: it classifies the
//! bound arguments, allocates PENDING output cells and returns a
//! `StepWiring` describing the step.

use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::contract;
use crate::cell::{Cell, CellId, ANY_TYPE};
use crate::error::{BuildError, FunctionError};
use crate::function::{Arguments, FunctionDef, RETURN};
use crate::workflow::registry::FunctionRegistry;
use crate::workflow::types::Step;

use super::shape::{GroupWiring, Shape};

/// A declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_hint: String,
    pub default: Option<Value>,
}

/// Result of a previous factory call, used as an argument
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOutput {
    slug: String,
    outputs: BTreeMap<String, Cell>,
    default_output: Option<String>,
}

impl PendingOutput {
    /// The cell a downstream step wires to when no output is named
    pub fn default_cell(&self) -> Option<&Cell> {
        if self.outputs.len() == 1 {
            return self.outputs.values().next();
        }
        self.default_output
            .as_ref()
            .and_then(|name| self.outputs.get(name))
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.keys().cloned().collect()
    }
}

/// An argument bound at call time
#[derive(Debug, Clone, PartialEq)]
pub enum BoundArg {
    /// Wired input from an existing cell
    CellRef(Cell),
    /// Wired input from a previous call's default output
    PendingOutputRef(PendingOutput),
    /// Static configuration
    Literal(Value),
}

impl From<&Cell> for BoundArg {
    fn from(cell: &Cell) -> Self {
        BoundArg::CellRef(cell.clone())
    }
}

impl From<Cell> for BoundArg {
    fn from(cell: Cell) -> Self {
        BoundArg::CellRef(cell)
    }
}

impl From<&StepWiring> for BoundArg {
    fn from(wiring: &StepWiring) -> Self {
        BoundArg::PendingOutputRef(wiring.pending())
    }
}

impl From<&GroupWiring> for BoundArg {
    fn from(group: &GroupWiring) -> Self {
        BoundArg::CellRef(group.composite().clone())
    }
}

impl From<Value> for BoundArg {
    fn from(value: Value) -> Self {
        BoundArg::Literal(value)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for BoundArg {
                fn from(value: $ty) -> Self {
                    BoundArg::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_from!(&str, String, bool, i32, i64, u32, u64, f64);

/// Named arguments for a factory call
#[derive(Debug, Clone, Default)]
pub struct Bindings(BTreeMap<String, BoundArg>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an argument; binding the same name again replaces it
    pub fn bind(mut self, name: impl Into<String>, arg: impl Into<BoundArg>) -> Self {
        self.0.insert(name.into(), arg.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&BoundArg> {
        self.0.get(name)
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<BoundArg> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BoundArg)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, BoundArg)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, BoundArg)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The artifact returned by a factory call: a step plus its placeholder outputs
#[derive(Debug, Clone, PartialEq)]
pub struct StepWiring {
    step: Step,
    outputs: BTreeMap<String, Cell>,
    default_output: Option<String>,
    shape: Shape,
}

impl StepWiring {
    pub fn step(&self) -> &Step {
        &self.step
    }

    pub fn into_step(self) -> Step {
        self.step
    }

    /// Default output cell, if one can be determined
    pub fn output(&self) -> Option<&Cell> {
        if self.outputs.len() == 1 {
            return self.outputs.values().next();
        }
        self.default_output
            .as_ref()
            .and_then(|name| self.outputs.get(name))
    }

    /// A specific named output
    pub fn output_named(&self, name: &str) -> Option<&Cell> {
        self.outputs.get(name)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Cell> {
        &self.outputs
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn pending(&self) -> PendingOutput {
        PendingOutput {
            slug: self.step.function_slug.clone(),
            outputs: self.outputs.clone(),
            default_output: self.default_output.clone(),
        }
    }
}

/// Contract declaration for a step function, finished by `register`
#[derive(Debug, Clone)]
pub struct StepDef {
    slug: String,
    name: Option<String>,
    description: String,
    params: Vec<Param>,
    outputs: Vec<(String, String)>,
    default_output: Option<String>,
}

impl StepDef {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a parameter that must be bound at call time
    pub fn param(mut self, name: impl Into<String>, type_hint: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            type_hint: type_hint.into(),
            default: None,
        });
        self
    }

    /// Declare a parameter whose default is applied as config when unbound
    pub fn param_default(
        mut self,
        name: impl Into<String>,
        type_hint: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.params.push(Param {
            name: name.into(),
            type_hint: type_hint.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Type of the single default output
    pub fn returns(mut self, type_hint: impl Into<String>) -> Self {
        self.outputs.retain(|(name, _)| name != RETURN);
        self.outputs.push((RETURN.to_string(), type_hint.into()));
        self
    }

    /// Declare a named output (multi-output function)
    pub fn output(mut self, name: impl Into<String>, type_hint: impl Into<String>) -> Self {
        self.outputs.push((name.into(), type_hint.into()));
        self
    }

    /// Output used when the wiring is passed on without naming one
    pub fn default_output(mut self, name: impl Into<String>) -> Self {
        self.default_output = Some(name.into());
        self
    }

    /// Register the logic and return the call-time factory
    pub fn register<F>(self, registry: &FunctionRegistry, logic: F) -> StepFn
    where
        F: Fn(&Arguments) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        registry.register(self.function_def().with_executable(logic));
        self.into_step_fn()
    }

    /// Catalog entry describing this contract, without an executable
    pub(crate) fn function_def(&self) -> FunctionDef {
        let mut def = FunctionDef::new(self.slug.clone())
            .with_name(self.name.clone().unwrap_or_else(|| self.slug.clone()))
            .with_description(self.description.clone());
        for param in &self.params {
            def = def.with_input(param.name.clone(), param.type_hint.clone());
            if let Some(default) = &param.default {
                def = def.with_default(param.name.clone(), default.clone());
            }
        }
        for (name, type_hint) in self.declared_outputs() {
            def = def.with_output(name, type_hint);
        }
        def
    }

    pub(crate) fn into_step_fn(self) -> StepFn {
        let outputs = self.declared_outputs();
        StepFn {
            slug: self.slug,
            params: self.params,
            outputs,
            default_output: self.default_output,
        }
    }

    fn declared_outputs(&self) -> Vec<(String, String)> {
        if self.outputs.is_empty() {
            vec![(RETURN.to_string(), ANY_TYPE.to_string())]
        } else {
            self.outputs.clone()
        }
    }
}

/// Registered step function; calling it records a step instead of running it
#[derive(Debug, Clone)]
pub struct StepFn {
    slug: String,
    params: Vec<Param>,
    outputs: Vec<(String, String)>,
    default_output: Option<String>,
}

/// Wired inputs and static config after classification
pub(crate) struct Classified {
    pub inputs: BTreeMap<String, CellId>,
    pub config: BTreeMap<String, Value>,
}

impl StepFn {
    /// Start declaring a step function
    pub fn define(slug: impl Into<String>) -> StepDef {
        StepDef {
            slug: slug.into(),
            name: None,
            description: String::new(),
            params: Vec::new(),
            outputs: Vec::new(),
            default_output: None,
        }
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// The factory: record a step for these arguments
    pub fn call(&self, bindings: Bindings) -> Result<StepWiring, BuildError> {
        let classified = self.classify(bindings, &[])?;
        let outputs = self.allocate(&self.outputs, |name| {
            if name == RETURN {
                format!("{}_out", self.slug)
            } else {
                format!("{}_{}", self.slug, name)
            }
        });
        Ok(self.wiring(classified, outputs, Shape::Single))
    }

    pub(crate) fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Type descriptor of the default output
    pub(crate) fn return_type(&self) -> String {
        self.outputs
            .iter()
            .find(|(name, _)| name == RETURN)
            .or_else(|| self.outputs.first())
            .map(|(_, hint)| hint.clone())
            .unwrap_or_else(|| ANY_TYPE.to_string())
    }

    /// Sort bound arguments into wired inputs and config, applying defaults.
    /// Parameters listed in `skip` are bound by the caller.
    pub(crate) fn classify(
        &self,
        bindings: Bindings,
        skip: &[&str],
    ) -> Result<Classified, BuildError> {
        let mut inputs = BTreeMap::new();
        let mut config = BTreeMap::new();

        for (name, arg) in bindings.0 {
            let param = self
                .param(&name)
                .ok_or_else(|| BuildError::UnknownParameter {
                    slug: self.slug.clone(),
                    param: name.clone(),
                })?;

            match arg {
                BoundArg::CellRef(cell) => {
                    contract::check_hint(&name, &param.type_hint, &cell.type_hint)?;
                    inputs.insert(name, cell.id);
                }
                BoundArg::PendingOutputRef(pending) => {
                    let cell = pending
                        .default_cell()
                        .ok_or_else(|| BuildError::AmbiguousWiring {
                            slug: self.slug.clone(),
                            param: name.clone(),
                            outputs: pending.output_names(),
                        })?;
                    contract::check_hint(&name, &param.type_hint, &cell.type_hint)?;
                    inputs.insert(name, cell.id);
                }
                BoundArg::Literal(value) => {
                    contract::check_literal(&name, &param.type_hint, &value)?;
                    config.insert(name, value);
                }
            }
        }

        for param in &self.params {
            if inputs.contains_key(&param.name)
                || config.contains_key(&param.name)
                || skip.contains(&param.name.as_str())
            {
                continue;
            }
            match &param.default {
                Some(default) => {
                    config.insert(param.name.clone(), default.clone());
                }
                None => {
                    return Err(BuildError::MissingArgument {
                        slug: self.slug.clone(),
                        param: param.name.clone(),
                    })
                }
            }
        }

        Ok(Classified { inputs, config })
    }

    /// One PENDING cell per output name
    pub(crate) fn allocate(
        &self,
        outputs: &[(String, String)],
        alias: impl Fn(&str) -> String,
    ) -> BTreeMap<String, Cell> {
        outputs
            .iter()
            .map(|(name, hint)| (name.clone(), Cell::pending(alias(name), hint.clone())))
            .collect()
    }

    pub(crate) fn wiring(
        &self,
        classified: Classified,
        outputs: BTreeMap<String, Cell>,
        shape: Shape,
    ) -> StepWiring {
        let step = Step {
            step_id: Uuid::new_v4(),
            function_slug: self.slug.clone(),
            config: classified.config,
            inputs: classified.inputs,
            outputs: outputs
                .iter()
                .map(|(name, cell)| (name.clone(), cell.id))
                .collect(),
        };
        log::debug!(
            "Recorded step '{}' ({}) with {} inputs",
            self.slug,
            step.step_id,
            step.inputs.len()
        );
        StepWiring {
            step,
            outputs,
            default_output: self.default_output.clone(),
            shape,
        }
    }
}
