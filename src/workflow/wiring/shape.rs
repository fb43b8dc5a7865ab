// SPDX-License-Identifier: MIT

//! Shape operators - cardinality bookkeeping over the step primitive
//!
//! - `Expand` (1→N): one input, `fan_out` element outputs
//! - `Vectorize` (N→N): the same logic applied to every element of a group
//! - `Reshape` (N→M): groups in, a differently sized group out
//! - `Summarize` (N→1): a group in, one scalar out
//!
//! Groups travel as COMPOSITE cells. Group parameters are flattened into
//! indexed inputs (`nums.0`, `nums.1`, ...) and regrouped into a sequence
//! before the logic runs; element outputs are named by index. The engine
//! never sees any of this.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::step::{BoundArg, Bindings, Classified, StepDef, StepFn, StepWiring};
use crate::cell::{type_hint_of, Cell, Composite};
use crate::error::{BuildError, FunctionError};
use crate::function::{Arguments, Function, RETURN};
use crate::workflow::registry::FunctionRegistry;
use crate::workflow::types::Step;

/// Cardinality contract a wiring was produced under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Plain 1→1 step
    Single,
    Expand,
    Vectorize,
    Reshape,
    Summarize,
}

/// Wiring for a group of outputs: the recorded steps plus the element cells
/// and the COMPOSITE cell grouping them
#[derive(Debug, Clone, PartialEq)]
pub struct GroupWiring {
    steps: Vec<Step>,
    elements: Vec<Cell>,
    composite: Cell,
    shape: Shape,
}

impl GroupWiring {
    fn new(steps: Vec<Step>, elements: Vec<Cell>, alias: String, shape: Shape) -> Self {
        let composite = Cell::composite(
            Composite::Sequence(elements.iter().map(|c| c.id).collect()),
            alias,
        );
        Self {
            steps,
            elements,
            composite,
            shape,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// PENDING element cells, in order
    pub fn elements(&self) -> &[Cell] {
        &self.elements
    }

    /// COMPOSITE cell over the elements
    pub fn composite(&self) -> &Cell {
        &self.composite
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Members of a group binding: cell ids to wire, or literal values
enum Members {
    Cells(Vec<uuid::Uuid>),
    Literals(Vec<Value>),
}

fn members(param: &str, arg: BoundArg) -> Result<Members, BuildError> {
    match arg {
        BoundArg::CellRef(cell) => match cell.children() {
            Some(children) => Ok(Members::Cells(children.ids())),
            None => Err(BuildError::type_mismatch(
                param,
                "COMPOSITE group",
                format!("{:?} cell", cell.storage_kind()),
            )),
        },
        BoundArg::Literal(Value::Array(items)) => Ok(Members::Literals(items)),
        BoundArg::Literal(other) => Err(BuildError::type_mismatch(
            param,
            "COMPOSITE group",
            type_hint_of(&other),
        )),
        BoundArg::PendingOutputRef(pending) => Err(BuildError::type_mismatch(
            param,
            "COMPOSITE group",
            format!("pending output of '{}'", pending.slug()),
        )),
    }
}

fn indexed_outputs(count: usize, hint: &str) -> Vec<(String, String)> {
    (0..count)
        .map(|i| (i.to_string(), hint.to_string()))
        .collect()
}

/// Flatten group parameters into indexed inputs (or pass literal sequences
/// through as config)
fn flatten_groups(
    slug: &str,
    over: &[String],
    bindings: &mut Bindings,
) -> Result<(BTreeMap<String, uuid::Uuid>, BTreeMap<String, Value>), BuildError> {
    let mut inputs = BTreeMap::new();
    let mut config = BTreeMap::new();
    for param in over {
        let arg = bindings
            .take(param)
            .ok_or_else(|| BuildError::MissingArgument {
                slug: slug.to_string(),
                param: param.clone(),
            })?;
        match members(param, arg)? {
            Members::Cells(ids) => {
                for (i, id) in ids.into_iter().enumerate() {
                    inputs.insert(format!("{}.{}", param, i), id);
                }
            }
            Members::Literals(items) => {
                config.insert(param.clone(), Value::Array(items));
            }
        }
    }
    Ok((inputs, config))
}

/// Executable adapter: regroup indexed inputs into sequences
struct Regroup {
    over: Vec<String>,
    inner: Arc<dyn Function>,
}

impl Function for Regroup {
    fn call(&self, args: &Arguments) -> Result<Value, FunctionError> {
        let mut args = args.clone();
        for param in &self.over {
            let prefix = format!("{}.", param);
            let mut indexed: Vec<(usize, String)> = args
                .names()
                .filter_map(|name| {
                    name.strip_prefix(&prefix)
                        .and_then(|i| i.parse::<usize>().ok())
                        .map(|i| (i, name.clone()))
                })
                .collect();
            if indexed.is_empty() {
                if !args.contains(param) {
                    args.insert(param.clone(), Value::Array(Vec::new()));
                }
                continue;
            }
            indexed.sort();
            let items = indexed
                .into_iter()
                .filter_map(|(_, name)| args.remove(&name))
                .collect();
            args.insert(param.clone(), Value::Array(items));
        }
        self.inner.call(&args)
    }
}

/// Executable adapter: spread a sequence result over index-named outputs
struct Spread {
    slug: String,
    inner: Arc<dyn Function>,
}

impl Function for Spread {
    fn call(&self, args: &Arguments) -> Result<Value, FunctionError> {
        match self.inner.call(args)? {
            Value::Array(items) => Ok(Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v))
                    .collect::<Map<String, Value>>(),
            )),
            other => Err(format!(
                "'{}' must return a sequence, got {}",
                self.slug,
                type_hint_of(&other)
            )
            .into()),
        }
    }
}

fn shared<F>(logic: F) -> Arc<dyn Function>
where
    F: Fn(&Arguments) -> Result<Value, FunctionError> + Send + Sync + 'static,
{
    Arc::new(logic)
}

impl StepDef {
    /// Register as a 1→N operator
    pub fn expand<F>(self, registry: &FunctionRegistry, logic: F) -> Expand
    where
        F: Fn(&Arguments) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        let def = self.function_def();
        let slug = def.slug.clone();
        registry.register(def.with_shared_executable(Arc::new(Spread {
            slug,
            inner: shared(logic),
        })));
        Expand {
            inner: self.into_step_fn(),
        }
    }

    /// Register as an N→N operator mapping over parameter `over`
    pub fn vectorize<F>(self, registry: &FunctionRegistry, over: &str, logic: F) -> Vectorize
    where
        F: Fn(&Arguments) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        registry.register(self.function_def().with_executable(logic));
        Vectorize {
            inner: self.into_step_fn(),
            over: over.to_string(),
        }
    }

    /// Register as an N→M operator over the group parameters `over`
    pub fn reshape<F>(self, registry: &FunctionRegistry, over: &[&str], logic: F) -> Reshape
    where
        F: Fn(&Arguments) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        let over: Vec<String> = over.iter().map(|s| s.to_string()).collect();
        let def = self.function_def();
        let slug = def.slug.clone();
        let regroup = Regroup {
            over: over.clone(),
            inner: shared(logic),
        };
        registry.register(def.with_shared_executable(Arc::new(Spread {
            slug,
            inner: Arc::new(regroup),
        })));
        Reshape {
            inner: self.into_step_fn(),
            over,
        }
    }

    /// Register as an N→1 operator collapsing parameter `over`
    pub fn summarize<F>(self, registry: &FunctionRegistry, over: &str, logic: F) -> Summarize
    where
        F: Fn(&Arguments) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        registry.register(self.function_def().with_shared_executable(Arc::new(Regroup {
            over: vec![over.to_string()],
            inner: shared(logic),
        })));
        Summarize {
            inner: self.into_step_fn(),
            over: over.to_string(),
        }
    }
}

/// 1→N: one input produces `fan_out` element cells
#[derive(Debug, Clone)]
pub struct Expand {
    inner: StepFn,
}

impl Expand {
    pub fn slug(&self) -> &str {
        self.inner.slug()
    }

    pub fn call(&self, bindings: Bindings, fan_out: usize) -> Result<GroupWiring, BuildError> {
        if fan_out == 0 {
            return Err(BuildError::type_mismatch("fan_out", "at least one output", "0"));
        }
        let classified = self.inner.classify(bindings, &[])?;
        if classified.inputs.len() != 1 {
            // the extra wired input, or the parameter that should have been wired
            let param = match classified.inputs.keys().nth(1) {
                Some(extra) => extra.clone(),
                None => classified
                    .config
                    .keys()
                    .next()
                    .cloned()
                    .or_else(|| self.inner.params().first().map(|p| p.name.clone()))
                    .unwrap_or_default(),
            };
            return Err(BuildError::type_mismatch(
                param,
                "exactly one wired input",
                format!("{} wired inputs", classified.inputs.len()),
            ));
        }

        let slug = self.inner.slug().to_string();
        let outputs = indexed_outputs(fan_out, &self.inner.return_type());
        let cells = self
            .inner
            .allocate(&outputs, |i| format!("{}_out_{}", slug, i));
        let wiring = self.inner.wiring(classified, cells, Shape::Expand);
        Ok(into_group(wiring, &slug, Shape::Expand))
    }
}

/// N→N: one step per element of the group bound to `over`
#[derive(Debug, Clone)]
pub struct Vectorize {
    inner: StepFn,
    over: String,
}

impl Vectorize {
    pub fn slug(&self) -> &str {
        self.inner.slug()
    }

    pub fn call(&self, mut bindings: Bindings) -> Result<GroupWiring, BuildError> {
        let slug = self.inner.slug().to_string();
        let group = bindings
            .take(&self.over)
            .ok_or_else(|| BuildError::MissingArgument {
                slug: slug.clone(),
                param: self.over.clone(),
            })?;
        let members = members(&self.over, group)?;
        let common = self.inner.classify(bindings, &[self.over.as_str()])?;
        let outputs = vec![(RETURN.to_string(), self.inner.return_type())];

        let mut steps = Vec::new();
        let mut elements = Vec::new();
        let count = match &members {
            Members::Cells(ids) => ids.len(),
            Members::Literals(items) => items.len(),
        };
        for i in 0..count {
            let mut classified = Classified {
                inputs: common.inputs.clone(),
                config: common.config.clone(),
            };
            match &members {
                Members::Cells(ids) => {
                    classified.inputs.insert(self.over.clone(), ids[i]);
                }
                Members::Literals(items) => {
                    classified.config.insert(self.over.clone(), items[i].clone());
                }
            }
            let cells = self
                .inner
                .allocate(&outputs, |_| format!("{}_out_{}", slug, i));
            let wiring = self.inner.wiring(classified, cells, Shape::Vectorize);
            if let Some(cell) = wiring.output() {
                elements.push(cell.clone());
            }
            steps.push(wiring.into_step());
        }

        Ok(GroupWiring::new(
            steps,
            elements,
            format!("{}_group", slug),
            Shape::Vectorize,
        ))
    }
}

/// N→M: group parameters in, `out_count` element cells out
#[derive(Debug, Clone)]
pub struct Reshape {
    inner: StepFn,
    over: Vec<String>,
}

impl Reshape {
    pub fn slug(&self) -> &str {
        self.inner.slug()
    }

    pub fn call(
        &self,
        mut bindings: Bindings,
        out_count: usize,
    ) -> Result<GroupWiring, BuildError> {
        if out_count == 0 {
            return Err(BuildError::type_mismatch("out_count", "at least one output", "0"));
        }
        let slug = self.inner.slug().to_string();
        let (group_inputs, group_config) = flatten_groups(&slug, &self.over, &mut bindings)?;
        let skip: Vec<&str> = self.over.iter().map(String::as_str).collect();
        let mut classified = self.inner.classify(bindings, &skip)?;
        classified.inputs.extend(group_inputs);
        classified.config.extend(group_config);

        let outputs = indexed_outputs(out_count, &self.inner.return_type());
        let cells = self
            .inner
            .allocate(&outputs, |i| format!("{}_out_{}", slug, i));
        let wiring = self.inner.wiring(classified, cells, Shape::Reshape);
        Ok(into_group(wiring, &slug, Shape::Reshape))
    }
}

/// N→1: a group collapsed into a single output
#[derive(Debug, Clone)]
pub struct Summarize {
    inner: StepFn,
    over: String,
}

impl Summarize {
    pub fn slug(&self) -> &str {
        self.inner.slug()
    }

    pub fn call(&self, mut bindings: Bindings) -> Result<StepWiring, BuildError> {
        let slug = self.inner.slug().to_string();
        let over = [self.over.clone()];
        let (group_inputs, group_config) = flatten_groups(&slug, &over, &mut bindings)?;
        let mut classified = self.inner.classify(bindings, &[self.over.as_str()])?;
        classified.inputs.extend(group_inputs);
        classified.config.extend(group_config);

        let outputs = vec![(RETURN.to_string(), self.inner.return_type())];
        let cells = self.inner.allocate(&outputs, |_| format!("{}_out", slug));
        Ok(self.inner.wiring(classified, cells, Shape::Summarize))
    }
}

/// Group the index-named outputs of a single step
fn into_group(wiring: StepWiring, slug: &str, shape: Shape) -> GroupWiring {
    let mut indexed: Vec<(usize, Cell)> = wiring
        .outputs()
        .iter()
        .filter_map(|(name, cell)| name.parse::<usize>().ok().map(|i| (i, cell.clone())))
        .collect();
    indexed.sort_by_key(|(i, _)| *i);
    let elements = indexed.into_iter().map(|(_, cell)| cell).collect();
    GroupWiring::new(
        vec![wiring.into_step()],
        elements,
        format!("{}_group", slug),
        shape,
    )
}
