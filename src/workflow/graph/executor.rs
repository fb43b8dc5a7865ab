// SPDX-License-Identifier: MIT

//! Workflow executor

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::config::{ArgumentPrecedence, EngineConfig, ExecutionOrder};
use super::order;
use crate::cell::{Cell, CellId};
use crate::error::{RunError, StoreError};
use crate::function::{Arguments, RETURN};
use crate::store::Store;
use crate::workflow::registry::FunctionRegistry;
use crate::workflow::types::{Step, Workflow};

/// Every cell available after a run, keyed by id
#[derive(Debug, Clone, Default)]
pub struct Context {
    cells: HashMap<CellId, Cell>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cell under its own id, replacing any previous cell
    pub fn insert(&mut self, cell: Cell) {
        self.cells.insert(cell.id, cell);
    }

    pub fn get(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.cells.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &CellId> {
        self.cells.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellId, &Cell)> {
        self.cells.iter()
    }

    /// Resolve the cell with this id through `store`; `None` if it is not in the context
    pub fn value_of(&self, id: &CellId, store: &dyn Store) -> Result<Option<Value>, StoreError> {
        self.cells.get(id).map(|cell| store.resolve(cell)).transpose()
    }

    pub fn into_inner(self) -> HashMap<CellId, Cell> {
        self.cells
    }
}

impl FromIterator<Cell> for Context {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(|cell| (cell.id, cell)).collect(),
        }
    }
}

/// Runs workflows against a store and a function catalog
pub struct Engine {
    store: Arc<dyn Store>,
    registry: FunctionRegistry,
    config: EngineConfig,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, registry: FunctionRegistry) -> Self {
        Self {
            store,
            registry,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Execute every step once and return the initial cells plus every
    /// produced cell. Stops at the first failing step.
    pub fn run(
        &self,
        workflow: &Workflow,
        initial_cells: impl IntoIterator<Item = Cell>,
    ) -> Result<Context, RunError> {
        let mut context: Context = initial_cells.into_iter().collect();
        log::info!(
            "Running workflow '{}' ({} steps, {} initial cells)",
            workflow.name,
            workflow.len(),
            context.len()
        );

        self.run_steps(workflow, &mut context).map_err(|e| {
            log::error!("Workflow '{}' failed: {}", workflow.name, e);
            e
        })?;

        log::info!(
            "Workflow '{}' completed with {} cells",
            workflow.name,
            context.len()
        );
        Ok(context)
    }

    fn run_steps(&self, workflow: &Workflow, context: &mut Context) -> Result<(), RunError> {
        let order: Vec<usize> = match self.config.order {
            ExecutionOrder::Stored => (0..workflow.len()).collect(),
            ExecutionOrder::Topological => {
                let available: HashSet<CellId> = context.ids().copied().collect();
                order::plan(workflow, &available)?
            }
        };

        for index in order {
            self.execute_step(&workflow.steps[index], context)?;
        }
        Ok(())
    }

    fn execute_step(&self, step: &Step, context: &mut Context) -> Result<(), RunError> {
        log::debug!("Executing step '{}' ({})", step.function_slug, step.step_id);

        let mut resolved = Map::new();
        for (param, cell_id) in &step.inputs {
            let cell = context
                .get(cell_id)
                .ok_or_else(|| RunError::MissingInputCell {
                    step_id: step.step_id,
                    slug: step.function_slug.clone(),
                    param: param.clone(),
                    cell_id: *cell_id,
                })?;
            let value = self.store.resolve(cell).map_err(|e| match e {
                StoreError::DataNotFound { uri } => RunError::DataNotFound {
                    step_id: step.step_id,
                    cell_id: *cell_id,
                    uri,
                },
                other => RunError::Store {
                    step_id: step.step_id,
                    source: other,
                },
            })?;
            resolved.insert(param.clone(), value);
        }

        let args = self.merge_arguments(step, resolved)?;

        let def = self
            .registry
            .get(&step.function_slug)
            .ok_or_else(|| RunError::UnknownFunction {
                step_id: step.step_id,
                slug: step.function_slug.clone(),
            })?;

        let result = def
            .execute(&args)
            .map_err(|source| RunError::StepExecution {
                step_id: step.step_id,
                slug: step.function_slug.clone(),
                source,
            })?;

        let mut produced = interpret(step, result);
        for (name, target) in &step.outputs {
            let Some(value) = produced.remove(name) else {
                log::warn!(
                    "Step '{}' ({}) produced no value for output '{}'",
                    step.function_slug,
                    step.step_id,
                    name
                );
                continue;
            };
            let alias = format!("{}::{}", step.function_slug, name);
            let cell = self
                .store
                .put(value, &alias)
                .map_err(|source| RunError::Store {
                    step_id: step.step_id,
                    source,
                })?
                .with_id(*target);
            context.insert(cell);
        }
        if !produced.is_empty() {
            log::warn!(
                "Step '{}' ({}) returned undeclared outputs {:?}; they are dropped",
                step.function_slug,
                step.step_id,
                produced.keys().collect::<Vec<_>>()
            );
        }
        Ok(())
    }

    /// Combine resolved inputs with the step's config per the precedence policy
    fn merge_arguments(
        &self,
        step: &Step,
        resolved: Map<String, Value>,
    ) -> Result<Arguments, RunError> {
        let mut args = Arguments::from(resolved);
        for (name, value) in &step.config {
            if !args.contains(name) {
                args.insert(name.clone(), value.clone());
                continue;
            }
            match self.config.precedence {
                ArgumentPrecedence::Config => {
                    args.insert(name.clone(), value.clone());
                }
                ArgumentPrecedence::Input => {}
                ArgumentPrecedence::Reject => {
                    return Err(RunError::ArgumentCollision {
                        step_id: step.step_id,
                        slug: step.function_slug.clone(),
                        param: name.clone(),
                    })
                }
            }
        }
        Ok(args)
    }
}

/// An object whose keys hit a declared output name is a multi-output
/// result; anything else is the `return` value
fn interpret(step: &Step, result: Value) -> Map<String, Value> {
    match result {
        Value::Object(map) if map.keys().any(|k| step.outputs.contains_key(k)) => map,
        other => {
            let mut map = Map::new();
            map.insert(RETURN.to_string(), other);
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::StorageKind;
    use crate::function::FunctionDef;
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::error::Error as _;
    use uuid::Uuid;

    fn registry() -> FunctionRegistry {
        let registry = FunctionRegistry::new();
        registry.register(FunctionDef::new("math.add").with_executable(|args: &Arguments| {
            Ok(json!(args.get::<i64>("a")? + args.get::<i64>("b")?))
        }));
        registry.register(
            FunctionDef::new("split")
                .with_output("evens", "list")
                .with_output("odds", "list")
                .with_executable(|args: &Arguments| {
                    let nums: Vec<i64> = args.get("nums")?;
                    let (evens, odds): (Vec<i64>, Vec<i64>) =
                        nums.into_iter().partition(|n| n % 2 == 0);
                    Ok(json!({"evens": evens, "odds": odds}))
                }),
        );
        registry.register(FunctionDef::new("fail").with_executable(|_: &Arguments| {
            Err("division by zero".into())
        }));
        registry
    }

    fn engine() -> (Arc<InMemoryStore>, Engine) {
        let store = Arc::new(InMemoryStore::new());
        let engine = Engine::new(store.clone(), registry());
        (store, engine)
    }

    #[test]
    fn test_undeclared_outputs_are_dropped() {
        let (store, engine) = engine();
        let nums = Cell::value(json!([1, 2, 3, 4]), "nums");
        let evens = Uuid::new_v4();

        let mut wf = Workflow::new("Partial");
        wf.add_step(
            Step::new("split")
                .with_input("nums", nums.id)
                .with_output("evens", evens),
        );

        let context = engine.run(&wf, vec![nums]).unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context.value_of(&evens, store.as_ref()).unwrap(), Some(json!([2, 4])));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_output_keeps_preallocated_id() {
        let (store, engine) = engine();
        let a = Cell::value(json!(10), "A");
        let out = Uuid::new_v4();

        let mut wf = Workflow::new("Add");
        wf.add_step(
            Step::new("math.add")
                .with_input("a", a.id)
                .with_config("b", json!(20))
                .with_output(RETURN, out),
        );

        let context = engine.run(&wf, vec![a]).unwrap();
        let cell = context.get(&out).unwrap();
        assert_eq!(cell.id, out);
        assert_eq!(cell.alias, "math.add::return");
        assert_eq!(cell.storage_kind(), StorageKind::Reference);
        assert_eq!(context.value_of(&out, store.as_ref()).unwrap(), Some(json!(30)));
        assert_eq!(context.len(), 2);
    }

    #[test]
    fn test_config_wins_by_default() {
        let (store, engine) = engine();
        let a = Cell::value(json!(1), "A");
        let b = Cell::value(json!(100), "B");
        let out = Uuid::new_v4();

        let mut wf = Workflow::new("Collide");
        wf.add_step(
            Step::new("math.add")
                .with_input("a", a.id)
                .with_input("b", b.id)
                .with_config("b", json!(5))
                .with_output(RETURN, out),
        );

        let context = engine.run(&wf, vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(context.value_of(&out, store.as_ref()).unwrap(), Some(json!(6)));

        let engine = Engine::new(store.clone(), registry())
            .with_config(EngineConfig::default().with_precedence(ArgumentPrecedence::Input));
        let context = engine.run(&wf, vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(context.value_of(&out, store.as_ref()).unwrap(), Some(json!(101)));

        let engine = Engine::new(store.clone(), registry())
            .with_config(EngineConfig::default().with_precedence(ArgumentPrecedence::Reject));
        let err = engine.run(&wf, vec![a, b]).unwrap_err();
        assert!(matches!(err, RunError::ArgumentCollision { ref param, .. } if param == "b"));
    }

    #[test]
    fn test_missing_input_cell() {
        let (_, engine) = engine();
        let missing = Uuid::new_v4();
        let mut wf = Workflow::new("Missing");
        wf.add_step(
            Step::new("math.add")
                .with_input("a", missing)
                .with_config("b", json!(1))
                .with_output(RETURN, Uuid::new_v4()),
        );

        let err = engine.run(&wf, Vec::new()).unwrap_err();
        assert!(matches!(err, RunError::MissingInputCell { cell_id, .. } if cell_id == missing));
    }

    #[test]
    fn test_reference_without_data() {
        let (_, engine) = engine();
        let dangling = Cell::reference("memory://gone", "Gone", "integer", Map::new());
        let mut wf = Workflow::new("Dangling");
        wf.add_step(
            Step::new("math.add")
                .with_input("a", dangling.id)
                .with_config("b", json!(1))
                .with_output(RETURN, Uuid::new_v4()),
        );

        let err = engine.run(&wf, vec![dangling]).unwrap_err();
        assert!(matches!(err, RunError::DataNotFound { ref uri, .. } if uri == "memory://gone"));
    }

    #[test]
    fn test_pending_input_is_a_store_error() {
        let (_, engine) = engine();
        let pending = Cell::pending("later", "int");
        let mut wf = Workflow::new("Pending");
        wf.add_step(
            Step::new("math.add")
                .with_input("a", pending.id)
                .with_config("b", json!(1))
                .with_output(RETURN, Uuid::new_v4()),
        );

        let err = engine.run(&wf, vec![pending]).unwrap_err();
        assert!(matches!(
            err,
            RunError::Store {
                source: StoreError::PendingCell { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_function() {
        let (_, engine) = engine();
        let mut wf = Workflow::new("Unknown");
        wf.add_step(Step::new("nope").with_output(RETURN, Uuid::new_v4()));

        let err = engine.run(&wf, Vec::new()).unwrap_err();
        assert!(matches!(err, RunError::UnknownFunction { ref slug, .. } if slug == "nope"));
    }

    #[test]
    fn test_step_failure_carries_cause() {
        let (_, engine) = engine();
        let mut wf = Workflow::new("Failing");
        let step = Step::new("fail").with_output(RETURN, Uuid::new_v4());
        let step_id = step.step_id;
        wf.add_step(step);

        let err = engine.run(&wf, Vec::new()).unwrap_err();
        match &err {
            RunError::StepExecution { step_id: id, slug, .. } => {
                assert_eq!(*id, step_id);
                assert_eq!(slug, "fail");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.source().unwrap().to_string(), "division by zero");
    }

    #[test]
    fn test_multi_output_result() {
        let (store, engine) = engine();
        let nums = Cell::value(json!([1, 2, 3, 4, 5]), "nums");
        let (evens, odds) = (Uuid::new_v4(), Uuid::new_v4());

        let mut wf = Workflow::new("Split");
        wf.add_step(Step {
            step_id: Uuid::new_v4(),
            function_slug: "split".to_string(),
            config: BTreeMap::new(),
            inputs: BTreeMap::from([("nums".to_string(), nums.id)]),
            outputs: BTreeMap::from([("evens".to_string(), evens), ("odds".to_string(), odds)]),
        });

        let context = engine.run(&wf, vec![nums]).unwrap();
        assert_eq!(context.value_of(&evens, store.as_ref()).unwrap(), Some(json!([2, 4])));
        assert_eq!(context.value_of(&odds, store.as_ref()).unwrap(), Some(json!([1, 3, 5])));
        assert_eq!(context.get(&odds).unwrap().alias, "split::odds");
    }

    #[test]
    fn test_absent_output_is_skipped() {
        let (_, engine) = engine();
        let nums = Cell::value(json!([2]), "nums");
        let (evens, extra) = (Uuid::new_v4(), Uuid::new_v4());

        let mut wf = Workflow::new("Partial");
        wf.add_step(
            Step::new("split")
                .with_input("nums", nums.id)
                .with_output("evens", evens)
                .with_output("extra", extra),
        );

        let context = engine.run(&wf, vec![nums]).unwrap();
        assert!(context.contains(&evens));
        assert!(!context.contains(&extra));
    }

    #[test]
    fn test_topological_order_runs_out_of_order_steps() {
        let (store, engine) = engine();
        let engine = Engine::new(store.clone(), engine.registry.clone())
            .with_config(EngineConfig::default().with_order(ExecutionOrder::Topological));
        let a = Cell::value(json!(1), "A");
        let (mid, out) = (Uuid::new_v4(), Uuid::new_v4());

        let mut wf = Workflow::new("Reversed");
        wf.add_step(
            Step::new("math.add")
                .with_input("a", mid)
                .with_config("b", json!(10))
                .with_output(RETURN, out),
        );
        wf.add_step(
            Step::new("math.add")
                .with_input("a", a.id)
                .with_config("b", json!(1))
                .with_output(RETURN, mid),
        );

        let context = engine.run(&wf, vec![a.clone()]).unwrap();
        assert_eq!(context.value_of(&out, store.as_ref()).unwrap(), Some(json!(12)));

        // The stored order trusts the workflow and fails on the first step
        let stored = Engine::new(store, registry());
        let err = stored.run(&wf, vec![a]).unwrap_err();
        assert!(matches!(err, RunError::MissingInputCell { .. }));
    }
}
