// SPDX-License-Identifier: MIT

//! Column-wise workflow construction
//!
//! `TabularBuilder` keeps a virtual table whose rows map column names to cell
//! ids. A column operation compiles into one step per row; the output column
//! holds the ids those steps will produce. Nothing is executed here.

use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::cell::{Cell, CellId};
use crate::error::{BuildError, FancyError};
use crate::function::RETURN;
use crate::workflow::registry::FunctionRegistry;
use crate::workflow::types::{Step, Workflow};

/// One row of the virtual table
pub type Row = BTreeMap<String, CellId>;

#[derive(Debug, Clone)]
pub struct TabularBuilder {
    workflow: Workflow,
    registry: FunctionRegistry,
    initial_cells: Vec<Cell>,
    rows: Vec<Row>,
    columns: Vec<String>,
}

impl TabularBuilder {
    pub fn new(name: impl Into<String>, registry: &FunctionRegistry) -> Self {
        Self {
            workflow: Workflow::new(name),
            registry: registry.clone(),
            initial_cells: Vec::new(),
            rows: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Seed a column with one VALUE cell per row, growing the table as needed
    pub fn load_column(&mut self, column: &str, values: impl IntoIterator<Item = Value>) {
        self.add_column(column);
        for (i, value) in values.into_iter().enumerate() {
            let cell = Cell::value(value, format!("{} row {}", column, i));
            if i >= self.rows.len() {
                self.rows.push(Row::new());
            }
            self.rows[i].insert(column.to_string(), cell.id);
            self.initial_cells.push(cell);
        }
    }

    /// Compile a column operation: for every row, wire `input_column` into
    /// parameter `param` of `function_slug` and record the result under
    /// `output_column`
    pub fn add_operation(
        &mut self,
        function_slug: &str,
        param: &str,
        input_column: &str,
        output_column: &str,
        config: BTreeMap<String, Value>,
    ) -> Result<(), BuildError> {
        if !self.registry.contains(function_slug) {
            return Err(BuildError::unknown_function(function_slug));
        }
        if let Some(row) = self.rows.iter().position(|r| !r.contains_key(input_column)) {
            return Err(BuildError::MissingColumn {
                row,
                column: input_column.to_string(),
            });
        }

        log::debug!(
            "Compiling '{}' on column '{}' -> '{}' over {} rows",
            function_slug,
            input_column,
            output_column,
            self.rows.len()
        );
        self.add_column(output_column);
        for row in &mut self.rows {
            let output_id = Uuid::new_v4();
            let step = Step {
                step_id: Uuid::new_v4(),
                function_slug: function_slug.to_string(),
                config: config.clone(),
                inputs: BTreeMap::from([(param.to_string(), row[input_column])]),
                outputs: BTreeMap::from([(RETURN.to_string(), output_id)]),
            };
            row.insert(output_column.to_string(), output_id);
            self.workflow.add_step(step);
        }
        Ok(())
    }

    fn add_column(&mut self, column: &str) {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
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

    /// Human-readable compile plan tracing the first row's cell ids
    pub fn plan(&self) -> String {
        let mut lines = vec![
            format!("Workflow compile plan: {}", self.workflow.name),
            format!("Total rows: {}", self.rows.len()),
            format!("Total steps: {}", self.workflow.len()),
        ];
        if let Some(first) = self.rows.first() {
            lines.push("First row:".to_string());
            for column in &self.columns {
                if let Some(id) = first.get(column) {
                    lines.push(format!("  {} -> {}", column, id));
                }
            }
        }
        lines.join("\n")
    }

    pub fn export_json(&self) -> Result<String, FancyError> {
        self.workflow.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{Arguments, FunctionDef};
    use serde_json::json;

    fn registry() -> FunctionRegistry {
        let registry = FunctionRegistry::new();
        registry.register(
            FunctionDef::new("add_five")
                .with_input("val", "int")
                .with_executable(|args: &Arguments| Ok(json!(args.get::<i64>("val")? + 5))),
        );
        registry
    }

    #[test]
    fn test_load_column_creates_initial_cells() {
        let mut table = TabularBuilder::new("Table", &registry());
        table.load_column("seed", vec![json!(10), json!(20), json!(30)]);

        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.initial_cells().len(), 3);
        assert_eq!(table.columns(), ["seed".to_string()]);
        assert_eq!(table.rows()[1]["seed"], table.initial_cells()[1].id);
    }

    #[test]
    fn test_add_operation_emits_one_step_per_row() {
        let mut table = TabularBuilder::new("Table", &registry());
        table.load_column("seed", vec![json!(10), json!(20)]);
        table
            .add_operation("add_five", "val", "seed", "boosted", BTreeMap::new())
            .unwrap();

        let wf = table.workflow();
        assert_eq!(wf.len(), 2);
        for (row, step) in table.rows().iter().zip(&wf.steps) {
            assert_eq!(step.inputs["val"], row["seed"]);
            assert_eq!(step.return_id(), Some(row["boosted"]));
        }
        assert!(table.plan().contains("boosted"));
    }

    #[test]
    fn test_unknown_function_and_missing_column() {
        let mut table = TabularBuilder::new("Table", &registry());
        table.load_column("seed", vec![json!(1), json!(2)]);
        table.load_column("extra", vec![json!(1)]);

        let err = table
            .add_operation("missing", "val", "seed", "out", BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownFunction { .. }));

        let err = table
            .add_operation("add_five", "val", "extra", "out", BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, BuildError::MissingColumn { row: 1, .. }));
        assert!(table.workflow().is_empty());
        assert!(!table.columns().contains(&"out".to_string()));
    }
}
