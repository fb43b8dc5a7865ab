// SPDX-License-Identifier: MIT

//! Workflow graph definitions
//!
//! These are the serialized shapes other tools exchange. Field names are the
//! wire contract; maps are ordered so the same workflow always serializes to
//! the same text.

use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::cell::CellId;
use crate::error::FancyError;
use crate::function::RETURN;

/// A configured invocation of a registered function
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Step {
    /// Unique identifier for this step
    #[serde(default = "Uuid::new_v4")]
    pub step_id: Uuid,
    /// Slug of the function in the catalog
    pub function_slug: String,
    /// Static parameters, passed as literal arguments
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    /// Parameter name -> id of the cell that feeds it
    #[serde(default)]
    pub inputs: BTreeMap<String, CellId>,
    /// Output name (e.g. "return") -> id pre-allocated for the result
    #[serde(default)]
    pub outputs: BTreeMap<String, CellId>,
}

impl Step {
    /// Create a step with a fresh id and no wiring
    pub fn new(function_slug: impl Into<String>) -> Self {
        Self {
            step_id: Uuid::new_v4(),
            function_slug: function_slug.into(),
            config: BTreeMap::new(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, cell_id: CellId) -> Self {
        self.inputs.insert(name.into(), cell_id);
        self
    }

    pub fn with_config(mut self, name: impl Into<String>, value: Value) -> Self {
        self.config.insert(name.into(), value);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, cell_id: CellId) -> Self {
        self.outputs.insert(name.into(), cell_id);
        self
    }

    /// Id pre-allocated for the default output
    pub fn return_id(&self) -> Option<CellId> {
        self.outputs.get(RETURN).copied()
    }
}

/// An ordered sequence of steps to be executed
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct Workflow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step; order is the execution order
    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn step(&self, step_id: Uuid) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, FancyError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reconstruct from JSON
    pub fn from_json(json: &str) -> Result<Self, FancyError> {
        Ok(serde_json::from_str(json)?)
    }

    /// JSON schema of the wire shape
    pub fn json_schema() -> RootSchema {
        schemars::schema_for!(Workflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Workflow {
        let source = Uuid::new_v4();
        let middle = Uuid::new_v4();

        let mut wf = Workflow::new("Chain");
        wf.add_step(
            Step::new("math.add")
                .with_input("a", source)
                .with_config("b", json!(10))
                .with_output(RETURN, middle),
        );
        wf.add_step(
            Step::new("str.prefix")
                .with_input("text", middle)
                .with_config("prefix", json!({"nested": [1, "two", true]}))
                .with_output(RETURN, Uuid::new_v4()),
        );
        wf
    }

    #[test]
    fn test_json_round_trip() {
        let wf = sample();
        let json = wf.to_json().unwrap();
        let loaded = Workflow::from_json(&json).unwrap();

        assert_eq!(loaded, wf);
        assert_eq!(loaded.to_json().unwrap(), json);
    }

    #[test]
    fn test_wire_field_names() {
        let wf = sample();
        let value = serde_json::to_value(&wf).unwrap();

        assert_eq!(value["id"], wf.id.to_string());
        assert_eq!(value["name"], "Chain");
        let step = &value["steps"][0];
        assert_eq!(step["function_slug"], "math.add");
        assert_eq!(step["config"]["b"], 10);
        assert!(step["step_id"].is_string());
        assert!(step["inputs"]["a"].is_string());
        assert!(step["outputs"]["return"].is_string());
    }

    #[test]
    fn test_step_defaults_when_fields_missing() {
        let json = r#"{"name": "Minimal", "steps": [{"function_slug": "noop"}]}"#;
        let wf = Workflow::from_json(json).unwrap();

        assert_eq!(wf.len(), 1);
        assert!(wf.steps[0].inputs.is_empty());
        assert!(wf.steps[0].config.is_empty());
        assert!(wf.steps[0].return_id().is_none());
    }

    #[test]
    fn test_step_lookup() {
        let wf = sample();
        let id = wf.steps[1].step_id;
        assert_eq!(wf.step(id).unwrap().function_slug, "str.prefix");
        assert!(wf.step(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_json_schema_lists_wire_fields() {
        let schema = serde_json::to_value(Workflow::json_schema()).unwrap();
        let props = &schema["properties"];
        assert!(props.get("id").is_some());
        assert!(props.get("name").is_some());
        assert!(props.get("steps").is_some());
    }
}
