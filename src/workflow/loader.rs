// SPDX-License-Identifier: MIT

//! Workflow loader - wire format loading and saving
//!
//! JSON is the wire format. YAML documents with the same shape are accepted
//! as well; the format is picked from the file extension.

use super::types::Workflow;
use crate::error::FancyError;
use std::fs;
use std::path::Path;

/// Loads and saves workflow definitions
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow from a `.json`, `.yaml` or `.yml` file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Workflow, FancyError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let workflow = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::parse_yaml(&content)?,
            _ => Self::parse_json(&content)?,
        };
        log::info!(
            "Loaded workflow '{}' with {} steps from {}",
            workflow.name,
            workflow.len(),
            path.display()
        );
        Ok(workflow)
    }

    /// Parse a workflow from a JSON string
    pub fn parse_json(content: &str) -> Result<Workflow, FancyError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a workflow from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Workflow, FancyError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Pretty JSON wire form
    pub fn to_json(workflow: &Workflow) -> Result<String, FancyError> {
        workflow.to_json()
    }

    /// Write the JSON wire form to `path`
    pub fn save<P: AsRef<Path>>(&self, workflow: &Workflow, path: P) -> Result<(), FancyError> {
        fs::write(path.as_ref(), Self::to_json(workflow)?)?;
        log::debug!("Saved workflow '{}' to {}", workflow.name, path.as_ref().display());
        Ok(())
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}
