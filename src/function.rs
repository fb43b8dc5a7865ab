// SPDX-License-Identifier: MIT

//! Function definitions - the catalog entries behind workflow steps

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::FunctionError;

/// Name of the default output of a step
pub const RETURN: &str = "return";

/// Logic that can be invoked by the engine.
///
/// Implemented for any `Fn(&Arguments) -> Result<Value, FunctionError>`, so
/// plain closures can be registered directly.
pub trait Function: Send + Sync {
    /// Invoke the logic with keyword arguments
    fn call(&self, args: &Arguments) -> Result<Value, FunctionError>;
}

impl<F> Function for F
where
    F: Fn(&Arguments) -> Result<Value, FunctionError> + Send + Sync,
{
    fn call(&self, args: &Arguments) -> Result<Value, FunctionError> {
        self(args)
    }
}

/// Failure reading a keyword argument
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("Missing argument '{0}'")]
    Missing(String),

    #[error("Invalid argument '{name}': {source}")]
    Invalid {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Keyword arguments passed to a function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserialize an argument into a concrete type
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, ArgumentError> {
        let value = self
            .0
            .get(name)
            .ok_or_else(|| ArgumentError::Missing(name.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|source| ArgumentError::Invalid {
            name: name.to_string(),
            source,
        })
    }

    /// Raw argument value
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl From<Map<String, Value>> for Arguments {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Metadata for a registered capability, plus the code that runs it
#[derive(Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Parameter name -> type descriptor
    #[serde(default)]
    pub input_contract: BTreeMap<String, String>,
    /// Output name -> type descriptor
    #[serde(default)]
    pub output_contract: BTreeMap<String, String>,
    /// Literals applied as config when a parameter is left unbound
    #[serde(default)]
    pub defaults: BTreeMap<String, Value>,
    #[serde(skip)]
    executable: Option<Arc<dyn Function>>,
}

impl FunctionDef {
    /// Create a definition with no contract and no executable
    pub fn new(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            name: slug.clone(),
            slug,
            description: String::new(),
            input_contract: BTreeMap::new(),
            output_contract: BTreeMap::new(),
            defaults: BTreeMap::new(),
            executable: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, type_hint: impl Into<String>) -> Self {
        self.input_contract.insert(name.into(), type_hint.into());
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, type_hint: impl Into<String>) -> Self {
        self.output_contract.insert(name.into(), type_hint.into());
        self
    }

    pub fn with_default(mut self, name: impl Into<String>, value: Value) -> Self {
        self.defaults.insert(name.into(), value);
        self
    }

    /// Attach the code that runs this function
    pub fn with_executable<F>(mut self, executable: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        self.executable = Some(Arc::new(executable));
        self
    }

    pub(crate) fn with_shared_executable(mut self, executable: Arc<dyn Function>) -> Self {
        self.executable = Some(executable);
        self
    }

    pub fn has_executable(&self) -> bool {
        self.executable.is_some()
    }

    /// Run the attached executable
    pub fn execute(&self, args: &Arguments) -> Result<Value, FunctionError> {
        match &self.executable {
            Some(executable) => executable.call(args),
            None => Err(format!("Function {} has no executable attached", self.slug).into()),
        }
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("slug", &self.slug)
            .field("name", &self.name)
            .field("input_contract", &self.input_contract)
            .field("output_contract", &self.output_contract)
            .field("defaults", &self.defaults)
            .field("has_executable", &self.executable.is_some())
            .finish()
    }
}
