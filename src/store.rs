// SPDX-License-Identifier: MIT

//! Cell storage
//!
//! A `Store` turns cells into values and values into cells. `put` always
//! offloads the value into the backend and hands back a REFERENCE cell;
//! `resolve` follows the reference, returns VALUE payloads inline and leaves
//! COMPOSITE groupings as their unresolved id structure.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

use crate::cell::{type_hint_of, Cell, Payload};
use crate::error::StoreError;

/// URI scheme used by `InMemoryStore`
pub const MEMORY_SCHEME: &str = "memory://";

/// Resolves cells to values and wraps values into cells
pub trait Store: Send + Sync {
    /// Return the concrete content of a cell
    fn resolve(&self, cell: &Cell) -> Result<Value, StoreError>;

    /// Persist a value and return a REFERENCE cell pointing at it
    fn put(&self, value: Value, alias: &str) -> Result<Cell, StoreError>;
}

/// Store that keeps every value in a map keyed by URI
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a URI has backing data
    pub fn contains(&self, uri: &str) -> bool {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(uri)
    }
}

impl Store for InMemoryStore {
    fn resolve(&self, cell: &Cell) -> Result<Value, StoreError> {
        match &cell.payload {
            Payload::Value { value } => Ok(value.clone()),
            Payload::Composite { children } => Ok(children.to_value()),
            Payload::Reference { reference_uri, .. } => {
                let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
                data.get(reference_uri)
                    .cloned()
                    .ok_or_else(|| StoreError::data_not_found(reference_uri.as_str()))
            }
            Payload::Pending => Err(StoreError::PendingCell { id: cell.id }),
        }
    }

    fn put(&self, value: Value, alias: &str) -> Result<Cell, StoreError> {
        let uri = format!("{}{}", MEMORY_SCHEME, Uuid::new_v4());
        let type_hint = type_hint_of(&value);
        let meta = describe(&value);

        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.insert(uri.clone(), value);

        log::debug!("Stored '{}' at {}", alias, uri);
        Ok(Cell::reference(uri, alias, type_hint, meta))
    }
}

/// Lightweight metadata cached on reference cells
fn describe(value: &Value) -> Map<String, Value> {
    let mut meta = Map::new();
    match value {
        Value::Array(items) => {
            meta.insert("length".to_string(), Value::from(items.len()));
        }
        Value::Object(fields) => {
            meta.insert("keys".to_string(), Value::from(fields.len()));
        }
        Value::String(s) => {
            meta.insert("length".to_string(), Value::from(s.chars().count()));
        }
        _ => {}
    }
    meta
}
