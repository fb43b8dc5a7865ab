// SPDX-License-Identifier: MIT

//! Cells - the identity-stable data units flowing through a workflow
//!
//! A cell pairs a stable id with exactly one payload form:
//! - `VALUE` - the value held inline
//! - `REFERENCE` - a store URI plus a lightweight metadata cache
//! - `COMPOSITE` - an ordered sequence or named mapping of other cell ids
//! - `PENDING` - no payload; a placeholder for a step output not yet computed

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identifier of a cell
pub type CellId = Uuid;

/// Type hint used when nothing more specific is known
pub const ANY_TYPE: &str = "Any";

/// Type hint carried by composite cells
pub const COMPOSITE_TYPE: &str = "Composite";

/// How a cell's payload is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageKind {
    Value,
    Reference,
    Composite,
    Pending,
}

/// Structural grouping of other cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Composite {
    /// Ordered children
    Sequence(Vec<CellId>),
    /// Named children
    Mapping(BTreeMap<String, CellId>),
}

impl Composite {
    /// Number of children
    pub fn len(&self) -> usize {
        match self {
            Composite::Sequence(ids) => ids.len(),
            Composite::Mapping(ids) => ids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Child ids in order (mappings are ordered by key)
    pub fn ids(&self) -> Vec<CellId> {
        match self {
            Composite::Sequence(ids) => ids.clone(),
            Composite::Mapping(ids) => ids.values().copied().collect(),
        }
    }

    /// The unresolved id structure as a JSON value
    pub fn to_value(&self) -> Value {
        match self {
            Composite::Sequence(ids) => {
                Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
            }
            Composite::Mapping(ids) => Value::Object(
                ids.iter()
                    .map(|(name, id)| (name.clone(), Value::String(id.to_string())))
                    .collect(),
            ),
        }
    }
}

/// The active payload of a cell, tagged by `storage_kind` on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "storage_kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    Value {
        value: Value,
    },
    Reference {
        reference_uri: String,
        #[serde(default)]
        reference_meta: Map<String, Value>,
    },
    Composite {
        children: Composite,
    },
    Pending,
}

/// The atomic unit of data in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Stable identifier
    pub id: CellId,
    /// Human-readable label (e.g. "Training Set")
    pub alias: String,
    /// Descriptor of the data type
    #[serde(default = "default_type_hint")]
    pub type_hint: String,
    /// Payload, exclusive by storage kind
    #[serde(flatten)]
    pub payload: Payload,
}

fn default_type_hint() -> String {
    ANY_TYPE.to_string()
}

impl Cell {
    /// VALUE cell with a type hint inferred from the value
    pub fn value(value: Value, alias: impl Into<String>) -> Self {
        let type_hint = type_hint_of(&value).to_string();
        Self::value_with_hint(value, alias, type_hint)
    }

    /// VALUE cell with an explicit type hint
    pub fn value_with_hint(
        value: Value,
        alias: impl Into<String>,
        type_hint: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: alias.into(),
            type_hint: type_hint.into(),
            payload: Payload::Value { value },
        }
    }

    /// REFERENCE cell pointing into a store
    pub fn reference(
        uri: impl Into<String>,
        alias: impl Into<String>,
        type_hint: impl Into<String>,
        meta: Map<String, Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: alias.into(),
            type_hint: type_hint.into(),
            payload: Payload::Reference {
                reference_uri: uri.into(),
                reference_meta: meta,
            },
        }
    }

    /// COMPOSITE cell grouping other cells
    pub fn composite(children: Composite, alias: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: alias.into(),
            type_hint: COMPOSITE_TYPE.to_string(),
            payload: Payload::Composite { children },
        }
    }

    /// PENDING placeholder for a future step output
    pub fn pending(alias: impl Into<String>, type_hint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: alias.into(),
            type_hint: type_hint.into(),
            payload: Payload::Pending,
        }
    }

    /// The same cell under another id
    pub fn with_id(self, id: CellId) -> Self {
        Self { id, ..self }
    }

    pub fn storage_kind(&self) -> StorageKind {
        match self.payload {
            Payload::Value { .. } => StorageKind::Value,
            Payload::Reference { .. } => StorageKind::Reference,
            Payload::Composite { .. } => StorageKind::Composite,
            Payload::Pending => StorageKind::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.payload, Payload::Pending)
    }

    /// Children of a COMPOSITE cell
    pub fn children(&self) -> Option<&Composite> {
        match &self.payload {
            Payload::Composite { children } => Some(children),
            _ => None,
        }
    }

    /// URI of a REFERENCE cell
    pub fn reference_uri(&self) -> Option<&str> {
        match &self.payload {
            Payload::Reference { reference_uri, .. } => Some(reference_uri),
            _ => None,
        }
    }
}

/// Infer a type hint from the JSON kind of a value
pub fn type_hint_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_cell_infers_type_hint() {
        let cell = Cell::value(json!([1, 2, 3]), "Raw Numbers");
        assert_eq!(cell.storage_kind(), StorageKind::Value);
        assert_eq!(cell.type_hint, "array");
        assert_eq!(cell.alias, "Raw Numbers");

        assert_eq!(Cell::value(json!(3), "n").type_hint, "integer");
        assert_eq!(Cell::value(json!(2.5), "x").type_hint, "number");
    }

    #[test]
    fn test_with_id_keeps_payload() {
        let cell = Cell::value(json!("hello"), "greeting");
        let target = Uuid::new_v4();
        let moved = cell.clone().with_id(target);

        assert_eq!(moved.id, target);
        assert_eq!(moved.payload, cell.payload);
        assert_eq!(moved.alias, cell.alias);
    }

    #[test]
    fn test_pending_cell_has_no_payload() {
        let cell = Cell::pending("add_out", "int");
        assert!(cell.is_pending());
        assert!(cell.children().is_none());
        assert!(cell.reference_uri().is_none());
    }

    #[test]
    fn test_composite_to_value_keeps_ids_unresolved() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let seq = Composite::Sequence(vec![a, b]);
        assert_eq!(seq.to_value(), json!([a.to_string(), b.to_string()]));
        assert_eq!(seq.ids(), vec![a, b]);

        let mut named = BTreeMap::new();
        named.insert("left".to_string(), a);
        let map = Composite::Mapping(named);
        assert_eq!(map.to_value(), json!({"left": a.to_string()}));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_cell_wire_shape() {
        let cell = Cell::reference("memory://abc", "data", "array", Map::new());
        let json = serde_json::to_value(&cell).unwrap();

        assert_eq!(json["storage_kind"], "REFERENCE");
        assert_eq!(json["reference_uri"], "memory://abc");
        assert_eq!(json["id"], cell.id.to_string());

        let pending = serde_json::to_value(Cell::pending("p", "Any")).unwrap();
        assert_eq!(pending["storage_kind"], "PENDING");
        assert!(pending.get("value").is_none());
    }

    #[test]
    fn test_cell_deserialize() {
        let id = Uuid::new_v4();
        let child = Uuid::new_v4();
        let json = json!({
            "id": id.to_string(),
            "alias": "group",
            "storage_kind": "COMPOSITE",
            "children": [child.to_string()]
        });

        let cell: Cell = serde_json::from_value(json).unwrap();
        assert_eq!(cell.id, id);
        assert_eq!(cell.type_hint, ANY_TYPE);
        assert_eq!(cell.children(), Some(&Composite::Sequence(vec![child])));
    }
}
