//! Persisted sheet documents
//!
//! Slate stores each sheet as a JSON document keyed by A1-style addresses.
//! The current format wraps the cell map in a `cells` key alongside layout
//! sidecars; older documents were a bare address-to-content map.

use crate::cell::CellAddress;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A sheet document as persisted to disk
///
/// Cell contents are raw strings: either a literal (number, text, date) or a
/// formula starting with `=`. The formula engine receives the whole map and
/// resolves references against it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SheetDocument {
    /// Cell contents keyed by A1-style address
    #[serde(default)]
    pub cells: HashMap<String, String>,

    /// Column widths keyed by column letters (layout only, not evaluated)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub column_widths: HashMap<String, u32>,

    /// Row heights keyed by row number (layout only, not evaluated)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub row_heights: HashMap<String, u32>,

    /// Per-cell formatting keyed by A1-style address (opaque to the engine)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cell_formatting: HashMap<String, JsonValue>,
}

impl SheetDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from its JSON form
    ///
    /// Accepts both the current format (an object with a `cells` key) and
    /// the legacy format (a bare map from address to content).
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)?;

        let obj = value
            .as_object()
            .ok_or_else(|| Error::InvalidDocument("expected a JSON object".into()))?;

        if obj.contains_key("cells") {
            return Ok(serde_json::from_value(value)?);
        }

        // Legacy format: every value must be a string for this to be a cell map
        let mut cells = HashMap::with_capacity(obj.len());
        for (key, val) in obj {
            let content = val.as_str().ok_or_else(|| {
                Error::InvalidDocument(format!("cell '{}' is not a string", key))
            })?;
            cells.insert(key.clone(), content.to_string());
        }

        Ok(Self {
            cells,
            ..Self::default()
        })
    }

    /// Serialize the document to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Get the raw content of a cell, if present
    pub fn get(&self, addr: &CellAddress) -> Option<&str> {
        self.cells.get(&addr.to_a1_string()).map(String::as_str)
    }

    /// Set the raw content of a cell
    ///
    /// An empty string removes the cell from the map.
    pub fn set(&mut self, addr: CellAddress, content: impl Into<String>) {
        let content = content.into();
        let key = addr.to_a1_string();
        if content.is_empty() {
            self.cells.remove(&key);
        } else {
            self.cells.insert(key, content);
        }
    }

    /// Iterate over the addresses of all formula cells (content starts with `=`)
    pub fn formula_cells(&self) -> impl Iterator<Item = (CellAddress, &str)> {
        self.cells.iter().filter_map(|(key, content)| {
            if content.starts_with('=') {
                CellAddress::parse(key).ok().map(|addr| (addr, content.as_str()))
            } else {
                None
            }
        })
    }

    /// Number of non-empty cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the document has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
