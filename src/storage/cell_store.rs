//! Backing-Store Cell API
//!
//! Cell-addressed key/value access to the tabular backing store. The real
//! transport (spreadsheet HTTP API, local file, whatever the host wires in)
//! lives behind the `CellStore` trait; the engine only reads and writes
//! string cell values.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::utils::cell::column_letter_to_index;
use crate::utils::error::{EngineError, EngineResult};

/// A single cell address: column letter plus 1-based row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    /// Column letter, e.g. "F" or "AA"
    pub column: String,
    /// Row number, 1-based
    pub row: u32,
}

impl CellRef {
    /// Create a cell reference, validating the column letter
    pub fn new(column: impl Into<String>, row: u32) -> EngineResult<Self> {
        let column = column.into();
        column_letter_to_index(&column)?;
        if row == 0 {
            return Err(EngineError::configuration("row numbers are 1-based"));
        }
        Ok(Self { column, row })
    }
}

impl std::fmt::Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// Cell-addressed backing-store transport
#[async_trait]
pub trait CellStore: Send + Sync {
    /// Read one cell's value; empty cells read as the empty string
    async fn read(
        &self,
        spreadsheet_id: &str,
        cell: &CellRef,
        sheet: Option<&str>,
    ) -> EngineResult<String>;

    /// Write one cell's value
    async fn write(
        &self,
        spreadsheet_id: &str,
        cell: &CellRef,
        value: &str,
        sheet: Option<&str>,
    ) -> EngineResult<()>;
}

/// In-memory cell store for tests and transport-less embedding
#[derive(Debug, Default)]
pub struct MemoryCellStore {
    cells: RwLock<HashMap<String, String>>,
}

impl MemoryCellStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn key(spreadsheet_id: &str, cell: &CellRef, sheet: Option<&str>) -> String {
        format!("{}/{}/{}", spreadsheet_id, sheet.unwrap_or(""), cell)
    }
}

#[async_trait]
impl CellStore for MemoryCellStore {
    async fn read(
        &self,
        spreadsheet_id: &str,
        cell: &CellRef,
        sheet: Option<&str>,
    ) -> EngineResult<String> {
        let cells = self.cells.read().await;
        Ok(cells
            .get(&Self::key(spreadsheet_id, cell, sheet))
            .cloned()
            .unwrap_or_default())
    }

    async fn write(
        &self,
        spreadsheet_id: &str,
        cell: &CellRef,
        value: &str,
        sheet: Option<&str>,
    ) -> EngineResult<()> {
        let mut cells = self.cells.write().await;
        cells.insert(Self::key(spreadsheet_id, cell, sheet), value.to_string());
        Ok(())
    }
}
