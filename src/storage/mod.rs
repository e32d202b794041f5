//! Storage
//!
//! Backing-store access. The engine treats the store as a cell-addressed
//! key/value surface and never parses cell contents beyond its own log
//! blocks.

pub mod cell_store;

pub use cell_store::{CellRef, CellStore, MemoryCellStore};
