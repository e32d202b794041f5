//! Utilities
//!
//! Shared helpers: error types and cell addressing.

pub mod cell;
pub mod error;
