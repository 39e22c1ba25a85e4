//! # slate-core
//!
//! Core data structures for Slate's spreadsheet subsystem.
//!
//! This crate provides the types shared between the formula engine and the
//! hosting UI:
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and ranges
//! - [`SheetDocument`] - The persisted per-sheet JSON document
//!
//! ## Example
//!
//! ```rust
//! use slate_core::CellAddress;
//!
//! let addr = CellAddress::parse("B12").unwrap();
//! assert_eq!(addr.row, 11);
//! assert_eq!(addr.col, 1);
//! assert_eq!(addr.to_a1_string(), "B12");
//! ```

pub mod cell;
pub mod error;
pub mod sheet;

// Re-exports for convenience
pub use cell::{CellAddress, CellRange};
pub use error::{Error, Result};
pub use sheet::SheetDocument;

/// Maximum number of rows in a sheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a sheet
pub const MAX_COLS: u32 = 16_384;
