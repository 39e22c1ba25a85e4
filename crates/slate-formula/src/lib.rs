//! # slate-formula
//!
//! Safe formula parsing and evaluation for Slate's spreadsheet subsystem.
//!
//! Cell content is untrusted input: the sheet file can be edited outside
//! the program. The engine therefore never executes anything outside a
//! closed grammar and an allow-listed function registry — formulas are
//! parsed into a typed AST and walked by an interpreter with no escape
//! hatches.
//!
//! ## Example
//!
//! ```rust
//! use slate_formula::{CellMap, FormulaEngine};
//!
//! let mut cells = CellMap::new();
//! cells.insert("A1".to_string(), "10".to_string());
//! cells.insert("B1".to_string(), "5".to_string());
//!
//! let engine = FormulaEngine::new();
//! assert_eq!(engine.evaluate_display("=A1+B1", &cells), "15.0");
//! assert_eq!(engine.evaluate_display("=SUM(A1:B1)*2", &cells), "30.0");
//! assert_eq!(engine.evaluate_display("=A1=B1", &cells), "False");
//! ```

pub mod ast;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

// Re-exports for convenience
pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use dependency::{extract_references, references_of, DependencyGraph};
pub use engine::FormulaEngine;
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{CellMap, EvaluationContext, Value};
pub use functions::{FunctionDef, FunctionRegistry};
pub use parser::parse_formula;
