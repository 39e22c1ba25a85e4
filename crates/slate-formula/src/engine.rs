//! Formula engine orchestrator
//!
//! The single entry point the hosting UI talks to: hand it raw cell content
//! and a cell map, get back a value or a display string. Faults never escape
//! past [`FormulaEngine::evaluate_display`]; they collapse into the `#ERROR`
//! sentinel there.

use crate::dependency::DependencyGraph;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{CellMap, EvaluationContext, Value};
use crate::parser::parse_formula;
use slate_core::SheetDocument;
use std::collections::HashMap;

/// The formula engine
///
/// Stateless: each evaluation is a pure function of `(content, cells)`,
/// modulo the clock behind TODAY/NOW.
#[derive(Debug, Default)]
pub struct FormulaEngine;

impl FormulaEngine {
    /// Create a new engine
    pub fn new() -> Self {
        Self
    }

    /// Evaluate raw cell content against a cell map
    ///
    /// Content without a leading `=` is returned unchanged as text. This is
    /// the tagged-result API; use [`evaluate_display`](Self::evaluate_display)
    /// at the UI boundary.
    pub fn evaluate(&self, content: &str, cells: &CellMap) -> FormulaResult<Value> {
        let trimmed = content.trim();
        if !trimmed.starts_with('=') {
            return Ok(Value::String(content.to_string()));
        }

        let expr = parse_formula(trimmed)?;
        let ctx = EvaluationContext::new(cells);
        ctx.evaluate(&expr)
    }

    /// Evaluate to a display string; faults become the `#ERROR` sentinel
    pub fn evaluate_display(&self, content: &str, cells: &CellMap) -> String {
        match self.evaluate(content, cells) {
            Ok(value) => value.to_display_string(),
            Err(e) => sentinel(&e),
        }
    }

    /// Recalculate every formula cell of a document
    ///
    /// Builds the pass's dependency graph, orders the formula cells so
    /// precedents evaluate first, and shares one memoized context across
    /// the pass. Cells on a reference cycle get the circular reference
    /// sentinel. Returns display strings keyed by A1-style address.
    pub fn recalculate(&self, doc: &SheetDocument) -> HashMap<String, String> {
        let cells = &doc.cells;
        let graph = DependencyGraph::from_cells(cells);
        let (order, cyclic) = graph.evaluation_order();

        let mut results = HashMap::with_capacity(order.len() + cyclic.len());

        for addr in cyclic {
            let key = addr.to_a1_string();
            log::debug!("cell {} is on a reference cycle", key);
            results.insert(
                key.clone(),
                sentinel(&FormulaError::CircularReference(key)),
            );
        }

        let ctx = EvaluationContext::new(cells);
        for addr in order {
            let key = addr.to_a1_string();
            let content = match cells.get(&key) {
                Some(content) => content,
                None => continue,
            };
            let display = match parse_formula(content).and_then(|expr| ctx.evaluate(&expr)) {
                Ok(value) => {
                    // Seed the memo so dependents reuse this result instead
                    // of evaluating the cell a second time
                    ctx.memoize(addr, &value);
                    value.to_display_string()
                }
                Err(e) => sentinel(&e),
            };
            results.insert(key, display);
        }

        results
    }
}

/// The UI-boundary error sentinel
fn sentinel(error: &FormulaError) -> String {
    format!("#ERROR: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cells(pairs: &[(&str, &str)]) -> CellMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_non_formula_content_unchanged() {
        let engine = FormulaEngine::new();
        let empty = CellMap::new();
        assert_eq!(engine.evaluate_display("hello", &empty), "hello");
        assert_eq!(engine.evaluate_display("10", &empty), "10");
        assert_eq!(engine.evaluate_display("", &empty), "");
    }

    #[test]
    fn test_addition_of_references() {
        let engine = FormulaEngine::new();
        let cells = cells(&[("A1", "10"), ("B1", "5")]);
        assert_eq!(engine.evaluate_display("=A1+B1", &cells), "15.0");
    }

    #[test]
    fn test_sum_over_range() {
        let engine = FormulaEngine::new();
        let cells = cells(&[("A1", "10"), ("A2", "20"), ("A3", "30")]);
        assert_eq!(
            engine.evaluate("=SUM(A1:A3)", &cells).unwrap(),
            Value::Number(60.0)
        );
        assert_eq!(engine.evaluate_display("=SUM(A1:A3)", &cells), "60.0");
    }

    #[test]
    fn test_sum_over_multi_column_range() {
        let engine = FormulaEngine::new();
        let cells = cells(&[("A1", "1"), ("B1", "2"), ("A2", "3"), ("B2", "4")]);
        assert_eq!(engine.evaluate_display("=SUM(A1:B2)", &cells), "10.0");
    }

    #[test]
    fn test_date_near_epoch() {
        let engine = FormulaEngine::new();
        let empty = CellMap::new();
        let result = engine.evaluate_display("=DATE(0)", &empty);
        assert!(
            result.contains("1970-01-01") || result.contains("1969-12-31"),
            "got: {}",
            result
        );
    }

    #[test]
    fn test_invalid_formula_is_sentinel() {
        let engine = FormulaEngine::new();
        let cells = cells(&[("A1", "5")]);
        let result = engine.evaluate_display("=invalid formula", &cells);
        assert!(result.starts_with("#ERROR"), "got: {}", result);
    }

    #[test]
    fn test_faulting_reference_coerces_to_zero() {
        let engine = FormulaEngine::new();
        let cells = cells(&[("B1", "=1/0")]);
        // The fault stays in B1; the reference resolves as 0
        assert_eq!(engine.evaluate_display("=B1+1", &cells), "1.0");
        // Evaluating B1 itself still surfaces the fault
        assert!(engine.evaluate_display("=1/0", &cells).starts_with("#ERROR"));
    }

    #[test]
    fn test_dangling_exponent_is_sentinel() {
        let engine = FormulaEngine::new();
        let empty = CellMap::new();
        let result = engine.evaluate_display("=2e", &empty);
        assert!(result.starts_with("#ERROR"), "got: {}", result);
    }

    #[test]
    fn test_lone_equals_is_equality() {
        let engine = FormulaEngine::new();
        let cells = cells(&[("A1", "10"), ("B1", "20")]);
        assert_eq!(engine.evaluate_display("=A1=B1", &cells), "False");
    }

    #[test]
    fn test_division_by_zero_is_sentinel() {
        let engine = FormulaEngine::new();
        let empty = CellMap::new();
        let result = engine.evaluate_display("=1/0", &empty);
        assert!(result.starts_with("#ERROR"), "got: {}", result);
    }

    #[test]
    fn test_disallowed_names_are_sentinel_never_executed() {
        let engine = FormulaEngine::new();
        let empty = CellMap::new();
        for formula in [
            "=__import__('os')",
            "=open('/etc/passwd')",
            "=a.b.c",
            "=exec('x')",
            "=bogus_name",
        ] {
            let result = engine.evaluate_display(formula, &empty);
            assert!(result.starts_with("#ERROR"), "{} got: {}", formula, result);
        }
    }

    #[test]
    fn test_determinism_without_clock_functions() {
        let engine = FormulaEngine::new();
        let cells = cells(&[("A1", "3"), ("A2", "=A1*7")]);
        let first = engine.evaluate_display("=A2+SUM(A1:A2)", &cells);
        let second = engine.evaluate_display("=A2+SUM(A1:A2)", &cells);
        assert_eq!(first, second);
    }

    #[test]
    fn test_recalculate_document() {
        let engine = FormulaEngine::new();
        let mut doc = SheetDocument::new();
        for (k, v) in [
            ("A1", "10"),
            ("A2", "=A1*2"),
            ("A3", "=A2+A1"),
            ("B1", "note"),
        ] {
            doc.cells.insert(k.to_string(), v.to_string());
        }

        let results = engine.recalculate(&doc);
        assert_eq!(results.len(), 2);
        assert_eq!(results["A2"], "20.0");
        assert_eq!(results["A3"], "30.0");
    }

    #[test]
    fn test_recalculate_flags_cycles() {
        let engine = FormulaEngine::new();
        let mut doc = SheetDocument::new();
        for (k, v) in [("A1", "=B1"), ("B1", "=A1"), ("C1", "=1+1")] {
            doc.cells.insert(k.to_string(), v.to_string());
        }

        let results = engine.recalculate(&doc);
        assert!(results["A1"].starts_with("#ERROR"));
        assert!(results["B1"].starts_with("#ERROR"));
        assert_eq!(results["C1"], "2.0");
    }

    #[test]
    fn test_leniency_scenarios() {
        let engine = FormulaEngine::new();
        let cells = cells(&[("A1", "10"), ("A2", "20"), ("B2", "5")]);
        assert_eq!(engine.evaluate_display("=IF(A1=10,A2,B2)", &cells), "20.0");
        // Faulted condition takes the false branch, not the sentinel
        assert_eq!(engine.evaluate_display("=IF(1/0,A2,B2)", &cells), "5.0");
    }

    #[test]
    fn test_boolean_display() {
        let engine = FormulaEngine::new();
        let empty = CellMap::new();
        assert_eq!(engine.evaluate_display("=5=5", &empty), "True");
        assert_eq!(engine.evaluate_display("=2^8", &empty), "256.0");
    }
}
