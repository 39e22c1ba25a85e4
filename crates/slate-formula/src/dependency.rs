//! Cell dependency tracking
//!
//! A recalculation pass builds a dependency graph over the formula cells,
//! topologically sorts it, and evaluates in that order so every referenced
//! cell is already memoized when its dependents run. Cells left over after
//! the sort sit on a reference cycle and get a circular reference fault
//! instead of recursing forever.

use crate::ast::Expr;
use crate::error::FormulaResult;
use crate::parser::parse_formula;
use ahash::AHashMap;
use slate_core::CellAddress;

/// Collect every cell a formula expression reads, with ranges expanded
pub fn extract_references(expr: &Expr) -> Vec<CellAddress> {
    let mut refs = Vec::new();
    collect_references(expr, &mut refs);
    refs
}

fn collect_references(expr: &Expr, refs: &mut Vec<CellAddress>) {
    match expr {
        Expr::CellRef(addr) => refs.push(*addr),
        Expr::RangeRef(range) => refs.extend(range.cells()),
        Expr::BinaryOp { left, right, .. } => {
            collect_references(left, refs);
            collect_references(right, refs);
        }
        Expr::UnaryOp { operand, .. } => collect_references(operand, refs),
        Expr::Function { args, .. } => {
            for arg in args {
                collect_references(arg, refs);
            }
        }
        Expr::Number(_) | Expr::String(_) | Expr::Boolean(_) | Expr::NameRef(_) => {}
    }
}

/// Parse a formula and collect its references
pub fn references_of(formula: &str) -> FormulaResult<Vec<CellAddress>> {
    Ok(extract_references(&parse_formula(formula)?))
}

/// Per-pass dependency graph over the formula cells of a sheet
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Formula cell -> cells it reads
    precedents: AHashMap<CellAddress, Vec<CellAddress>>,
}

impl DependencyGraph {
    /// Build the graph from a cell map
    ///
    /// Unparseable formulas contribute no edges; their fault surfaces when
    /// the cell itself is evaluated.
    pub fn from_cells(cells: &crate::evaluator::CellMap) -> Self {
        let mut graph = Self::default();

        for (key, content) in cells {
            if !content.starts_with('=') {
                continue;
            }
            let addr = match CellAddress::parse(key) {
                Ok(addr) => addr,
                Err(_) => continue,
            };
            let refs = references_of(content).unwrap_or_default();
            graph.add_cell(addr, refs);
        }

        graph
    }

    /// Record a formula cell and its precedents
    pub fn add_cell(&mut self, addr: CellAddress, refs: Vec<CellAddress>) {
        self.precedents.insert(addr, refs);
    }

    /// Cells read by the given formula cell
    pub fn precedents(&self, addr: &CellAddress) -> &[CellAddress] {
        self.precedents.get(addr).map_or(&[], Vec::as_slice)
    }

    /// Number of formula cells in the graph
    pub fn len(&self) -> usize {
        self.precedents.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.precedents.is_empty()
    }

    /// Topologically sort the formula cells
    ///
    /// Returns `(order, cyclic)`: `order` lists cells so that every cell
    /// comes after its formula precedents; `cyclic` holds the cells that
    /// could not be ordered because they participate in (or depend on) a
    /// reference cycle. Both are sorted deterministically within their
    /// constraints.
    pub fn evaluation_order(&self) -> (Vec<CellAddress>, Vec<CellAddress>) {
        // Only edges between formula cells constrain the order; literal
        // cells resolve on demand
        let mut in_degree: AHashMap<CellAddress, usize> = AHashMap::new();
        let mut dependents: AHashMap<CellAddress, Vec<CellAddress>> = AHashMap::new();

        for (&addr, refs) in &self.precedents {
            let degree = in_degree.entry(addr).or_insert(0);
            for r in refs {
                if *r != addr && self.precedents.contains_key(r) {
                    *degree += 1;
                    dependents.entry(*r).or_default().push(addr);
                } else if *r == addr {
                    // Self-reference is a one-cell cycle
                    *degree += 1;
                }
            }
        }

        let mut ready: Vec<CellAddress> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&addr, _)| addr)
            .collect();
        ready.sort();

        let mut order = Vec::with_capacity(self.precedents.len());
        while let Some(addr) = ready.pop() {
            order.push(addr);
            if let Some(deps) = dependents.get(&addr) {
                let mut released = Vec::new();
                for &dep in deps {
                    let degree = in_degree.entry(dep).or_insert(0);
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        released.push(dep);
                    }
                }
                released.sort();
                // Keep the ready stack sorted so output order is stable
                for dep in released {
                    ready.push(dep);
                }
                ready.sort();
            }
        }

        let mut cyclic: Vec<CellAddress> = in_degree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(addr, _)| addr)
            .collect();
        cyclic.sort();

        (order, cyclic)
    }
}
