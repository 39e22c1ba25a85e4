//! Formula evaluator
//!
//! Evaluates formula ASTs to produce values. The evaluator owns cell
//! resolution: a referenced cell that contains a formula is evaluated
//! through the same machinery, with a per-pass memo table so shared
//! reference chains are computed once, and an in-flight set that turns
//! self- or mutually-referential cells into a structured circular
//! reference fault instead of unbounded recursion.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{self, FunctionImpl};
use crate::parser::parse_expression_text;
use ahash::{AHashMap, AHashSet};
use chrono::NaiveDate;
use slate_core::CellAddress;
use std::cell::RefCell;
use std::collections::HashMap;

/// Sparse cell map: A1-style address to raw content
pub type CellMap = HashMap<String, String>;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
}

impl Value {
    /// Convert to number for arithmetic; text is a fault, not a coercion
    pub fn to_number(&self) -> FormulaResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Boolean(true) => Ok(1.0),
            Value::Boolean(false) => Ok(0.0),
            Value::String(s) => Err(FormulaError::Evaluation(format!(
                "Cannot use text '{}' as a number",
                s
            ))),
        }
    }

    /// Convert to number if possible (aggregates skip values that aren't)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(true) => Some(1.0),
            Value::Boolean(false) => Some(0.0),
            Value::String(s) => s.trim().parse().ok(),
        }
    }

    /// Truthiness: nonzero number, non-empty string, boolean itself
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
        }
    }

    /// Format for display in a cell
    ///
    /// Integral numbers keep one decimal ("15.0"), non-integral numbers
    /// round to two ("2.5", "0.33"). Booleans display as "True"/"False".
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Number(n) => {
                if !n.is_finite() {
                    return n.to_string();
                }
                let rounded = (n * 100.0).round() / 100.0;
                if rounded.fract() == 0.0 {
                    format!("{:.1}", rounded)
                } else {
                    rounded.to_string()
                }
            }
            Value::String(s) => s.clone(),
            Value::Boolean(true) => "True".to_string(),
            Value::Boolean(false) => "False".to_string(),
        }
    }
}

/// Context for one evaluation pass over a cell map
///
/// The memo table and in-flight set live for the lifetime of the context,
/// so a context shared across a recalculation pass resolves each referenced
/// cell once.
pub struct EvaluationContext<'a> {
    cells: &'a CellMap,
    memo: RefCell<AHashMap<CellAddress, f64>>,
    in_flight: RefCell<AHashSet<CellAddress>>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context over a cell map
    pub fn new(cells: &'a CellMap) -> Self {
        Self {
            cells,
            memo: RefCell::new(AHashMap::new()),
            in_flight: RefCell::new(AHashSet::new()),
        }
    }

    /// Evaluate an expression to a value
    pub fn evaluate(&self, expr: &Expr) -> FormulaResult<Value> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean(*b)),

            Expr::CellRef(addr) => Ok(Value::Number(self.resolve_cell(*addr)?)),

            Expr::RangeRef(range) => Err(FormulaError::Evaluation(format!(
                "Range {} is only valid as a function argument",
                range
            ))),

            Expr::NameRef(name) => resolve_constant(name),

            Expr::UnaryOp { op, operand } => {
                let value = self.evaluate(operand)?.to_number()?;
                match op {
                    UnaryOperator::Negate => Ok(Value::Number(-value)),
                    UnaryOperator::Plus => Ok(Value::Number(value)),
                }
            }

            Expr::BinaryOp { op, left, right } => self.evaluate_binary(*op, left, right),

            Expr::Function { name, args } => self.call_function(name, args),
        }
    }

    /// Resolve a cell reference to a number
    ///
    /// Missing, empty, and non-numeric cells coerce to 0. Date-like content
    /// (YYYY-MM-DD) converts to days since the epoch. Formula content is
    /// evaluated recursively through the same context; a fault inside the
    /// referenced formula also coerces to 0 — reference faults never escape
    /// the resolver. Circular references are the one exception and surface
    /// as a structured fault.
    pub fn resolve_cell(&self, addr: CellAddress) -> FormulaResult<f64> {
        if let Some(&value) = self.memo.borrow().get(&addr) {
            return Ok(value);
        }

        let key = addr.to_a1_string();
        let content = match self.cells.get(&key) {
            Some(content) => content.clone(),
            None => {
                self.memo.borrow_mut().insert(addr, 0.0);
                return Ok(0.0);
            }
        };

        let value = if let Some(expr_text) = content.strip_prefix('=') {
            if !self.in_flight.borrow_mut().insert(addr) {
                return Err(FormulaError::CircularReference(key));
            }
            let result =
                parse_expression_text(expr_text).and_then(|expr| self.evaluate(&expr));
            self.in_flight.borrow_mut().remove(&addr);
            match result {
                Ok(value) => coerce_to_number(&value),
                Err(e @ FormulaError::CircularReference(_)) => return Err(e),
                Err(e) => {
                    log::debug!("referenced cell {} faulted, coercing to 0: {}", key, e);
                    0.0
                }
            }
        } else {
            coerce_literal(&content)
        };

        self.memo.borrow_mut().insert(addr, value);
        Ok(value)
    }

    /// Seed the memo table with an already-computed value for a cell
    ///
    /// A recalculation pass calls this after each top-level evaluation so
    /// dependents reuse the result instead of evaluating the cell again.
    pub fn memoize(&self, addr: CellAddress, value: &Value) {
        self.memo.borrow_mut().insert(addr, coerce_to_number(value));
    }

    /// Evaluate function arguments eagerly, expanding ranges in place
    pub fn eval_args(&self, args: &[Expr]) -> FormulaResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Expr::RangeRef(range) => {
                    for addr in range.cells() {
                        values.push(Value::Number(self.resolve_cell(addr)?));
                    }
                }
                _ => values.push(self.evaluate(arg)?),
            }
        }
        Ok(values)
    }

    fn call_function(&self, name: &str, args: &[Expr]) -> FormulaResult<Value> {
        let def = functions::registry()
            .get(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

        if args.len() < def.min_args || def.max_args.map_or(false, |max| args.len() > max) {
            return Err(FormulaError::ArgumentCount {
                function: name.to_string(),
                expected: def.arity_description(),
                actual: args.len(),
            });
        }

        match def.implementation {
            FunctionImpl::Eager(f) => {
                let values = self.eval_args(args)?;
                f(&values, self)
            }
            FunctionImpl::Lazy(f) => f(args, self),
        }
    }

    fn evaluate_binary(
        &self,
        op: BinaryOperator,
        left: &Expr,
        right: &Expr,
    ) -> FormulaResult<Value> {
        // and/or short-circuit and return the deciding operand's value
        match op {
            BinaryOperator::And => {
                let lhs = self.evaluate(left)?;
                if !lhs.is_truthy() {
                    return Ok(lhs);
                }
                return self.evaluate(right);
            }
            BinaryOperator::Or => {
                let lhs = self.evaluate(left)?;
                if lhs.is_truthy() {
                    return Ok(lhs);
                }
                return self.evaluate(right);
            }
            _ => {}
        }

        let lhs = self.evaluate(left)?;
        let rhs = self.evaluate(right)?;

        match op {
            BinaryOperator::Add => match (&lhs, &rhs) {
                (Value::String(a), Value::String(b)) => {
                    Ok(Value::String(format!("{}{}", a, b)))
                }
                _ => Ok(Value::Number(lhs.to_number()? + rhs.to_number()?)),
            },

            BinaryOperator::Subtract => Ok(Value::Number(lhs.to_number()? - rhs.to_number()?)),
            BinaryOperator::Multiply => Ok(Value::Number(lhs.to_number()? * rhs.to_number()?)),

            BinaryOperator::Divide => {
                let divisor = rhs.to_number()?;
                if divisor == 0.0 {
                    return Err(FormulaError::Evaluation("Division by zero".into()));
                }
                Ok(Value::Number(lhs.to_number()? / divisor))
            }

            BinaryOperator::FloorDivide => {
                let divisor = rhs.to_number()?;
                if divisor == 0.0 {
                    return Err(FormulaError::Evaluation("Division by zero".into()));
                }
                Ok(Value::Number((lhs.to_number()? / divisor).floor()))
            }

            BinaryOperator::Modulo => {
                let a = lhs.to_number()?;
                let b = rhs.to_number()?;
                if b == 0.0 {
                    return Err(FormulaError::Evaluation("Division by zero".into()));
                }
                // Result takes the sign of the divisor
                Ok(Value::Number(a - b * (a / b).floor()))
            }

            BinaryOperator::Power => {
                let base = lhs.to_number()?;
                let exponent = rhs.to_number()?;
                if base == 0.0 && exponent < 0.0 {
                    return Err(FormulaError::Evaluation(
                        "Zero cannot be raised to a negative power".into(),
                    ));
                }
                if base < 0.0 && exponent.fract() != 0.0 {
                    return Err(FormulaError::Evaluation(
                        "Negative base with fractional exponent".into(),
                    ));
                }
                Ok(Value::Number(base.powf(exponent)))
            }

            BinaryOperator::Equal => Ok(Value::Boolean(loose_equal(&lhs, &rhs))),
            BinaryOperator::NotEqual => Ok(Value::Boolean(!loose_equal(&lhs, &rhs))),

            BinaryOperator::LessThan => compare(&lhs, &rhs, |o| o == std::cmp::Ordering::Less),
            BinaryOperator::LessEqual => {
                compare(&lhs, &rhs, |o| o != std::cmp::Ordering::Greater)
            }
            BinaryOperator::GreaterThan => {
                compare(&lhs, &rhs, |o| o == std::cmp::Ordering::Greater)
            }
            BinaryOperator::GreaterEqual => {
                compare(&lhs, &rhs, |o| o != std::cmp::Ordering::Less)
            }

            BinaryOperator::And | BinaryOperator::Or => unreachable!("handled above"),
        }
    }
}

/// Convert an evaluated value to a number for cell resolution
///
/// Unlike arithmetic coercion this never faults: text that isn't numeric or
/// date-like becomes 0.
fn coerce_to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Boolean(true) => 1.0,
        Value::Boolean(false) => 0.0,
        Value::String(s) => coerce_literal(s),
    }
}

/// Coerce raw cell content to a number (non-numeric defaults to 0)
fn coerce_literal(content: &str) -> f64 {
    let trimmed = content.trim();
    if let Ok(n) = trimmed.parse::<f64>() {
        return n;
    }
    if let Some(serial) = date_to_serial(trimmed) {
        return serial;
    }
    0.0
}

/// Convert a YYYY-MM-DD string to days since the Unix epoch
pub(crate) fn date_to_serial(s: &str) -> Option<f64> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    Some((date - epoch).num_days() as f64)
}

/// Bare-name constants (case-insensitive)
fn resolve_constant(name: &str) -> FormulaResult<Value> {
    match name.to_ascii_lowercase().as_str() {
        "pi" => Ok(Value::Number(std::f64::consts::PI)),
        "e" => Ok(Value::Number(std::f64::consts::E)),
        "tau" => Ok(Value::Number(std::f64::consts::TAU)),
        _ => Err(FormulaError::UnknownName(name.to_string())),
    }
}

/// Loose equality: numbers and booleans compare numerically, strings
/// compare as text, mixed number/text is unequal rather than a fault
fn loose_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::String(_), _) | (_, Value::String(_)) => false,
        _ => {
            // to_number cannot fail for Number/Boolean
            let a = lhs.as_number().unwrap_or(f64::NAN);
            let b = rhs.as_number().unwrap_or(f64::NAN);
            a == b
        }
    }
}

fn compare(
    lhs: &Value,
    rhs: &Value,
    accept: fn(std::cmp::Ordering) -> bool,
) -> FormulaResult<Value> {
    let ordering = match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::String(_), _) | (_, Value::String(_)) => {
            return Err(FormulaError::Evaluation(
                "Cannot order text against a number".into(),
            ));
        }
        _ => {
            let a = lhs.to_number()?;
            let b = rhs.to_number()?;
            a.partial_cmp(&b).ok_or_else(|| {
                FormulaError::Evaluation("Cannot compare non-finite numbers".into())
            })?
        }
    };

    Ok(Value::Boolean(accept(ordering)))
}
