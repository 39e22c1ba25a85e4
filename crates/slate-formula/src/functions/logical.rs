//! Logical functions
//!
//! These are lazy: they control evaluation of their own arguments. A fault
//! inside an argument is deliberately swallowed into a default result (the
//! false branch for IF, False for AND/OR, True for NOT) instead of
//! propagating. Compatibility behavior; flagged for review in DESIGN.md.

use crate::ast::Expr;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, Value};

/// IF function
///
/// A faulted condition selects the false branch rather than propagating.
pub fn fn_if(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    let condition = match ctx.evaluate(&args[0]) {
        Ok(value) => value.is_truthy(),
        Err(e) => {
            log::debug!("IF condition faulted, taking false branch: {}", e);
            false
        }
    };

    if condition {
        ctx.evaluate(&args[1])
    } else {
        match args.get(2) {
            Some(if_false) => ctx.evaluate(if_false),
            None => Ok(Value::Boolean(false)),
        }
    }
}

/// AND function (short-circuit; any argument fault degrades to False)
pub fn fn_and(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    for arg in args {
        match ctx.evaluate(arg) {
            Ok(value) => {
                if !value.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
            }
            Err(e) => {
                log::debug!("AND argument faulted, degrading to False: {}", e);
                return Ok(Value::Boolean(false));
            }
        }
    }
    Ok(Value::Boolean(true))
}

/// OR function (short-circuit; any argument fault degrades to False)
pub fn fn_or(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    for arg in args {
        match ctx.evaluate(arg) {
            Ok(value) => {
                if value.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
            }
            Err(e) => {
                log::debug!("OR argument faulted, degrading to False: {}", e);
                return Ok(Value::Boolean(false));
            }
        }
    }
    Ok(Value::Boolean(false))
}

/// NOT function (an argument fault degrades to True)
pub fn fn_not(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    match ctx.evaluate(&args[0]) {
        Ok(value) => Ok(Value::Boolean(!value.is_truthy())),
        Err(e) => {
            log::debug!("NOT argument faulted, degrading to True: {}", e);
            Ok(Value::Boolean(true))
        }
    }
}
