//! Statistical aggregate functions

use super::math::numeric_values;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, Value};

/// SUM function
pub fn fn_sum(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(numeric_values(args).iter().sum()))
}

/// AVERAGE function (zero values yield 0, not a fault)
pub fn fn_average(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let values = numeric_values(args);
    if values.is_empty() {
        return Ok(Value::Number(0.0));
    }
    let sum: f64 = values.iter().sum();
    Ok(Value::Number(sum / values.len() as f64))
}

/// COUNT function (counts numeric values only)
pub fn fn_count(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(numeric_values(args).len() as f64))
}

/// MEDIAN function
///
/// An even count returns the mean of the two central values; zero values
/// yield 0, not a fault.
pub fn fn_median(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let mut values = numeric_values(args);
    if values.is_empty() {
        return Ok(Value::Number(0.0));
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mid = values.len() / 2;
    let median = if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    };

    Ok(Value::Number(median))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::CellMap;
    use pretty_assertions::assert_eq;

    fn num(f: super::super::EagerFn, args: &[f64]) -> f64 {
        let args: Vec<Value> = args.iter().map(|&n| Value::Number(n)).collect();
        let cells = CellMap::new();
        let ctx = EvaluationContext::new(&cells);
        match f(&args, &ctx).unwrap() {
            Value::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_sum() {
        assert_eq!(num(fn_sum, &[1.0, 2.0, 3.0, 4.0, 5.0]), 15.0);
        assert_eq!(num(fn_sum, &[5.0, 10.0]), 15.0);
    }

    #[test]
    fn test_sum_skips_non_numeric() {
        let cells = CellMap::new();
        let ctx = EvaluationContext::new(&cells);
        let args = vec![
            Value::String("abc".into()),
            Value::Number(5.0),
            Value::String("7".into()),
        ];
        assert_eq!(fn_sum(&args, &ctx).unwrap(), Value::Number(12.0));
    }

    #[test]
    fn test_average() {
        assert_eq!(num(fn_average, &[10.0, 20.0, 30.0]), 20.0);
    }

    #[test]
    fn test_average_of_nothing_is_zero() {
        let cells = CellMap::new();
        let ctx = EvaluationContext::new(&cells);
        let args = vec![Value::String("text".into())];
        assert_eq!(fn_average(&args, &ctx).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_count() {
        let cells = CellMap::new();
        let ctx = EvaluationContext::new(&cells);
        let args = vec![
            Value::Number(1.0),
            Value::String("x".into()),
            Value::Number(2.0),
        ];
        assert_eq!(fn_count(&args, &ctx).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_median_odd_count() {
        assert_eq!(num(fn_median, &[10.0, 20.0, 30.0]), 20.0);
        assert_eq!(num(fn_median, &[30.0, 10.0, 20.0]), 20.0);
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(num(fn_median, &[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn test_median_of_nothing_is_zero() {
        let cells = CellMap::new();
        let ctx = EvaluationContext::new(&cells);
        let args = vec![Value::String("text".into())];
        assert_eq!(fn_median(&args, &ctx).unwrap(), Value::Number(0.0));
    }
}
