//! Math functions

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, Value};

/// Extract a required numeric argument
fn number_arg(args: &[Value], index: usize, function: &str) -> FormulaResult<f64> {
    args.get(index)
        .ok_or_else(|| {
            FormulaError::Evaluation(format!("{} is missing argument {}", function, index + 1))
        })?
        .to_number()
}

/// Collect the numeric values out of an argument list, skipping text that
/// doesn't parse as a number
pub(crate) fn numeric_values(args: &[Value]) -> Vec<f64> {
    args.iter().filter_map(Value::as_number).collect()
}

/// Round half to even, matching the evaluator's rounding convention
fn round_half_even(x: f64) -> f64 {
    let floor = x.floor();
    let diff = x - floor;
    if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

/// ABS function
pub fn fn_abs(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "ABS")?.abs()))
}

/// ROUND function (optional digit count, ties round to even)
pub fn fn_round(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let x = number_arg(args, 0, "ROUND")?;

    let digits = match args.get(1) {
        Some(v) => v.to_number()? as i32,
        None => 0,
    };

    let scale = 10f64.powi(digits);
    Ok(Value::Number(round_half_even(x * scale) / scale))
}

/// FLOOR function
pub fn fn_floor(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "FLOOR")?.floor()))
}

/// CEIL / CEILING function
pub fn fn_ceil(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "CEIL")?.ceil()))
}

/// TRUNC function
pub fn fn_trunc(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "TRUNC")?.trunc()))
}

/// SQRT function (negative input is a domain fault)
pub fn fn_sqrt(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let x = number_arg(args, 0, "SQRT")?;
    if x < 0.0 {
        return Err(FormulaError::Evaluation(
            "SQRT of a negative number".into(),
        ));
    }
    Ok(Value::Number(x.sqrt()))
}

/// POW / POWER function
pub fn fn_power(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let base = number_arg(args, 0, "POWER")?;
    let exponent = number_arg(args, 1, "POWER")?;

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

/// EXP function
pub fn fn_exp(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "EXP")?.exp()))
}

/// LOG function: natural log, or log in an explicit base
pub fn fn_log(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let x = number_arg(args, 0, "LOG")?;
    if x <= 0.0 {
        return Err(FormulaError::Evaluation(
            "LOG of a non-positive number".into(),
        ));
    }

    match args.get(1) {
        Some(v) => {
            let base = v.to_number()?;
            if base <= 0.0 || base == 1.0 {
                return Err(FormulaError::Evaluation("Invalid LOG base".into()));
            }
            Ok(Value::Number(x.log(base)))
        }
        None => Ok(Value::Number(x.ln())),
    }
}

/// LOG10 function
pub fn fn_log10(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let x = number_arg(args, 0, "LOG10")?;
    if x <= 0.0 {
        return Err(FormulaError::Evaluation(
            "LOG10 of a non-positive number".into(),
        ));
    }
    Ok(Value::Number(x.log10()))
}

/// SIN function
pub fn fn_sin(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "SIN")?.sin()))
}

/// COS function
pub fn fn_cos(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "COS")?.cos()))
}

/// TAN function
pub fn fn_tan(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "TAN")?.tan()))
}

/// ASIN function (input outside [-1, 1] is a domain fault)
pub fn fn_asin(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let x = number_arg(args, 0, "ASIN")?;
    if !(-1.0..=1.0).contains(&x) {
        return Err(FormulaError::Evaluation("ASIN input out of range".into()));
    }
    Ok(Value::Number(x.asin()))
}

/// ACOS function (input outside [-1, 1] is a domain fault)
pub fn fn_acos(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let x = number_arg(args, 0, "ACOS")?;
    if !(-1.0..=1.0).contains(&x) {
        return Err(FormulaError::Evaluation("ACOS input out of range".into()));
    }
    Ok(Value::Number(x.acos()))
}

/// ATAN function
pub fn fn_atan(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "ATAN")?.atan()))
}

/// DEGREES function
pub fn fn_degrees(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "DEGREES")?.to_degrees()))
}

/// RADIANS function
pub fn fn_radians(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "RADIANS")?.to_radians()))
}

/// MOD function (result takes the sign of the divisor)
pub fn fn_mod(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let a = number_arg(args, 0, "MOD")?;
    let b = number_arg(args, 1, "MOD")?;
    if b == 0.0 {
        return Err(FormulaError::Evaluation("Division by zero".into()));
    }
    Ok(Value::Number(a - b * (a / b).floor()))
}

/// MIN function (empty input yields 0, not a fault)
pub fn fn_min(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let values = numeric_values(args);
    if values.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(Value::Number(
        values.into_iter().fold(f64::INFINITY, f64::min),
    ))
}

/// MAX function (empty input yields 0, not a fault)
pub fn fn_max(args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let values = numeric_values(args);
    if values.is_empty() {
        return Ok(Value::Number(0.0));
    }
    Ok(Value::Number(
        values.into_iter().fold(f64::NEG_INFINITY, f64::max),
    ))
}

/// PI function
pub fn fn_pi(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(std::f64::consts::PI))
}

/// E function
pub fn fn_e(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    Ok(Value::Number(std::f64::consts::E))
}
