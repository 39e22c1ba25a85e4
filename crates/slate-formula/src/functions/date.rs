//! Date and time functions
//!
//! Dates are numbers: days since the Unix epoch, with time of day as the
//! fractional part. DATE and TIME render a serial back to text in local
//! time; TODAY and NOW produce the current serial so results can feed other
//! formulas (e.g. `DATE(TODAY()+7)`).

use crate::ast::Expr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, Value};
use chrono::{DateTime, Local, NaiveDate, TimeZone};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Convert a days-since-epoch serial to a local datetime
fn serial_to_local(serial: f64) -> Option<DateTime<Local>> {
    let seconds = serial * SECONDS_PER_DAY;
    if !seconds.is_finite() || seconds.abs() > i64::MAX as f64 {
        return None;
    }
    Local.timestamp_opt(seconds as i64, 0).single()
}

/// Evaluate the single argument of DATE/TIME and format the result
///
/// Malformed input yields an error string, not a fault: a bad date in one
/// cell must not poison the formula around it.
fn format_serial(
    name: &str,
    fmt: &str,
    args: &[Expr],
    ctx: &EvaluationContext,
) -> FormulaResult<Value> {
    let serial = match ctx.evaluate(&args[0]).and_then(|v| v.to_number()) {
        Ok(n) => n,
        Err(e) => {
            log::debug!("{} argument faulted, yielding error text: {}", name, e);
            return Ok(Value::String(format!("#ERROR: Invalid {} value", name)));
        }
    };

    match serial_to_local(serial) {
        Some(datetime) => Ok(Value::String(datetime.format(fmt).to_string())),
        None => {
            log::debug!("{} serial {} out of range", name, serial);
            Ok(Value::String(format!("#ERROR: Invalid {} value", name)))
        }
    }
}

/// DATE function: days-since-epoch serial to "YYYY-MM-DD"
pub fn fn_date(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    format_serial("DATE", "%Y-%m-%d", args, ctx)
}

/// TIME function: fractional-day serial to "HH:MM:SS"
pub fn fn_time(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<Value> {
    format_serial("TIME", "%H:%M:%S", args, ctx)
}

fn epoch() -> FormulaResult<chrono::NaiveDateTime> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| FormulaError::Evaluation("Epoch construction failed".into()))
}

/// TODAY function: whole days since the epoch, local time
pub fn fn_today(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let now = Local::now().naive_local();
    Ok(Value::Number((now - epoch()?).num_days() as f64))
}

/// NOW function: days since the epoch including the fractional time of day
pub fn fn_now(_args: &[Value], _ctx: &EvaluationContext) -> FormulaResult<Value> {
    let now = Local::now().naive_local();
    let seconds = (now - epoch()?).num_seconds() as f64;
    Ok(Value::Number(seconds / SECONDS_PER_DAY))
}
