//! Relative date expressions for report ranges.
//!
//! Accepts either a literal `YYYY-MM-DD` or an anchor (`today`,
//! `startOfMonth`, `startOfYear`) followed by offsets such as `-6d`, `+1w`,
//! `-1m` or `-2y`, e.g. `startOfMonth-1m`.

use crate::error::{AppError, Result};
use chrono::{Datelike, Days, Local, Months, NaiveDate};

const ANCHORS: &[&str] = &["today", "startOfMonth", "startOfYear"];

/// Resolve `expr` relative to the local calendar date.
pub fn resolve_local(expr: &str) -> Result<NaiveDate> {
    resolve(expr, Local::now().date_naive())
}

pub fn resolve(expr: &str, today: NaiveDate) -> Result<NaiveDate> {
    let expr = expr.trim();

    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        return Ok(date);
    }

    let anchor = ANCHORS
        .iter()
        .find(|anchor| expr.starts_with(**anchor))
        .ok_or_else(|| invalid(expr, "expected YYYY-MM-DD, today, startOfMonth or startOfYear"))?;

    let mut date = match *anchor {
        "startOfMonth" => today.with_day(1),
        "startOfYear" => today.with_ordinal(1),
        _ => Some(today),
    }
    .ok_or_else(|| invalid(expr, "date out of range"))?;

    let mut rest = &expr[anchor.len()..];
    while !rest.is_empty() {
        let (offset, remaining) = parse_offset(rest).ok_or_else(|| invalid(expr, "bad offset"))?;
        date = offset
            .apply(date)
            .ok_or_else(|| invalid(expr, "date out of range"))?;
        rest = remaining;
    }

    Ok(date)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Unit {
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Offset {
    negative: bool,
    amount: u32,
    unit: Unit,
}

impl Offset {
    fn apply(self, date: NaiveDate) -> Option<NaiveDate> {
        match self.unit {
            Unit::Day | Unit::Week => {
                let days = match self.unit {
                    Unit::Week => u64::from(self.amount) * 7,
                    _ => u64::from(self.amount),
                };
                match self.negative {
                    true => date.checked_sub_days(Days::new(days)),
                    false => date.checked_add_days(Days::new(days)),
                }
            }
            Unit::Month | Unit::Year => {
                let months = match self.unit {
                    Unit::Year => self.amount.checked_mul(12)?,
                    _ => self.amount,
                };
                match self.negative {
                    true => date.checked_sub_months(Months::new(months)),
                    false => date.checked_add_months(Months::new(months)),
                }
            }
        }
    }
}

/// Parse one `[+-]N<unit>` from the front of `input`.
fn parse_offset(input: &str) -> Option<(Offset, &str)> {
    let negative = match input.chars().next()? {
        '-' => true,
        '+' => false,
        _ => return None,
    };
    let body = &input[1..];

    let digits = body.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let amount = body[..digits].parse().ok()?;

    let unit = match body[digits..].chars().next()? {
        'd' => Unit::Day,
        'w' => Unit::Week,
        'm' => Unit::Month,
        'y' => Unit::Year,
        _ => return None,
    };

    Some((
        Offset {
            negative,
            amount,
            unit,
        },
        &body[digits + 1..],
    ))
}

fn invalid(expr: &str, reason: &str) -> AppError {
    AppError::Usage(format!("invalid date {:?}: {}", expr, reason))
}
