//! Cron dialect: 5-field POSIX-style (minute, hour, day-of-month, month,
//! day-of-week), evaluated with `croner`. Both `0` and `7` are accepted for
//! Sunday — `croner` already normalizes that per its own POSIX compliance.

use chrono::{DateTime, Utc};
use croner::Cron;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CronError {
    #[error("cron expression must have exactly 5 fields, got {0}")]
    WrongFieldCount(usize),
    #[error("invalid cron expression: {0}")]
    Invalid(String),
}

/// Validate the expression has exactly 5 whitespace-separated fields and
/// parses under the POSIX dialect. Doesn't enforce per-field numeric ranges
/// beyond what `croner` itself rejects, since `croner` already range-checks
/// each field against its POSIX bounds.
pub fn validate(expression: &str) -> Result<(), CronError> {
    let field_count = expression.split_whitespace().count();
    if field_count != 5 {
        return Err(CronError::WrongFieldCount(field_count));
    }
    Cron::parse(expression).map_err(|e| CronError::Invalid(e.to_string()))?;
    Ok(())
}

/// The most recent scheduled fire time strictly before `now`, per the
/// expression. Returns `None` if the expression has no occurrence in the
/// lookback window (shouldn't happen for any expression that parses, but
/// guards against pathological expressions with an effectively-unreachable
/// schedule).
pub fn prev_trigger(expression: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CronError> {
    let cron = Cron::parse(expression).map_err(|e| CronError::Invalid(e.to_string()))?;
    Ok(cron.iter_before(now).next())
}
