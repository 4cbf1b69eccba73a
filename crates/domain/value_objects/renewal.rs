use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Computes the period that follows `current` when it is renewed at `now`.
///
/// The new period keeps the same length as `current`. While `current` is still
/// running it is extended back-to-back from its end date; once it has expired the
/// new period starts at `now`.
pub fn next_period(current: Period, now: DateTime<Utc>) -> Result<Period> {
    let length = current.end - current.start;
    let start = if current.end > now { current.end } else { now };
    let end = start
        .checked_add_signed(length)
        .ok_or_else(|| anyhow!("renewed period end overflows"))?;

    Ok(Period { start, end })
}
