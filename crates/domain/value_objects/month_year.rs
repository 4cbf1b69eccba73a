use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};

/// Wire format for billing periods, e.g. `01-2025` for January 2025.
pub const MONTH_YEAR_FORMAT: &str = "%m-%Y";

/// Parses `MM-YYYY` into midnight UTC on the first day of that month.
///
/// The month must be exactly two digits and the year exactly four, so `1-2025`
/// and `01-25` are rejected along with out-of-range months such as `13-2025`.
pub fn parse_month_year(raw: &str) -> Result<DateTime<Utc>> {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 2 {
        bail!("invalid date format, expected MM-YYYY");
    }

    let (month, year) = (parts[0], parts[1]);
    if month.len() != 2 || !month.bytes().all(|b| b.is_ascii_digit()) {
        bail!("invalid month in {raw:?}, expected two digits");
    }
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        bail!("invalid year in {raw:?}, expected four digits");
    }

    let month: u32 = month.parse()?;
    let year: i32 = year.parse()?;

    let date = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow!("{raw:?} is not a valid calendar month"))?;

    Ok(Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN)))
}

pub fn format_month_year(date: &DateTime<Utc>) -> String {
    date.format(MONTH_YEAR_FORMAT).to_string()
}

/// First day of the month following `date`'s month.
pub fn next_month(date: DateTime<Utc>) -> Result<DateTime<Utc>> {
    date.checked_add_months(Months::new(1))
        .ok_or_else(|| anyhow!("month overflow after {}-{}", date.month(), date.year()))
}
