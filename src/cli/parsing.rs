use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum DateStyle {
    #[default]
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

pub const DATE_HELP: &str =
    "Either 2025-03-15 or an expression like \"yesterday\", \"last friday\", \"15/03/2025\"";

/// Parses a date argument. ISO dates are taken as they are, anything else goes through
/// chrono-english relative to `now`.
pub fn parse_date_arg(value: &str, now: DateTime<Local>, style: DateStyle) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_moment_arg(value, now, style).map(|moment| moment.date_naive())
}

pub fn parse_moment_arg(
    value: &str,
    now: DateTime<Local>,
    style: DateStyle,
) -> Result<DateTime<Local>> {
    match parse_date_string(value, now, style.into()) {
        Ok(v) => Ok(v),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date \"{value}\": {e}"),
            )
            .into()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, NaiveDate, TimeZone};

    use super::{parse_date_arg, DateStyle};

    #[test]
    fn iso_dates_are_parsed_directly() {
        let now = Local.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(
            parse_date_arg("2025-03-15", now, DateStyle::Uk).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
    }

    #[test]
    fn dialect_decides_day_month_order() {
        let now = Local.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(
            parse_date_arg("04/03/2025", now, DateStyle::Uk).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 4).unwrap()
        );
        assert_eq!(
            parse_date_arg("04/03/2025", now, DateStyle::Us).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 3).unwrap()
        );
    }

    #[test]
    fn garbage_is_rejected() {
        let now = Local.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap();
        assert!(parse_date_arg("not a date at all", now, DateStyle::Uk).is_err());
    }
}
