use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike};
use serde::Serializer;

/// This is the standard way of converting a date to a record file name in focuslog.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn record_name_to_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, "%Y-%m-%d").ok()
}

/// Day an event belongs to. Days start at `boundary_hour` instead of midnight, so a late night
/// session still counts towards the day it started in.
pub fn logical_date<Tz: TimeZone>(moment: &DateTime<Tz>, boundary_hour: u32) -> NaiveDate {
    let date = moment.date_naive();
    if moment.hour() >= boundary_hour {
        date
    } else {
        date.pred_opt().unwrap_or(date)
    }
}

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!("{}h {}m", v.num_hours(), v.num_minutes() % 60)
    } else if v.num_minutes() > 0 {
        format!("{}m {}s", v.num_minutes(), v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds())
    }
}

/// Serializes a [Duration] as whole seconds.
pub fn serialize_seconds<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_i64(duration.num_seconds())
}
