use chrono::{DateTime, Local, NaiveDate, Utc};

use super::time::logical_date;

/// Represents an entity responsible for providing dates across application. This can allow it to
/// be used for testing
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    /// Current logical date in the local timezone.
    fn today(&self, boundary_hour: u32) -> NaiveDate {
        logical_date(&self.time().with_timezone(&Local), boundary_hour)
    }
}

pub struct DefaultClock;

impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
