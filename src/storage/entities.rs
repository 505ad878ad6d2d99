use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// "This application/window became focused at this instant". Recorded by the capture daemon and
/// never modified afterwards, apart from the store refreshing the title/url of an identical
/// `(timestamp, app_name)` pair.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct WindowEvent {
    pub timestamp: DateTime<Utc>,
    pub app_name: Arc<str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<Arc<str>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_url: Option<Arc<str>>,
    pub logical_date: NaiveDate,
}

impl WindowEvent {
    pub fn new(timestamp: DateTime<Utc>, app_name: impl Into<Arc<str>>, logical_date: NaiveDate) -> Self {
        Self {
            timestamp,
            app_name: app_name.into(),
            window_title: None,
            browser_url: None,
            logical_date,
        }
    }

    pub fn with_title(self, title: impl Into<Arc<str>>) -> Self {
        Self {
            window_title: Some(title.into()),
            ..self
        }
    }

    pub fn with_url(self, url: impl Into<Arc<str>>) -> Self {
        Self {
            browser_url: Some(url.into()),
            ..self
        }
    }
}

/// Number of keys pressed during the sampling interval ending at `timestamp`. Not cumulative.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct KeyEvent {
    pub timestamp: DateTime<Utc>,
    pub key_count: u64,
    pub logical_date: NaiveDate,
}

#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Note {
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub logical_date: NaiveDate,
}

/// Free-text log for a whole logical date.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct DailyBlog {
    pub logical_date: NaiveDate,
    pub content: String,
}
