use std::{collections::HashSet, sync::Arc};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::storage::entities::{KeyEvent, WindowEvent};

use super::error::AnalysisError;

pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 365;
pub const DEFAULT_LIMIT: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub logical_date: NaiveDate,
    pub total_keys: u64,
    pub unique_apps: usize,
}

impl DailySummary {
    /// Summarizes one logical date. Days are driven by window events: without any there is no
    /// summary, while missing key events just mean zero keys.
    pub fn from_events(
        logical_date: NaiveDate,
        windows: &[WindowEvent],
        keys: &[KeyEvent],
    ) -> Option<Self> {
        if windows.is_empty() {
            return None;
        }
        let unique_apps = windows
            .iter()
            .map(|event| event.app_name.as_ref())
            .collect::<HashSet<_>>()
            .len();
        Some(Self {
            logical_date,
            total_keys: keys.iter().map(|event| event.key_count).sum(),
            unique_apps,
        })
    }
}

/// Inclusive range of logical dates. A missing bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| from <= date) && self.to.map_or(true, |to| date <= to)
    }
}

/// Brings any requested limit into `[MIN_LIMIT, MAX_LIMIT]`. This is the caller's job:
/// [summarize_range] itself rejects out of range values.
pub fn clamp_limit(requested: i64) -> usize {
    requested.clamp(MIN_LIMIT as i64, MAX_LIMIT as i64) as usize
}

pub fn check_limit(limit: usize) -> Result<usize, AnalysisError> {
    if (MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(AnalysisError::InvalidArgument(format!(
            "limit must be between {MIN_LIMIT} and {MAX_LIMIT}, got {limit}"
        )))
    }
}

/// Orders summaries newest first and keeps at most `limit` of them.
pub fn summarize_range(
    mut summaries: Vec<DailySummary>,
    limit: usize,
) -> Result<Vec<DailySummary>, AnalysisError> {
    let limit = check_limit(limit)?;
    summaries.sort_by(|a, b| b.logical_date.cmp(&a.logical_date));
    summaries.truncate(limit);
    Ok(summaries)
}

/// Heatmap intensity in `[0, 1]` for each summary: keys relative to the busiest displayed day.
pub fn focus_intensity(summaries: &[DailySummary]) -> Vec<f64> {
    let busiest = summaries
        .iter()
        .map(|summary| summary.total_keys)
        .max()
        .unwrap_or(0)
        .max(1);
    summaries
        .iter()
        .map(|summary| summary.total_keys as f64 / busiest as f64)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppEventCount {
    pub app: Arc<str>,
    pub events: usize,
}

/// How many focus events each app got, most switched-to first.
pub fn app_event_counts(events: &[WindowEvent]) -> Vec<AppEventCount> {
    let mut counts: Vec<AppEventCount> = vec![];
    for event in events {
        match counts.iter_mut().find(|v| v.app == event.app_name) {
            Some(count) => count.events += 1,
            None => counts.push(AppEventCount {
                app: event.app_name.clone(),
                events: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.events.cmp(&a.events));
    counts
}
