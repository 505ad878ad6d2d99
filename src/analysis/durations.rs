use std::{collections::HashMap, hash::Hash, sync::Arc};

use chrono::Duration;
use serde::Serialize;

use crate::{storage::entities::WindowEvent, utils::time::serialize_seconds};

/// App name the capture daemon records while the screen is locked. Its time is not usage.
pub const LOCKED_SCREEN_APP: &str = "__LOCKEDSCREEN";

/// Longest gap between two focus events that still counts as activity. Anything longer is
/// treated as idle time and cut down to this value.
pub const MAX_GAP: Duration = Duration::seconds(30 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppDuration {
    pub app: Arc<str>,
    #[serde(rename = "duration_seconds", serialize_with = "serialize_seconds")]
    pub duration: Duration,
}

impl AppDuration {
    pub fn duration_seconds(&self) -> i64 {
        self.duration.num_seconds()
    }
}

/// Same as [AppDuration] but split by window title. Used as the input of categorization, since
/// rules may match on titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowDuration {
    pub app: Arc<str>,
    pub window_title: Option<Arc<str>>,
    #[serde(rename = "duration_seconds", serialize_with = "serialize_seconds")]
    pub duration: Duration,
}

pub fn is_locked_screen(app: &str) -> bool {
    app == LOCKED_SCREEN_APP
}

/// Computes active time per application for one logical date.
///
/// `events` must be sorted by timestamp, which is how the event store returns them. The
/// order is only checked in debug builds and is never repaired here: unsorted input gives an
/// unspecified result.
///
/// Every event lasts until the next one, capped at [MAX_GAP]. The last event has no known end
/// and contributes nothing. Locked screen time is dropped after accumulation. The result is
/// sorted by descending duration, equal durations keep first-seen order.
pub fn aggregate_durations(events: &[WindowEvent]) -> Vec<AppDuration> {
    let mut usages = accumulate_gaps(events, |event| event.app_name.clone())
        .into_iter()
        .filter(|(app, _)| !is_locked_screen(app))
        .map(|(app, duration)| AppDuration { app, duration })
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| b.duration.cmp(&a.duration));
    usages
}

/// [aggregate_durations] keyed by `(app, window title)` instead of just the app.
pub fn aggregate_windows(events: &[WindowEvent]) -> Vec<WindowDuration> {
    let mut usages = accumulate_gaps(events, |event| {
        (event.app_name.clone(), event.window_title.clone())
    })
    .into_iter()
    .filter(|((app, _), _)| !is_locked_screen(app))
    .map(|((app, window_title), duration)| WindowDuration {
        app,
        window_title,
        duration,
    })
    .collect::<Vec<_>>();
    usages.sort_by(|a, b| b.duration.cmp(&a.duration));
    usages
}

/// Sum of capped gaps per key, in order of first appearance. Every event is its own bucket
/// entry: consecutive events of the same key are not merged beforehand.
fn accumulate_gaps<K: Eq + Hash + Clone>(
    events: &[WindowEvent],
    key: impl Fn(&WindowEvent) -> K,
) -> Vec<(K, Duration)> {
    debug_assert!(
        events
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp),
        "window events must be sorted by timestamp"
    );

    let mut positions = HashMap::<K, usize>::new();
    let mut totals: Vec<(K, Duration)> = vec![];

    for (index, event) in events.iter().enumerate() {
        let gap = events
            .get(index + 1)
            .map(|next| (next.timestamp - event.timestamp).clamp(Duration::zero(), MAX_GAP))
            .unwrap_or_else(Duration::zero);

        let bucket = key(event);
        match positions.get(&bucket) {
            Some(&position) => totals[position].1 += gap,
            None => {
                positions.insert(bucket.clone(), totals.len());
                totals.push((bucket, gap));
            }
        }
    }

    totals
}
