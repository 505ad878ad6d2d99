use std::future;

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    storage::{entities::Note, event_store::EventStore, settings::SettingsProvider},
    utils::time::serialize_seconds,
};

use super::{
    categories::{categorize_durations, focus_duration, CategoryDuration},
    durations::{aggregate_durations, aggregate_windows, AppDuration},
    summary::{
        app_event_counts, check_limit, focus_intensity, summarize_range, AppEventCount,
        DailySummary, DateRange,
    },
};

/// Number of days fetched from the store at the same time while building an overview.
const FETCH_CONCURRENCY: usize = 4;

/// Everything shown for a single logical date.
#[derive(Debug, Serialize)]
pub struct DayReport {
    pub logical_date: NaiveDate,
    pub apps: Vec<AppDuration>,
    pub categories: Vec<CategoryDuration>,
    pub app_events: Vec<AppEventCount>,
    pub total_keys: u64,
    #[serde(rename = "active_seconds", serialize_with = "serialize_seconds")]
    pub active: Duration,
    #[serde(rename = "focus_seconds", serialize_with = "serialize_seconds")]
    pub focus: Duration,
    pub notes: Vec<Note>,
    pub blog: Option<String>,
}

#[instrument(skip(store, settings))]
pub async fn day_report(
    store: &impl EventStore,
    settings: &impl SettingsProvider,
    logical_date: NaiveDate,
) -> Result<DayReport> {
    let settings = settings.settings().await?;
    let (windows, keys, notes, blog) = tokio::try_join!(
        store.window_events_for(logical_date),
        store.key_events_for(logical_date),
        store.notes_for(logical_date),
        store.blog_for(logical_date),
    )?;
    debug!("Building report from {} window events", windows.len());

    let apps = aggregate_durations(&windows);
    let categories = categorize_durations(&aggregate_windows(&windows), &settings.rules);
    let active = apps
        .iter()
        .fold(Duration::zero(), |total, app| total + app.duration);

    Ok(DayReport {
        logical_date,
        focus: focus_duration(&categories, &settings.focus_categories),
        app_events: app_event_counts(&windows),
        total_keys: keys.iter().map(|event| event.key_count).sum(),
        active,
        apps,
        categories,
        notes,
        blog: blog.map(|blog| blog.content),
    })
}

/// One heatmap cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewDay {
    #[serde(flatten)]
    pub summary: DailySummary,
    pub intensity: f64,
}

/// Summaries of the newest `limit` dates inside `range`, newest first. `limit` must already be
/// within bounds, see [clamp_limit](super::summary::clamp_limit).
#[instrument(skip(store))]
pub async fn range_overview(
    store: &impl EventStore,
    range: DateRange,
    limit: usize,
) -> Result<Vec<OverviewDay>> {
    let limit = check_limit(limit)?;
    let dates = store
        .available_dates()
        .await?
        .into_iter()
        .filter(|date| range.contains(*date))
        .collect::<Vec<_>>();

    let summaries = stream::iter(dates)
        .map(|date| async move {
            let (windows, keys) = tokio::try_join!(
                store.window_events_for(date),
                store.key_events_for(date)
            )?;
            anyhow::Ok(DailySummary::from_events(date, &windows, &keys))
        })
        .buffered(FETCH_CONCURRENCY)
        .try_filter_map(|summary| future::ready(Ok(summary)))
        .take(limit)
        .try_collect::<Vec<_>>()
        .await?;

    let summaries = summarize_range(summaries, limit)?;
    let intensity = focus_intensity(&summaries);
    Ok(summaries
        .into_iter()
        .zip(intensity)
        .map(|(summary, intensity)| OverviewDay { summary, intensity })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

    use crate::{
        analysis::{
            categories::{CategoryRule, RuleSet},
            durations::LOCKED_SCREEN_APP,
            summary::DateRange,
        },
        storage::{
            entities::{DailyBlog, KeyEvent, WindowEvent},
            event_store::MockEventStore,
            settings::{MockSettingsProvider, Settings},
        },
        utils::logging::TEST_LOGGING,
    };

    use super::{day_report, range_overview};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn at(day: u32, seconds: i64) -> DateTime<Utc> {
        Utc.from_utc_datetime(&date(day).and_hms_opt(9, 0, 0).unwrap()) + Duration::seconds(seconds)
    }

    fn keys(day: u32, counts: &[u64]) -> Vec<KeyEvent> {
        counts
            .iter()
            .enumerate()
            .map(|(index, key_count)| KeyEvent {
                timestamp: at(day, index as i64 * 60),
                key_count: *key_count,
                logical_date: date(day),
            })
            .collect()
    }

    #[tokio::test]
    async fn day_report_combines_durations_and_categories() -> Result<()> {
        *TEST_LOGGING;

        let mut store = MockEventStore::new();
        store.expect_window_events_for().returning(|day| {
            Ok(vec![
                WindowEvent::new(at(5, 0), "Code", day).with_title("main.rs"),
                WindowEvent::new(at(5, 600), "Chrome", day).with_title("Gmail"),
                WindowEvent::new(at(5, 900), LOCKED_SCREEN_APP, day),
                WindowEvent::new(at(5, 9000), "Code", day).with_title("lib.rs"),
                WindowEvent::new(at(5, 9300), "Chrome", day).with_title("News"),
            ])
        });
        store
            .expect_key_events_for()
            .returning(|_| Ok(keys(5, &[100, 50])));
        store.expect_notes_for().returning(|_| Ok(vec![]));
        store.expect_blog_for().returning(|day| {
            Ok(Some(DailyBlog {
                logical_date: day,
                content: "shipped".into(),
            }))
        });

        let settings = Arc::new(Settings {
            rules: RuleSet::new(vec![
                CategoryRule::new("Gmail", "Email"),
                CategoryRule::new("Code", "Dev"),
            ])?,
            focus_categories: vec!["Dev".into()],
            ..Settings::default()
        });
        let mut provider = MockSettingsProvider::new();
        provider
            .expect_settings()
            .times(1)
            .returning(move || Ok(settings.clone()));

        let report = day_report(&store, &provider, date(5)).await?;

        let apps = report
            .apps
            .iter()
            .map(|v| (v.app.as_ref(), v.duration_seconds()))
            .collect::<Vec<_>>();
        assert_eq!(apps, vec![("Code", 900), ("Chrome", 300)]);

        let categories = report
            .categories
            .iter()
            .map(|v| (v.category.as_ref(), v.duration.num_seconds()))
            .collect::<Vec<_>>();
        assert_eq!(categories, vec![("Dev", 900), ("Email", 300), ("uncategorized", 0)]);

        assert_eq!(report.active.num_seconds(), 1200);
        assert_eq!(report.focus.num_seconds(), 900);
        assert_eq!(report.total_keys, 150);
        assert_eq!(report.blog.as_deref(), Some("shipped"));
        Ok(())
    }

    #[tokio::test]
    async fn overview_skips_days_without_window_events() -> Result<()> {
        let mut store = MockEventStore::new();
        store
            .expect_available_dates()
            .returning(|| Ok(vec![date(9), date(8), date(7), date(6), date(5)]));
        store.expect_window_events_for().returning(|day| {
            if day == date(8) {
                return Ok(vec![]);
            }
            Ok(vec![
                WindowEvent::new(at(day.day0() + 1, 0), "Code", day),
                WindowEvent::new(at(day.day0() + 1, 60), "Chrome", day),
            ])
        });
        store.expect_key_events_for().returning(|day| {
            if day == date(7) {
                Ok(vec![])
            } else {
                Ok(keys(1, &[40, 40]))
            }
        });

        let overview = range_overview(
            &store,
            DateRange {
                from: Some(date(6)),
                to: Some(date(9)),
            },
            30,
        )
        .await?;

        let days = overview
            .iter()
            .map(|v| (v.summary.logical_date, v.summary.total_keys, v.summary.unique_apps))
            .collect::<Vec<_>>();
        assert_eq!(
            days,
            vec![(date(9), 80, 2), (date(7), 0, 2), (date(6), 80, 2)]
        );
        assert_eq!(
            overview.iter().map(|v| v.intensity).collect::<Vec<_>>(),
            vec![1.0, 0.0, 1.0]
        );
        Ok(())
    }

    #[tokio::test]
    async fn overview_respects_limit() -> Result<()> {
        let mut store = MockEventStore::new();
        store
            .expect_available_dates()
            .returning(|| Ok(vec![date(3), date(2), date(1)]));
        store
            .expect_window_events_for()
            .returning(|day| Ok(vec![WindowEvent::new(at(1, 0), "Code", day)]));
        store.expect_key_events_for().returning(|_| Ok(vec![]));

        let overview = range_overview(&store, DateRange::default(), 2).await?;
        assert_eq!(
            overview
                .iter()
                .map(|v| v.summary.logical_date)
                .collect::<Vec<_>>(),
            vec![date(3), date(2)]
        );

        assert!(range_overview(&store, DateRange::default(), 500)
            .await
            .is_err());
        Ok(())
    }
}
