use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{info, instrument, warn};

use crate::{
    storage::{
        entities::{KeyEvent, Note, WindowEvent},
        event_store::FileEventStore,
        settings::SettingsProvider,
    },
    utils::{
        text::{remove_non_ascii, sanitize_url},
        time::logical_date,
    },
};

use super::AppContext;

#[derive(Debug, Parser)]
pub struct ImportCommand {
    #[arg(help = "File with one json record per line. Use - to read from stdin")]
    path: PathBuf,
}

/// Single line of an import file. Records without a logical date get one from their timestamp
/// and the configured day boundary.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ImportRecord {
    Window {
        timestamp: DateTime<Utc>,
        app_name: String,
        window_title: Option<String>,
        browser_url: Option<String>,
        logical_date: Option<NaiveDate>,
    },
    Key {
        timestamp: DateTime<Utc>,
        key_count: u64,
        logical_date: Option<NaiveDate>,
    },
    Note {
        timestamp: DateTime<Utc>,
        content: String,
        logical_date: Option<NaiveDate>,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub imported: usize,
    pub skipped: usize,
}

pub async fn process_import_command(
    context: &AppContext,
    ImportCommand { path }: ImportCommand,
) -> Result<()> {
    let boundary_hour = context.settings.settings().await?.day_boundary_hour;

    let stats = if path.as_os_str() == "-" {
        import_lines(&context.store, BufReader::new(tokio::io::stdin()), boundary_hour).await?
    } else {
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("Failed to open {path:?}"))?;
        import_lines(&context.store, BufReader::new(file), boundary_hour).await?
    };

    println!("Imported {} records, skipped {}", stats.imported, stats.skipped);
    Ok(())
}

#[instrument(skip(store, reader))]
pub async fn import_lines(
    store: &FileEventStore,
    reader: impl AsyncBufRead + Unpin,
    boundary_hour: u32,
) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    let mut lines = reader.lines();
    let mut line_number = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ImportRecord>(&line) {
            Ok(record) => {
                store_record(store, record, boundary_hour).await?;
                stats.imported += 1;
            }
            Err(e) => {
                warn!("Skipping line {line_number}: {e}");
                stats.skipped += 1;
            }
        }
    }

    info!(
        "Imported {} records, skipped {}",
        stats.imported, stats.skipped
    );
    Ok(stats)
}

async fn store_record(
    store: &FileEventStore,
    record: ImportRecord,
    boundary_hour: u32,
) -> Result<()> {
    let date_of = |timestamp: &DateTime<Utc>, date: Option<NaiveDate>| {
        date.unwrap_or_else(|| logical_date(&timestamp.with_timezone(&Local), boundary_hour))
    };

    match record {
        ImportRecord::Window {
            timestamp,
            app_name,
            window_title,
            browser_url,
            logical_date,
        } => {
            let mut event = WindowEvent::new(
                timestamp,
                app_name.as_str(),
                date_of(&timestamp, logical_date),
            );
            if let Some(title) = window_title {
                event = event.with_title(remove_non_ascii(&title));
            }
            if let Some(url) = browser_url {
                event = event.with_url(sanitize_url(&url));
            }
            store.insert_window_event(event).await
        }
        ImportRecord::Key {
            timestamp,
            key_count,
            logical_date,
        } => {
            store
                .insert_key_event(KeyEvent {
                    timestamp,
                    key_count,
                    logical_date: date_of(&timestamp, logical_date),
                })
                .await
        }
        ImportRecord::Note {
            timestamp,
            content,
            logical_date,
        } => {
            store
                .upsert_note(Note {
                    timestamp,
                    content,
                    logical_date: date_of(&timestamp, logical_date),
                })
                .await
        }
    }
}
