use std::{
    collections::BTreeSet,
    future,
    io::{ErrorKind, SeekFrom},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fs4::tokio::AsyncFileExt;
use futures::StreamExt;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, info, instrument, warn};

use crate::{
    fs::operations::{ends_with_newline, read_last_line},
    utils::time::{date_to_record_name, record_name_to_date},
};

use super::entities::{DailyBlog, KeyEvent, Note, WindowEvent};

/// Read side of the event store. Everything the reports need goes through here, so that they
/// can be tested without touching the disk.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Window events of a logical date, sorted by timestamp.
    async fn window_events_for(&self, date: NaiveDate) -> Result<Vec<WindowEvent>>;

    /// Key events of a logical date, sorted by timestamp.
    async fn key_events_for(&self, date: NaiveDate) -> Result<Vec<KeyEvent>>;

    async fn notes_for(&self, date: NaiveDate) -> Result<Vec<Note>>;

    async fn blog_for(&self, date: NaiveDate) -> Result<Option<DailyBlog>>;

    /// Logical dates that have window or key events, newest first.
    async fn available_dates(&self) -> Result<Vec<NaiveDate>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Windows,
    Keys,
    Notes,
    Blog,
}

impl Table {
    const ALL: [Table; 4] = [Table::Windows, Table::Keys, Table::Notes, Table::Blog];

    fn dir_name(self) -> &'static str {
        match self {
            Table::Windows => "windows",
            Table::Keys => "keys",
            Table::Notes => "notes",
            Table::Blog => "blog",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Table::Windows | Table::Keys | Table::Notes => "jsonl",
            Table::Blog => "json",
        }
    }
}

/// A record stored one per line in a day file. Records sharing a key are merged instead of
/// duplicated.
trait DayRecord: Serialize + DeserializeOwned + Send {
    fn timestamp(&self) -> DateTime<Utc>;

    fn same_key(&self, other: &Self) -> bool;

    fn merge(&mut self, other: Self);
}

impl DayRecord for WindowEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn same_key(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.app_name == other.app_name
    }

    fn merge(&mut self, other: Self) {
        self.window_title = other.window_title;
        self.browser_url = other.browser_url;
    }
}

impl DayRecord for KeyEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn same_key(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }

    fn merge(&mut self, other: Self) {
        self.key_count += other.key_count;
    }
}

impl DayRecord for Note {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn same_key(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
    }

    fn merge(&mut self, other: Self) {
        self.content = other.content;
    }
}

/// The main realization of [EventStore]. Every table is a directory holding one file per
/// logical date:
///   - `windows/`, `keys/` and `notes/` contain json lines sorted by timestamp.
///   - `blog/` contains a single json document per date.
///
/// Files are locked while being read or written, so the capture daemon can keep appending while
/// reports are built.
pub struct FileEventStore {
    record_dir: PathBuf,
}

impl FileEventStore {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        for table in Table::ALL {
            std::fs::create_dir_all(record_dir.join(table.dir_name()))?;
        }
        Ok(Self { record_dir })
    }

    fn day_path(&self, table: Table, date: NaiveDate) -> PathBuf {
        self.record_dir
            .join(table.dir_name())
            .join(format!("{}.{}", date_to_record_name(date), table.extension()))
    }

    /// Inserts a window event. An event with the same timestamp and app refreshes the stored
    /// title and url.
    pub async fn insert_window_event(&self, event: WindowEvent) -> Result<()> {
        let path = self.day_path(Table::Windows, event.logical_date);
        upsert_record(&path, event).await
    }

    /// Inserts a key sample. Samples at the same timestamp are added together.
    pub async fn insert_key_event(&self, event: KeyEvent) -> Result<()> {
        let path = self.day_path(Table::Keys, event.logical_date);
        upsert_record(&path, event).await
    }

    /// Inserts a note, replacing the content of a note at the same timestamp.
    pub async fn upsert_note(&self, note: Note) -> Result<()> {
        let path = self.day_path(Table::Notes, note.logical_date);
        upsert_record(&path, note).await
    }

    pub async fn save_blog(&self, blog: DailyBlog) -> Result<()> {
        let path = self.day_path(Table::Blog, blog.logical_date);
        let content = serde_json::to_vec_pretty(&blog)?;
        with_exclusive_file(&path, |file| {
            Box::pin(async move {
                file.set_len(0).await?;
                file.rewind().await?;
                file.write_all(&content).await?;
                file.flush().await?;
                Ok(())
            })
        })
        .await
    }

    /// Most recently recorded window event across all dates.
    pub async fn last_window_event(&self) -> Result<Option<WindowEvent>> {
        let Some(newest) = self.table_dates(Table::Windows).await?.into_iter().next_back() else {
            return Ok(None);
        };
        let mut events =
            read_day_file::<WindowEvent>(&self.day_path(Table::Windows, newest)).await?;
        Ok(events.pop())
    }

    /// Deletes every day file of a logical date before `cutoff`. Returns the number of removed
    /// files.
    #[instrument(skip(self))]
    pub async fn purge_older_than(&self, cutoff: NaiveDate) -> Result<usize> {
        let mut removed = 0;
        for table in Table::ALL {
            for date in self.table_dates(table).await? {
                if date >= cutoff {
                    continue;
                }
                let path = self.day_path(table, date);
                debug!("Removing {path:?}");
                tokio::fs::remove_file(&path)
                    .await
                    .with_context(|| format!("Failed to remove {path:?}"))?;
                removed += 1;
            }
        }
        info!("Purged {removed} day files older than {cutoff}");
        Ok(removed)
    }

    /// Dates with a file in `table`, oldest first.
    async fn table_dates(&self, table: Table) -> Result<BTreeSet<NaiveDate>> {
        let entries = tokio::fs::read_dir(self.record_dir.join(table.dir_name())).await?;
        let dates = ReadDirStream::new(entries)
            .filter_map(|entry| {
                future::ready(match entry {
                    Ok(entry) => entry
                        .path()
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .and_then(record_name_to_date),
                    Err(e) => {
                        warn!("Failed to read an entry of {} {e}", table.dir_name());
                        None
                    }
                })
            })
            .collect::<BTreeSet<_>>()
            .await;
        Ok(dates)
    }
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn window_events_for(&self, date: NaiveDate) -> Result<Vec<WindowEvent>> {
        read_day_file(&self.day_path(Table::Windows, date)).await
    }

    async fn key_events_for(&self, date: NaiveDate) -> Result<Vec<KeyEvent>> {
        read_day_file(&self.day_path(Table::Keys, date)).await
    }

    async fn notes_for(&self, date: NaiveDate) -> Result<Vec<Note>> {
        read_day_file(&self.day_path(Table::Notes, date)).await
    }

    async fn blog_for(&self, date: NaiveDate) -> Result<Option<DailyBlog>> {
        let path = self.day_path(Table::Blog, date);
        match read_locked(&path).await? {
            Some(content) => Ok(Some(
                serde_json::from_str(&content)
                    .with_context(|| format!("Corrupted blog file {path:?}"))?,
            )),
            None => Ok(None),
        }
    }

    async fn available_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = self.table_dates(Table::Windows).await?;
        dates.extend(self.table_dates(Table::Keys).await?);
        Ok(dates.into_iter().rev().collect())
    }
}

/// Reads a whole file under a shared lock. A missing file is `None`.
async fn read_locked(path: &Path) -> Result<Option<String>> {
    async fn extract(path: &Path) -> std::result::Result<String, std::io::Error> {
        debug!("Extracting {path:?}");
        let mut file = File::open(path).await?;
        file.lock_shared()?;
        let mut content = String::new();
        let result = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        result.map(|_| content)
    }

    match extract(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {path:?}")),
    }
}

async fn read_day_file<T: DayRecord>(path: &Path) -> Result<Vec<T>> {
    let content = read_locked(path).await?.unwrap_or_default();
    Ok(parse_records(&content, path))
}

/// Parses json lines sorted by timestamp. Broken lines are skipped: they might appear after a
/// crash cut off a write.
fn parse_records<T: DayRecord>(content: &str, path: &Path) -> Vec<T> {
    let mut records = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(
                    "During parsing in path {:?} found illegal json string {}:  {e}",
                    path, line
                );
                None
            }
        })
        .collect::<Vec<_>>();
    records.sort_by_key(|record| record.timestamp());
    records
}

/// Merges `record` into an already sorted list, keeping it sorted.
fn merge_record<T: DayRecord>(records: &mut Vec<T>, record: T) {
    match records.iter_mut().find(|existing| existing.same_key(&record)) {
        Some(existing) => existing.merge(record),
        None => {
            let position = records.partition_point(|existing| existing.timestamp() <= record.timestamp());
            records.insert(position, record);
        }
    }
}

type FileOperation<'a> =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

/// Semi-safe acquire-release for a file. The file is created when missing and never truncated
/// before the lock is held.
async fn with_exclusive_file<F>(path: &Path, operation: F) -> Result<()>
where
    F: for<'a> FnOnce(&'a mut File) -> FileOperation<'a>,
{
    let mut file = File::options()
        .write(true)
        .create(true)
        .read(true)
        .truncate(false)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {path:?}"))?;
    file.lock_exclusive()?;
    let result = operation(&mut file).await;
    file.unlock_async().await?;
    result
}

async fn upsert_record<T: DayRecord + 'static>(path: &Path, record: T) -> Result<()> {
    let owned_path = path.to_path_buf();
    with_exclusive_file(path, move |file| {
        Box::pin(async move { upsert_with_file(file, &owned_path, record).await })
    })
    .await
}

async fn upsert_with_file<T: DayRecord>(file: &mut File, path: &Path, record: T) -> Result<()> {
    // Events normally arrive in order, so the common case only looks at the last line and
    // appends. Anything else, blank or broken tails included, rewrites the day file.
    let empty = file.metadata().await?.len() == 0;
    let appendable = empty
        || serde_json::from_str::<T>(&read_last_line(file, &mut vec![0; 1024]).await?)
            .is_ok_and(|last| last.timestamp() < record.timestamp());

    let mut buffer = Vec::<u8>::new();
    if appendable {
        // Another writer may have left its last record unterminated.
        if !ends_with_newline(file).await? {
            buffer.push(b'\n');
        }
        serde_json::to_writer(&mut buffer, &record)?;
        buffer.push(b'\n');
        file.seek(SeekFrom::End(0)).await?;
    } else {
        debug!("Rewriting {path:?}");
        file.rewind().await?;
        let mut content = String::new();
        file.read_to_string(&mut content).await?;

        let mut records = parse_records::<T>(&content, path);
        merge_record(&mut records, record);
        for record in &records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }
        file.set_len(0).await?;
        file.rewind().await?;
    }

    file.write_all(&buffer).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;

    use crate::storage::entities::{DailyBlog, KeyEvent, Note, WindowEvent};

    use super::{EventStore, FileEventStore, Table};

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();
    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(TEST_DATE, NaiveTime::from_hms_opt(9, 0, 0).unwrap());

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.from_utc_datetime(&TEST_START_DATE) + Duration::seconds(seconds)
    }

    fn key(seconds: i64, key_count: u64) -> KeyEvent {
        KeyEvent {
            timestamp: at(seconds),
            key_count,
            logical_date: TEST_DATE,
        }
    }

    #[tokio::test]
    async fn window_events_are_read_back_in_order() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;

        store
            .insert_window_event(WindowEvent::new(at(0), "Terminal", TEST_DATE))
            .await?;
        store
            .insert_window_event(WindowEvent::new(at(20), "Editor", TEST_DATE))
            .await?;
        store
            .insert_window_event(WindowEvent::new(at(10), "Browser", TEST_DATE))
            .await?;

        let events = store.window_events_for(TEST_DATE).await?;
        let apps = events.iter().map(|v| v.app_name.as_ref()).collect::<Vec<_>>();
        assert_eq!(apps, vec!["Terminal", "Browser", "Editor"]);
        Ok(())
    }

    #[tokio::test]
    async fn window_event_upsert_replaces_title() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;

        store
            .insert_window_event(WindowEvent::new(at(0), "Browser", TEST_DATE).with_title("Old"))
            .await?;
        store
            .insert_window_event(WindowEvent::new(at(5), "Editor", TEST_DATE))
            .await?;
        store
            .insert_window_event(
                WindowEvent::new(at(0), "Browser", TEST_DATE)
                    .with_title("New")
                    .with_url("https://example.com"),
            )
            .await?;
        store
            .insert_window_event(WindowEvent::new(at(0), "Mail", TEST_DATE))
            .await?;

        let events = store.window_events_for(TEST_DATE).await?;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].window_title.as_deref(), Some("New"));
        assert_eq!(events[0].browser_url.as_deref(), Some("https://example.com"));
        assert_eq!(events[1].app_name.as_ref(), "Mail");
        assert_eq!(events[2].app_name.as_ref(), "Editor");
        Ok(())
    }

    #[tokio::test]
    async fn key_counts_at_same_timestamp_are_added() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;

        store.insert_key_event(key(0, 10)).await?;
        store.insert_key_event(key(60, 5)).await?;
        store.insert_key_event(key(0, 7)).await?;

        let events = store.key_events_for(TEST_DATE).await?;
        assert_eq!(events, vec![key(0, 17), key(60, 5)]);
        Ok(())
    }

    #[tokio::test]
    async fn notes_and_blog_are_upserted() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;

        let note = |content: &str| Note {
            timestamp: at(30),
            content: content.into(),
            logical_date: TEST_DATE,
        };
        store.upsert_note(note("draft")).await?;
        store.upsert_note(note("final")).await?;
        assert_eq!(store.notes_for(TEST_DATE).await?, vec![note("final")]);

        assert_eq!(store.blog_for(TEST_DATE).await?, None);
        let blog = |content: &str| DailyBlog {
            logical_date: TEST_DATE,
            content: content.into(),
        };
        store
            .save_blog(blog("a long first entry that is longer than the second"))
            .await?;
        store.save_blog(blog("short")).await?;
        assert_eq!(store.blog_for(TEST_DATE).await?, Some(blog("short")));
        Ok(())
    }

    #[tokio::test]
    async fn missing_day_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;
        assert!(store.window_events_for(TEST_DATE).await?.is_empty());
        assert!(store.key_events_for(TEST_DATE).await?.is_empty());
        assert!(store.last_window_event().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_lines_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;
        store
            .insert_window_event(WindowEvent::new(at(0), "Terminal", TEST_DATE))
            .await?;

        let path = store.day_path(Table::Windows, TEST_DATE);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
        file.write_all(b"{\"timestamp\":\"2018-07-04T09:0")?;
        drop(file);

        assert_eq!(store.window_events_for(TEST_DATE).await?.len(), 1);

        // A broken tail forces a rewrite, which drops the broken line.
        store
            .insert_window_event(WindowEvent::new(at(10), "Editor", TEST_DATE))
            .await?;
        let content = std::fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 2);
        assert_eq!(store.window_events_for(TEST_DATE).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn unterminated_last_record_is_kept() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;

        let path = store.day_path(Table::Windows, TEST_DATE);
        let existing = serde_json::to_string(&WindowEvent::new(at(0), "Terminal", TEST_DATE))?;
        std::fs::write(&path, existing)?;

        store
            .insert_window_event(WindowEvent::new(at(10), "Editor", TEST_DATE))
            .await?;

        let apps = store
            .window_events_for(TEST_DATE)
            .await?
            .iter()
            .map(|v| v.app_name.to_string())
            .collect::<Vec<_>>();
        assert_eq!(apps, vec!["Terminal", "Editor"]);
        assert!(std::fs::read_to_string(&path)?.ends_with('\n'));
        Ok(())
    }

    #[tokio::test]
    async fn blank_tail_still_merges_same_key() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;
        let note = |content: &str| Note {
            timestamp: at(0),
            content: content.into(),
            logical_date: TEST_DATE,
        };

        store.upsert_note(note("draft")).await?;
        let path = store.day_path(Table::Notes, TEST_DATE);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
        file.write_all(b"\n")?;
        drop(file);

        store.upsert_note(note("final")).await?;
        assert_eq!(store.notes_for(TEST_DATE).await?, vec![note("final")]);

        store.insert_key_event(key(0, 4)).await?;
        let path = store.day_path(Table::Keys, TEST_DATE);
        let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
        file.write_all(b"\n\n")?;
        drop(file);

        store.insert_key_event(key(0, 6)).await?;
        assert_eq!(store.key_events_for(TEST_DATE).await?, vec![key(0, 10)]);
        Ok(())
    }

    #[tokio::test]
    async fn dates_are_listed_newest_first() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;
        let earlier = TEST_DATE.pred_opt().unwrap();
        let later = TEST_DATE.succ_opt().unwrap();

        store
            .insert_window_event(WindowEvent::new(at(0), "Terminal", TEST_DATE))
            .await?;
        store
            .insert_window_event(WindowEvent::new(at(86_400), "Terminal", later))
            .await?;
        store
            .insert_key_event(KeyEvent {
                timestamp: at(-86_400),
                key_count: 3,
                logical_date: earlier,
            })
            .await?;

        assert_eq!(
            store.available_dates().await?,
            vec![later, TEST_DATE, earlier]
        );
        assert_eq!(
            store.last_window_event().await?.map(|v| v.logical_date),
            Some(later)
        );
        Ok(())
    }

    #[tokio::test]
    async fn purge_removes_only_older_days() -> Result<()> {
        let dir = tempdir()?;
        let store = FileEventStore::new(dir.path().to_owned())?;
        let earlier = TEST_DATE.pred_opt().unwrap();

        store
            .insert_window_event(WindowEvent::new(at(-86_400), "Terminal", earlier))
            .await?;
        store
            .insert_key_event(KeyEvent {
                timestamp: at(-86_400),
                key_count: 3,
                logical_date: earlier,
            })
            .await?;
        store
            .insert_window_event(WindowEvent::new(at(0), "Terminal", TEST_DATE))
            .await?;

        assert_eq!(store.purge_older_than(TEST_DATE).await?, 2);
        assert_eq!(store.available_dates().await?, vec![TEST_DATE]);
        Ok(())
    }
}
