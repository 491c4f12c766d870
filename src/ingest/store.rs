// src/ingest/store.rs
//
// Persistence gateway. `upsert` is the only write path: insert when the url
// is new, overwrite every other column when it is not. Failures are logged
// and reported as `false`, never raised. SQLite work runs on the blocking pool.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::ingest::types::{Category, HackathonListing, JobPosting, RecordRef};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert-or-overwrite keyed by `url`. Returns whether the write landed.
    async fn upsert(&self, record: RecordRef<'_>) -> bool;
    async fn count(&self, category: Category) -> Result<usize>;
    /// Stored rows per `source`, sorted by source name.
    async fn counts_by_source(&self, category: Category) -> Result<Vec<(String, usize)>>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS jobs (
        url          TEXT PRIMARY KEY NOT NULL,
        title        TEXT NOT NULL,
        company      TEXT NOT NULL,
        location     TEXT NOT NULL,
        type         TEXT NOT NULL,
        salary_range TEXT NOT NULL,
        source       TEXT NOT NULL,
        posted_at    TEXT NOT NULL,
        created_at   TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_jobs_source ON jobs(source);

    CREATE TABLE IF NOT EXISTS hackathons (
        url          TEXT PRIMARY KEY NOT NULL,
        name         TEXT NOT NULL,
        organizer    TEXT NOT NULL,
        description  TEXT NOT NULL,
        dates        TEXT NOT NULL,
        location     TEXT NOT NULL,
        source       TEXT NOT NULL,
        tags         TEXT NOT NULL,
        prizes       TEXT NOT NULL,
        created_at   TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_hackathons_source ON hackathons(source);
";

const UPSERT_JOB: &str = "
    INSERT INTO jobs (url, title, company, location, type, salary_range, source, posted_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(url) DO UPDATE SET
        title = excluded.title,
        company = excluded.company,
        location = excluded.location,
        type = excluded.type,
        salary_range = excluded.salary_range,
        source = excluded.source,
        posted_at = excluded.posted_at,
        updated_at = datetime('now')
";

const UPSERT_HACKATHON: &str = "
    INSERT INTO hackathons
        (url, name, organizer, description, dates, location, source, tags, prizes)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(url) DO UPDATE SET
        name = excluded.name,
        organizer = excluded.organizer,
        description = excluded.description,
        dates = excluded.dates,
        location = excluded.location,
        source = excluded.source,
        tags = excluded.tags,
        prizes = excluded.prizes,
        updated_at = datetime('now')
";

/// SQLite-backed catalog.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating store directory {}", dir.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening catalog {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("creating catalog schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        lock_conn(&self.conn)
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&lock_conn(&conn)))
            .await
            .context("catalog task join")?
    }

    /// Stored posting for `url`, if any.
    pub fn job(&self, url: &str) -> Result<Option<JobPosting>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT title, company, location, type, salary_range, url, source, posted_at
                 FROM jobs WHERE url = ?1",
                [url],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                        r.get::<_, String>(6)?,
                        r.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()?;
        let Some((title, company, location, kind, salary_range, url, source, posted_at)) = row
        else {
            return Ok(None);
        };
        Ok(Some(JobPosting {
            title,
            company,
            location,
            kind: serde_json::from_value(serde_json::Value::String(kind))
                .context("stored job type")?,
            salary_range,
            url,
            source,
            posted_at: chrono::NaiveDate::parse_from_str(&posted_at, "%Y-%m-%d")
                .context("stored posted_at")?,
        }))
    }

    /// Stored hackathon for `url`, if any.
    pub fn hackathon(&self, url: &str) -> Result<Option<HackathonListing>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT name, organizer, description, dates, location, url, source, tags, prizes
                 FROM hackathons WHERE url = ?1",
                [url],
                |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, String>(2)?,
                        r.get::<_, String>(3)?,
                        r.get::<_, String>(4)?,
                        r.get::<_, String>(5)?,
                        r.get::<_, String>(6)?,
                        r.get::<_, String>(7)?,
                        r.get::<_, String>(8)?,
                    ))
                },
            )
            .optional()?;
        let Some((name, organizer, description, dates, location, url, source, tags, prizes)) = row
        else {
            return Ok(None);
        };
        Ok(Some(HackathonListing {
            name,
            organizer,
            description,
            dates,
            location,
            url,
            source,
            tags: serde_json::from_str(&tags).context("stored tags")?,
            prizes,
        }))
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match conn.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_record(conn: &Connection, record: RecordRef<'_>) -> Result<()> {
    match record {
        RecordRef::Job(j) => {
            conn.execute(
                UPSERT_JOB,
                params![
                    j.url,
                    j.title,
                    j.company,
                    j.location,
                    j.kind.as_str(),
                    j.salary_range,
                    j.source,
                    j.posted_at.format("%Y-%m-%d").to_string(),
                ],
            )?;
        }
        RecordRef::Hackathon(h) => {
            let tags = serde_json::to_string(&h.tags)?;
            conn.execute(
                UPSERT_HACKATHON,
                params![
                    h.url,
                    h.name,
                    h.organizer,
                    h.description,
                    h.dates,
                    h.location,
                    h.source,
                    tags,
                    h.prizes
                ],
            )?;
        }
    }
    Ok(())
}

/// Owned copy of a record for the blocking pool.
enum OwnedRecord {
    Job(JobPosting),
    Hackathon(HackathonListing),
}

impl OwnedRecord {
    fn as_record(&self) -> RecordRef<'_> {
        match self {
            OwnedRecord::Job(j) => RecordRef::Job(j),
            OwnedRecord::Hackathon(h) => RecordRef::Hackathon(h),
        }
    }
}

impl From<RecordRef<'_>> for OwnedRecord {
    fn from(record: RecordRef<'_>) -> Self {
        match record {
            RecordRef::Job(j) => OwnedRecord::Job(j.clone()),
            RecordRef::Hackathon(h) => OwnedRecord::Hackathon(h.clone()),
        }
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn upsert(&self, record: RecordRef<'_>) -> bool {
        let owned = OwnedRecord::from(record);
        match self
            .run_blocking(move |conn| write_record(conn, owned.as_record()))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    category = %record.category(),
                    url = record.url(),
                    error = ?e,
                    "upsert failed"
                );
                false
            }
        }
    }

    async fn count(&self, category: Category) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", category.as_str());
        let n: i64 = self
            .run_blocking(move |conn| Ok(conn.query_row(&sql, [], |r| r.get(0))?))
            .await?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    async fn counts_by_source(&self, category: Category) -> Result<Vec<(String, usize)>> {
        let sql = format!(
            "SELECT source, COUNT(*) FROM {} GROUP BY source ORDER BY source",
            category.as_str()
        );
        let rows = self
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|(s, n)| (s, usize::try_from(n).unwrap_or_default()))
            .collect())
    }
}

/// In-process catalog with optional failure injection.
#[derive(Default)]
pub struct MemoryStore {
    jobs: Mutex<BTreeMap<String, JobPosting>>,
    hackathons: Mutex<BTreeMap<String, HackathonListing>>,
    fail_urls: HashSet<String>,
    writes: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes for `url` will be rejected, like a store-side constraint failure.
    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.fail_urls.insert(url.into());
        self
    }

    pub fn jobs(&self) -> Vec<JobPosting> {
        self.jobs.lock().map(|m| m.values().cloned().collect()).unwrap_or_default()
    }

    pub fn hackathons(&self) -> Vec<HackathonListing> {
        self.hackathons
            .lock()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Every url passed to `upsert`, in call order, including rejected ones.
    pub fn write_log(&self) -> Vec<String> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn upsert(&self, record: RecordRef<'_>) -> bool {
        if let Ok(mut w) = self.writes.lock() {
            w.push(record.url().to_string());
        }
        if self.fail_urls.contains(record.url()) {
            tracing::warn!(category = %record.category(), url = record.url(), "upsert rejected");
            return false;
        }
        match record {
            RecordRef::Job(j) => self
                .jobs
                .lock()
                .map(|mut m| m.insert(j.url.clone(), j.clone()))
                .is_ok(),
            RecordRef::Hackathon(h) => self
                .hackathons
                .lock()
                .map(|mut m| m.insert(h.url.clone(), h.clone()))
                .is_ok(),
        }
    }

    async fn count(&self, category: Category) -> Result<usize> {
        Ok(match category {
            Category::Jobs => self.jobs().len(),
            Category::Hackathons => self.hackathons().len(),
        })
    }

    async fn counts_by_source(&self, category: Category) -> Result<Vec<(String, usize)>> {
        let sources: Vec<String> = match category {
            Category::Jobs => self.jobs().into_iter().map(|j| j.source).collect(),
            Category::Hackathons => self.hackathons().into_iter().map(|h| h.source).collect(),
        };
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for s in sources {
            *counts.entry(s).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{JobKind, Tags};
    use chrono::NaiveDate;

    fn hackathon(url: &str, name: &str) -> HackathonListing {
        HackathonListing {
            name: name.into(),
            organizer: "Org".into(),
            description: String::new(),
            dates: "2025-01-01 - 2025-01-02".into(),
            location: "Online".into(),
            url: url.into(),
            source: "Unstop".into(),
            tags: ["Hackathon", "Unstop"].into_iter().collect::<Tags>(),
            prizes: "See Details".into(),
        }
    }

    #[tokio::test]
    async fn hackathon_roundtrips_tags_and_overwrites() {
        let store = SqliteStore::open_in_memory().unwrap();
        let url = "https://unstop.com/hackathons/a";
        assert!(store.upsert(RecordRef::Hackathon(&hackathon(url, "First"))).await);
        assert!(store.upsert(RecordRef::Hackathon(&hackathon(url, "Second"))).await);
        assert_eq!(store.count(Category::Hackathons).await.unwrap(), 1);
        let got = store.hackathon(url).unwrap().unwrap();
        assert_eq!(got.name, "Second");
        assert_eq!(got.tags.as_slice(), &["Hackathon", "Unstop"]);
    }

    #[tokio::test]
    async fn categories_are_separate_namespaces() {
        let store = SqliteStore::open_in_memory().unwrap();
        let url = "https://unstop.com/shared-slug";
        let job = JobPosting {
            title: "SDE".into(),
            company: "Acme".into(),
            location: "India".into(),
            kind: JobKind::Job,
            salary_range: "N/A".into(),
            url: url.into(),
            source: "Unstop".into(),
            posted_at: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        };
        assert!(store.upsert(RecordRef::Job(&job)).await);
        assert!(store.upsert(RecordRef::Hackathon(&hackathon(url, "Hack"))).await);
        assert_eq!(store.count(Category::Jobs).await.unwrap(), 1);
        assert_eq!(store.count(Category::Hackathons).await.unwrap(), 1);
        assert_eq!(store.job(url).unwrap().unwrap(), job);
    }

    #[tokio::test]
    async fn memory_store_failure_injection() {
        let url = "https://x.test/bad";
        let store = MemoryStore::new().failing_on(url);
        assert!(!store.upsert(RecordRef::Hackathon(&hackathon(url, "Bad"))).await);
        assert_eq!(store.count(Category::Hackathons).await.unwrap(), 0);
        assert_eq!(store.write_log(), vec![url.to_string()]);
    }
}
