use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::serp::{FeatureFlags, LayoutBlockEntry};
use crate::store::{
    AiOverviewCitationRow, CompetitorPresenceRow, IntentAlertRow, LayoutItemRow, LayoutSnapshot,
    LayoutStore, NewLayoutSnapshot,
};

pub const DEFAULT_DB_PATH: &str = "data/serp.sqlite";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a named SAVEPOINT. Savepoints nest, so batch writes stay
    /// atomic on their own and also inside an open capture.
    fn with_savepoint<T>(&self, name: &str, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        match f(&self.conn) {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {name}"))?;
                Ok(value)
            }
            Err(e) => {
                self.conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
                    .with_context(|| format!("failed to roll back {name} after: {e:#}"))?;
                Err(e)
            }
        }
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS layout_snapshots (
                id                     INTEGER PRIMARY KEY,
                keyword_id             INTEGER NOT NULL,
                captured_at            TEXT NOT NULL,
                layout_stack           TEXT NOT NULL,
                organic_start_position INTEGER NOT NULL CHECK(organic_start_position >= 1),
                organic_offset_count   INTEGER NOT NULL,
                has_ai_overview        BOOLEAN NOT NULL,
                has_featured_snippet   BOOLEAN NOT NULL,
                has_local_pack         BOOLEAN NOT NULL,
                has_people_also_ask    BOOLEAN NOT NULL,
                has_ads                BOOLEAN NOT NULL,
                has_video_carousel     BOOLEAN NOT NULL,
                stability_score        INTEGER NOT NULL CHECK(stability_score BETWEEN 0 AND 100)
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_keyword
                ON layout_snapshots(keyword_id, captured_at);

            CREATE TABLE IF NOT EXISTS layout_items (
                id            INTEGER PRIMARY KEY,
                snapshot_id   INTEGER NOT NULL REFERENCES layout_snapshots(id),
                keyword_id    INTEGER NOT NULL,
                block_type    TEXT NOT NULL,
                block_index   INTEGER NOT NULL,
                absolute_rank INTEGER,
                group_rank    INTEGER,
                title         TEXT,
                url           TEXT,
                domain        TEXT,
                description   TEXT,
                ai_text       TEXT,
                nested_count  INTEGER NOT NULL DEFAULT 0,
                UNIQUE(snapshot_id, block_index)
            );
            CREATE INDEX IF NOT EXISTS idx_items_snapshot ON layout_items(snapshot_id);

            CREATE TABLE IF NOT EXISTS competitor_presence (
                id                     INTEGER PRIMARY KEY,
                snapshot_id            INTEGER NOT NULL REFERENCES layout_snapshots(id),
                keyword_id             INTEGER NOT NULL,
                domain                 TEXT NOT NULL CHECK(domain != ''),
                block_type             TEXT NOT NULL,
                position               INTEGER,
                url                    TEXT,
                title                  TEXT,
                is_in_ai_overview      BOOLEAN NOT NULL,
                is_in_featured_snippet BOOLEAN NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_presence_domain ON competitor_presence(domain);
            CREATE INDEX IF NOT EXISTS idx_presence_keyword ON competitor_presence(keyword_id);

            CREATE TABLE IF NOT EXISTS ai_overview_citations (
                id                   INTEGER PRIMARY KEY,
                snapshot_id          INTEGER NOT NULL REFERENCES layout_snapshots(id),
                keyword_id           INTEGER NOT NULL,
                domain               TEXT NOT NULL,
                url                  TEXT,
                page_title           TEXT,
                source_name          TEXT NOT NULL,
                cited_text           TEXT,
                reference_position   INTEGER NOT NULL,
                is_element_level     BOOLEAN NOT NULL,
                ai_generated_context TEXT,
                content_type         TEXT CHECK(content_type IN
                    ('guide','article','review','faq','list','product','definition','news'))
            );
            CREATE INDEX IF NOT EXISTS idx_citations_domain ON ai_overview_citations(domain);

            CREATE TABLE IF NOT EXISTS intent_alerts (
                id             INTEGER PRIMARY KEY,
                snapshot_id    INTEGER NOT NULL REFERENCES layout_snapshots(id),
                keyword_id     INTEGER NOT NULL,
                alert_type     TEXT NOT NULL CHECK(alert_type IN
                    ('intent_shift','lost_serp_feature','organic_pushed_down',
                     'competitor_gained_feature','competitor_in_ai_overview','volatility_spike')),
                severity       TEXT NOT NULL CHECK(severity IN ('low','medium','high')),
                title          TEXT NOT NULL,
                description    TEXT NOT NULL,
                previous_state TEXT NOT NULL,
                new_state      TEXT NOT NULL,
                created_at     TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_keyword ON intent_alerts(keyword_id);
            ",
        )?;
        Ok(())
    }

    // ── Snapshots ──

    fn insert_snapshot(&self, record: NewLayoutSnapshot) -> Result<LayoutSnapshot> {
        let stack_json = serde_json::to_string(&record.layout_stack)?;
        let f = &record.flags;
        self.conn
            .execute(
                "INSERT INTO layout_snapshots
                 (keyword_id, captured_at, layout_stack, organic_start_position, organic_offset_count,
                  has_ai_overview, has_featured_snippet, has_local_pack, has_people_also_ask,
                  has_ads, has_video_carousel, stability_score)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                rusqlite::params![
                    record.keyword_id, record.captured_at, stack_json,
                    record.organic_start_position, record.organic_offset_count,
                    f.has_ai_overview, f.has_featured_snippet, f.has_local_pack,
                    f.has_people_also_ask, f.has_ads, f.has_video_carousel,
                    record.stability_score,
                ],
            )
            .with_context(|| format!("failed to insert snapshot for keyword {}", record.keyword_id))?;
        let id = self.conn.last_insert_rowid();
        Ok(record.with_id(id))
    }

    fn latest_snapshot(&self, keyword_id: i64) -> Result<Option<LayoutSnapshot>> {
        let raw = self
            .conn
            .query_row(
                &format!("{} WHERE keyword_id = ?1 ORDER BY captured_at DESC, id DESC LIMIT 1", SNAPSHOT_SELECT),
                [keyword_id],
                RawSnapshot::from_row,
            )
            .optional()?;
        raw.map(RawSnapshot::into_snapshot).transpose()
    }

    /// Most recent captures first.
    pub fn fetch_snapshot_history(&self, keyword_id: i64, limit: usize) -> Result<Vec<LayoutSnapshot>> {
        let sql = format!(
            "{} WHERE keyword_id = ?1 ORDER BY captured_at DESC, id DESC LIMIT {}",
            SNAPSHOT_SELECT, limit
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([keyword_id], RawSnapshot::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawSnapshot::into_snapshot).collect()
    }

    // ── Alerts ──

    pub fn fetch_recent_alerts(&self, keyword_id: Option<i64>, limit: usize) -> Result<Vec<AlertSummaryRow>> {
        let where_clause = if keyword_id.is_some() { " WHERE keyword_id = ?1" } else { "" };
        let sql = format!(
            "SELECT id, keyword_id, snapshot_id, alert_type, severity, title, created_at
             FROM intent_alerts{}
             ORDER BY id DESC
             LIMIT {}",
            where_clause, limit
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = match keyword_id {
            Some(id) => stmt
                .query_map([id], AlertSummaryRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], AlertSummaryRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    // ── Stats ──

    pub fn get_stats(&self) -> Result<Stats> {
        let count = |table: &str| -> Result<usize> {
            let n: usize = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok(n)
        };
        let keywords: usize = self.conn.query_row(
            "SELECT COUNT(DISTINCT keyword_id) FROM layout_snapshots",
            [],
            |r| r.get(0),
        )?;
        Ok(Stats {
            keywords,
            snapshots: count("layout_snapshots")?,
            items: count("layout_items")?,
            presences: count("competitor_presence")?,
            citations: count("ai_overview_citations")?,
            alerts: count("intent_alerts")?,
        })
    }
}

const SNAPSHOT_SELECT: &str = "SELECT id, keyword_id, captured_at, layout_stack,
        organic_start_position, organic_offset_count,
        has_ai_overview, has_featured_snippet, has_local_pack, has_people_also_ask,
        has_ads, has_video_carousel, stability_score
    FROM layout_snapshots";

/// Snapshot row before the layout stack JSON is decoded.
struct RawSnapshot {
    id: i64,
    keyword_id: i64,
    captured_at: DateTime<Utc>,
    layout_stack: String,
    organic_start_position: u32,
    organic_offset_count: u32,
    flags: FeatureFlags,
    stability_score: u8,
}

impl RawSnapshot {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            keyword_id: row.get(1)?,
            captured_at: row.get(2)?,
            layout_stack: row.get(3)?,
            organic_start_position: row.get(4)?,
            organic_offset_count: row.get(5)?,
            flags: FeatureFlags {
                has_ai_overview: row.get(6)?,
                has_featured_snippet: row.get(7)?,
                has_local_pack: row.get(8)?,
                has_people_also_ask: row.get(9)?,
                has_ads: row.get(10)?,
                has_video_carousel: row.get(11)?,
            },
            stability_score: row.get(12)?,
        })
    }

    fn into_snapshot(self) -> Result<LayoutSnapshot> {
        let layout_stack: Vec<LayoutBlockEntry> = serde_json::from_str(&self.layout_stack)
            .with_context(|| format!("corrupt layout_stack in snapshot {}", self.id))?;
        Ok(LayoutSnapshot {
            id: self.id,
            keyword_id: self.keyword_id,
            captured_at: self.captured_at,
            layout_stack,
            organic_start_position: self.organic_start_position,
            organic_offset_count: self.organic_offset_count,
            flags: self.flags,
            stability_score: self.stability_score,
        })
    }
}

pub struct AlertSummaryRow {
    pub id: i64,
    pub keyword_id: i64,
    pub snapshot_id: i64,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub created_at: String,
}

impl AlertSummaryRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            keyword_id: row.get(1)?,
            snapshot_id: row.get(2)?,
            alert_type: row.get(3)?,
            severity: row.get(4)?,
            title: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

pub struct Stats {
    pub keywords: usize,
    pub snapshots: usize,
    pub items: usize,
    pub presences: usize,
    pub citations: usize,
    pub alerts: usize,
}

#[async_trait(?Send)]
impl LayoutStore for SqliteStore {
    async fn get_latest_layout_snapshot(&self, keyword_id: i64) -> Result<Option<LayoutSnapshot>> {
        self.latest_snapshot(keyword_id)
    }

    async fn create_layout_snapshot(&self, record: NewLayoutSnapshot) -> Result<LayoutSnapshot> {
        self.insert_snapshot(record)
    }

    async fn create_layout_items(&self, rows: &[LayoutItemRow]) -> Result<()> {
        self.with_savepoint("layout_items", |conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO layout_items
                 (snapshot_id, keyword_id, block_type, block_index, absolute_rank, group_rank,
                  title, url, domain, description, ai_text, nested_count)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
            )?;
            for r in rows {
                let b = &r.block;
                let domain = (!b.domain.is_empty()).then_some(b.domain.as_str());
                stmt.execute(rusqlite::params![
                    r.snapshot_id, r.keyword_id, b.block_type.as_str(), b.block_index,
                    b.absolute_rank, b.group_rank, b.title, b.url, domain, b.description,
                    b.text, b.items.len() + b.references.len(),
                ])?;
            }
            Ok(())
        })
    }

    async fn create_competitor_presence_batch(&self, rows: &[CompetitorPresenceRow]) -> Result<()> {
        self.with_savepoint("presence_batch", |conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO competitor_presence
                 (snapshot_id, keyword_id, domain, block_type, position, url, title,
                  is_in_ai_overview, is_in_featured_snippet)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            )?;
            for r in rows {
                let p = &r.presence;
                stmt.execute(rusqlite::params![
                    r.snapshot_id, r.keyword_id, p.domain, p.block_type.as_str(), p.position,
                    p.url, p.title, p.is_in_ai_overview, p.is_in_featured_snippet,
                ])?;
            }
            Ok(())
        })
    }

    async fn create_ai_overview_citation_batch(&self, rows: &[AiOverviewCitationRow]) -> Result<()> {
        self.with_savepoint("citation_batch", |conn| {
            let mut stmt = conn.prepare(
                "INSERT INTO ai_overview_citations
                 (snapshot_id, keyword_id, domain, url, page_title, source_name, cited_text,
                  reference_position, is_element_level, ai_generated_context, content_type)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            )?;
            for r in rows {
                let c = &r.citation;
                stmt.execute(rusqlite::params![
                    r.snapshot_id, r.keyword_id, c.domain, c.url, c.page_title, c.source_name,
                    c.cited_text, c.reference_position, c.is_element_level,
                    c.ai_generated_context, c.content_type.map(|t| t.as_str()),
                ])?;
            }
            Ok(())
        })
    }

    async fn create_intent_alert(&self, row: &IntentAlertRow) -> Result<i64> {
        let a = &row.alert;
        self.conn.execute(
            "INSERT INTO intent_alerts
             (snapshot_id, keyword_id, alert_type, severity, title, description, previous_state, new_state)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            rusqlite::params![
                row.snapshot_id, row.keyword_id, a.alert_type.as_str(), a.severity.as_str(),
                a.title, a.description, a.previous_state.to_string(), a.new_state.to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    async fn begin_capture(&self) -> Result<()> {
        self.conn.execute_batch("SAVEPOINT capture")?;
        Ok(())
    }

    async fn commit_capture(&self) -> Result<()> {
        self.conn.execute_batch("RELEASE capture")?;
        Ok(())
    }

    async fn rollback_capture(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK TO capture; RELEASE capture")?;
        Ok(())
    }
}
