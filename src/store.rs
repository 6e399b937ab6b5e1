//! Persistence gateway: the async boundary between the pure engine and storage.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::IntentAlert;
use crate::serp::{AiOverviewReference, CompetitorPresence, FeatureFlags, LayoutBlockEntry, ParsedBlock, ParsedResult};

/// Persisted structural record of one SERP capture. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    pub id: i64,
    pub keyword_id: i64,
    pub captured_at: DateTime<Utc>,
    pub layout_stack: Vec<LayoutBlockEntry>,
    pub organic_start_position: u32,
    pub organic_offset_count: u32,
    pub flags: FeatureFlags,
    pub stability_score: u8,
}

/// A snapshot awaiting its storage id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLayoutSnapshot {
    pub keyword_id: i64,
    pub captured_at: DateTime<Utc>,
    pub layout_stack: Vec<LayoutBlockEntry>,
    pub organic_start_position: u32,
    pub organic_offset_count: u32,
    pub flags: FeatureFlags,
    pub stability_score: u8,
}

impl NewLayoutSnapshot {
    pub fn from_parsed(
        keyword_id: i64,
        captured_at: DateTime<Utc>,
        parsed: &ParsedResult,
        stability_score: u8,
    ) -> Self {
        Self {
            keyword_id,
            captured_at,
            layout_stack: parsed.layout_stack.clone(),
            organic_start_position: parsed.organic_start_position,
            organic_offset_count: parsed.organic_offset_count,
            flags: parsed.flags,
            stability_score,
        }
    }

    pub fn with_id(self, id: i64) -> LayoutSnapshot {
        LayoutSnapshot {
            id,
            keyword_id: self.keyword_id,
            captured_at: self.captured_at,
            layout_stack: self.layout_stack,
            organic_start_position: self.organic_start_position,
            organic_offset_count: self.organic_offset_count,
            flags: self.flags,
            stability_score: self.stability_score,
        }
    }
}

pub struct LayoutItemRow {
    pub snapshot_id: i64,
    pub keyword_id: i64,
    pub block: ParsedBlock,
}

pub struct CompetitorPresenceRow {
    pub snapshot_id: i64,
    pub keyword_id: i64,
    pub presence: CompetitorPresence,
}

pub struct AiOverviewCitationRow {
    pub snapshot_id: i64,
    pub keyword_id: i64,
    pub citation: AiOverviewReference,
}

pub struct IntentAlertRow {
    pub snapshot_id: i64,
    pub keyword_id: i64,
    pub alert: IntentAlert,
}

/// Storage used by the pipeline. Any relational or document store works.
///
/// Calls for one keyword are issued strictly in order: the latest snapshot is
/// read before the new one is created. Futures are not `Send`; the pipeline
/// drives one keyword at a time on the current task.
#[async_trait(?Send)]
pub trait LayoutStore {
    async fn get_latest_layout_snapshot(&self, keyword_id: i64) -> Result<Option<LayoutSnapshot>>;

    async fn create_layout_snapshot(&self, record: NewLayoutSnapshot) -> Result<LayoutSnapshot>;

    async fn create_layout_items(&self, rows: &[LayoutItemRow]) -> Result<()>;

    async fn create_competitor_presence_batch(&self, rows: &[CompetitorPresenceRow]) -> Result<()>;

    async fn create_ai_overview_citation_batch(&self, rows: &[AiOverviewCitationRow]) -> Result<()>;

    /// Returns the new alert's id.
    async fn create_intent_alert(&self, row: &IntentAlertRow) -> Result<i64>;

    /// Open a unit of work covering every write for one capture.
    ///
    /// Stores without transactions keep the default no-ops and accept that a
    /// failed capture may leave partial rows behind.
    async fn begin_capture(&self) -> Result<()> {
        Ok(())
    }

    async fn commit_capture(&self) -> Result<()> {
        Ok(())
    }

    /// Discard everything written since `begin_capture`.
    async fn rollback_capture(&self) -> Result<()> {
        Ok(())
    }
}
