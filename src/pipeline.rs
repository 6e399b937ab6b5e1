use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analysis::{detect_intent_changes, stability_score, IntentAlert};
use crate::serp::{analyze_serp, SerpAnalysis};
use crate::store::{
    AiOverviewCitationRow, CompetitorPresenceRow, IntentAlertRow, LayoutItemRow, LayoutStore,
    NewLayoutSnapshot,
};

/// Raw provider response for one keyword.
#[derive(Debug, Clone, Deserialize)]
pub struct KeywordJob {
    pub keyword_id: i64,
    pub keyword: String,
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct KeywordOutcome {
    pub snapshot_id: i64,
    pub stability_score: u8,
    pub items: usize,
    pub presences: usize,
    pub citations: usize,
    pub alerts: Vec<IntentAlert>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub alerts_generated: usize,
}

/// Parse, score, detect and persist one keyword's SERP.
///
/// The previous snapshot is read before the new one is written, so calls for
/// the same keyword must not overlap. All writes for the capture land together
/// or not at all, so a failed keyword never becomes the next run's baseline.
pub async fn process_keyword<S: LayoutStore>(store: &S, job: &KeywordJob) -> Result<KeywordOutcome> {
    let previous = store
        .get_latest_layout_snapshot(job.keyword_id)
        .await
        .context("failed to load previous snapshot")?;

    let analysis = analyze_serp(&job.items);
    let score = stability_score(&analysis.parsed, previous.as_ref());
    let alerts = detect_intent_changes(&job.keyword, &analysis.parsed, previous.as_ref());

    store.begin_capture().await.context("failed to begin capture")?;
    match persist_capture(store, job.keyword_id, analysis, score, &alerts).await {
        Ok(mut outcome) => {
            store.commit_capture().await.context("failed to commit capture")?;
            outcome.alerts = alerts;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rb) = store.rollback_capture().await {
                warn!("Rollback for keyword {} failed: {:#}", job.keyword_id, rb);
            }
            Err(e)
        }
    }
}

async fn persist_capture<S: LayoutStore>(
    store: &S,
    keyword_id: i64,
    analysis: SerpAnalysis,
    score: u8,
    alerts: &[IntentAlert],
) -> Result<KeywordOutcome> {
    let snapshot = store
        .create_layout_snapshot(NewLayoutSnapshot::from_parsed(
            keyword_id,
            Utc::now(),
            &analysis.parsed,
            score,
        ))
        .await
        .context("failed to create layout snapshot")?;
    let snapshot_id = snapshot.id;

    let item_count = analysis.parsed.blocks.len();
    let presence_count = analysis.presences.len();
    let citation_count = analysis.citations.len();

    let items: Vec<LayoutItemRow> = analysis
        .parsed
        .blocks
        .into_iter()
        .map(|block| LayoutItemRow { snapshot_id, keyword_id, block })
        .collect();
    store
        .create_layout_items(&items)
        .await
        .context("failed to save layout items")?;

    if !analysis.presences.is_empty() {
        let rows: Vec<CompetitorPresenceRow> = analysis
            .presences
            .into_iter()
            .map(|presence| CompetitorPresenceRow { snapshot_id, keyword_id, presence })
            .collect();
        store
            .create_competitor_presence_batch(&rows)
            .await
            .context("failed to save competitor presence")?;
    }

    if !analysis.citations.is_empty() {
        let rows: Vec<AiOverviewCitationRow> = analysis
            .citations
            .into_iter()
            .map(|citation| AiOverviewCitationRow { snapshot_id, keyword_id, citation })
            .collect();
        store
            .create_ai_overview_citation_batch(&rows)
            .await
            .context("failed to save AI overview citations")?;
    }

    for alert in alerts {
        store
            .create_intent_alert(&IntentAlertRow {
                snapshot_id,
                keyword_id,
                alert: alert.clone(),
            })
            .await
            .with_context(|| format!("failed to save {} alert", alert.alert_type.as_str()))?;
    }

    Ok(KeywordOutcome {
        snapshot_id,
        stability_score: score,
        items: item_count,
        presences: presence_count,
        citations: citation_count,
        alerts: Vec::new(),
    })
}

/// Process keywords one after another. A failing keyword is logged and skipped.
///
/// `on_progress` receives `(completed, total)` after every keyword, failed or not.
pub async fn process_batch<S: LayoutStore>(
    store: &S,
    jobs: &[KeywordJob],
    mut on_progress: Option<&mut dyn FnMut(usize, usize)>,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    let total = jobs.len();

    for (i, job) in jobs.iter().enumerate() {
        match process_keyword(store, job).await {
            Ok(outcome) => {
                debug!(
                    "{} (id {}): score {}, {} blocks, {} presences, {} citations, {} alerts",
                    job.keyword,
                    job.keyword_id,
                    outcome.stability_score,
                    outcome.items,
                    outcome.presences,
                    outcome.citations,
                    outcome.alerts.len()
                );
                summary.processed += 1;
                summary.alerts_generated += outcome.alerts.len();
            }
            Err(e) => {
                warn!("Keyword {} ({}) failed: {:#}", job.keyword_id, job.keyword, e);
                summary.failed += 1;
            }
        }
        if let Some(cb) = on_progress.as_mut() {
            cb(i + 1, total);
        }
    }

    info!(
        "Batch done: {} processed, {} failed, {} alerts",
        summary.processed, summary.failed, summary.alerts_generated
    );
    summary
}
