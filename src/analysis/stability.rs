use std::collections::HashSet;

use serde::Serialize;

use crate::serp::{CanonicalBlockType, ParsedResult};
use crate::store::LayoutSnapshot;

pub const MAX_SCORE: f64 = 100.0;
const ORGANIC_SHIFT_PER_POSITION: f64 = 5.0;
const ORGANIC_SHIFT_CAP: f64 = 25.0;
const AI_OVERVIEW_FLIP: f64 = 15.0;
const FEATURED_SNIPPET_FLIP: f64 = 10.0;
const LOCAL_PACK_FLIP: f64 = 10.0;
const PEOPLE_ALSO_ASK_FLIP: f64 = 5.0;
const LAYOUT_WEIGHT: f64 = 35.0;

/// Individual penalties subtracted from a perfect score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StabilityBreakdown {
    pub organic_shift: f64,
    pub ai_overview: f64,
    pub featured_snippet: f64,
    pub local_pack: f64,
    pub people_also_ask: f64,
    pub layout: f64,
}

impl StabilityBreakdown {
    pub fn total_penalty(&self) -> f64 {
        self.organic_shift
            + self.ai_overview
            + self.featured_snippet
            + self.local_pack
            + self.people_also_ask
            + self.layout
    }

    pub fn score(&self) -> u8 {
        (MAX_SCORE - self.total_penalty()).clamp(0.0, MAX_SCORE).round() as u8
    }
}

pub fn stability_breakdown(current: &ParsedResult, previous: &LayoutSnapshot) -> StabilityBreakdown {
    let flip = |now: bool, before: bool, weight: f64| if now != before { weight } else { 0.0 };
    let shift = current.organic_start_position.abs_diff(previous.organic_start_position) as f64;

    let current_types = current.block_types();
    let previous_types: HashSet<CanonicalBlockType> =
        previous.layout_stack.iter().map(|e| e.block_type).collect();

    StabilityBreakdown {
        organic_shift: (ORGANIC_SHIFT_PER_POSITION * shift).min(ORGANIC_SHIFT_CAP),
        ai_overview: flip(current.flags.has_ai_overview, previous.flags.has_ai_overview, AI_OVERVIEW_FLIP),
        featured_snippet: flip(
            current.flags.has_featured_snippet,
            previous.flags.has_featured_snippet,
            FEATURED_SNIPPET_FLIP,
        ),
        local_pack: flip(current.flags.has_local_pack, previous.flags.has_local_pack, LOCAL_PACK_FLIP),
        people_also_ask: flip(
            current.flags.has_people_also_ask,
            previous.flags.has_people_also_ask,
            PEOPLE_ALSO_ASK_FLIP,
        ),
        layout: LAYOUT_WEIGHT - layout_similarity(&current_types, &previous_types),
    }
}

/// Jaccard similarity of the two block-type sets, scaled to `LAYOUT_WEIGHT`.
fn layout_similarity(a: &HashSet<CanonicalBlockType>, b: &HashSet<CanonicalBlockType>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return LAYOUT_WEIGHT;
    }
    let intersection = a.intersection(b).count();
    LAYOUT_WEIGHT * (intersection as f64 / union as f64)
}

/// 0–100 structural similarity to the previous capture; 100 for a first capture.
pub fn stability_score(current: &ParsedResult, previous: Option<&LayoutSnapshot>) -> u8 {
    match previous {
        Some(prev) => stability_breakdown(current, prev).score(),
        None => MAX_SCORE as u8,
    }
}
