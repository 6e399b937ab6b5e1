pub mod block_types;
pub mod extract;
pub mod fields;
pub mod layout;

use serde_json::Value;

pub use block_types::{normalize_block_type, CanonicalBlockType};
pub use extract::{AiOverviewReference, CompetitorPresence, ContentType};
pub use layout::{FeatureFlags, LayoutBlockEntry, ParsedBlock, ParsedResult};

/// Everything derived from one SERP response, before comparison with history.
#[derive(Debug, Clone, PartialEq)]
pub struct SerpAnalysis {
    pub parsed: ParsedResult,
    pub presences: Vec<CompetitorPresence>,
    pub citations: Vec<AiOverviewReference>,
}

/// Three-stage pipeline: items → layout → presences + citations.
pub fn analyze_serp(items: &[Value]) -> SerpAnalysis {
    let parsed = layout::parse_layout(items);
    let presences = extract::extract_presences(&parsed.blocks);
    let citations = extract::extract_citations(&parsed.blocks);
    SerpAnalysis {
        parsed,
        presences,
        citations,
    }
}

/// "ads_top > organic > people_also_ask"
pub fn render_layout_stack(stack: &[LayoutBlockEntry]) -> String {
    stack
        .iter()
        .map(|e| e.block_type.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}
