use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::block_types::{normalize_block_type, CanonicalBlockType};
use super::fields::{array_field, numeric_field, str_field, SourceFields};

/// One distinct block type in the layout stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBlockEntry {
    pub block_type: CanonicalBlockType,
    /// 1-based, order of first appearance.
    pub position: u32,
    /// Always 1; repeat occurrences of the same type are not counted.
    pub result_count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub has_ai_overview: bool,
    pub has_featured_snippet: bool,
    pub has_local_pack: bool,
    pub has_people_also_ask: bool,
    pub has_ads: bool,
    pub has_video_carousel: bool,
}

impl FeatureFlags {
    fn mark(&mut self, kind: CanonicalBlockType) {
        match kind {
            CanonicalBlockType::AiOverview => self.has_ai_overview = true,
            CanonicalBlockType::FeaturedSnippet => self.has_featured_snippet = true,
            CanonicalBlockType::LocalPack => self.has_local_pack = true,
            CanonicalBlockType::PeopleAlsoAsk => self.has_people_also_ask = true,
            CanonicalBlockType::AdsTop | CanonicalBlockType::AdsBottom => self.has_ads = true,
            CanonicalBlockType::VideoCarousel => self.has_video_carousel = true,
            CanonicalBlockType::Organic
            | CanonicalBlockType::KnowledgePanel
            | CanonicalBlockType::ImagePack
            | CanonicalBlockType::Shopping
            | CanonicalBlockType::PopularProducts
            | CanonicalBlockType::TopStories
            | CanonicalBlockType::RelatedSearches
            | CanonicalBlockType::Discussions
            | CanonicalBlockType::TwitterCarousel => {}
        }
    }
}

/// One accepted provider item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedBlock {
    pub block_type: CanonicalBlockType,
    /// 0-based, dense across accepted items.
    pub block_index: u32,
    pub absolute_rank: Option<u32>,
    pub group_rank: Option<u32>,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Empty when the item carries no resolvable domain.
    pub domain: String,
    pub description: Option<String>,
    /// Generated/snippet text, only kept for ai_overview and featured_snippet.
    pub text: Option<String>,
    pub items: Vec<Value>,
    pub references: Vec<Value>,
}

impl ParsedBlock {
    /// Provider rank used for competitor positions: absolute, else group.
    pub fn rank(&self) -> Option<u32> {
        self.absolute_rank.or(self.group_rank)
    }
}

/// Structural record for one SERP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedResult {
    pub layout_stack: Vec<LayoutBlockEntry>,
    pub organic_start_position: u32,
    pub organic_offset_count: u32,
    pub flags: FeatureFlags,
    pub blocks: Vec<ParsedBlock>,
}

impl ParsedResult {
    pub fn block_types(&self) -> HashSet<CanonicalBlockType> {
        self.layout_stack.iter().map(|e| e.block_type).collect()
    }
}

/// Per-parse accumulator; lives for one `parse_layout` call only.
#[derive(Default)]
struct LayoutState {
    seen: HashSet<CanonicalBlockType>,
    stack: Vec<LayoutBlockEntry>,
    flags: FeatureFlags,
    organic_start: Option<u32>,
    organic_offset: Option<u32>,
    blocks: Vec<ParsedBlock>,
}

impl LayoutState {
    fn accept(&mut self, kind: CanonicalBlockType, item: &Value) {
        let block_index = self.blocks.len() as u32;

        if self.seen.insert(kind) {
            self.stack.push(LayoutBlockEntry {
                block_type: kind,
                position: block_index + 1,
                result_count: 1,
            });
        }
        self.flags.mark(kind);

        // Ranks are 1-based; a zero from the provider is treated as missing.
        let absolute_rank = numeric_field(item, "rank_absolute").filter(|r| *r >= 1);
        if kind == CanonicalBlockType::Organic && self.organic_start.is_none() {
            self.organic_start = Some(absolute_rank.unwrap_or(block_index + 1));
            self.organic_offset = Some(block_index);
        }

        self.blocks.push(build_block(kind, block_index, absolute_rank, item));
    }

    fn finish(self) -> ParsedResult {
        let total = self.blocks.len() as u32;
        ParsedResult {
            layout_stack: self.stack,
            organic_start_position: self.organic_start.unwrap_or(total + 1),
            organic_offset_count: self.organic_offset.unwrap_or(total),
            flags: self.flags,
            blocks: self.blocks,
        }
    }
}

fn build_block(
    kind: CanonicalBlockType,
    block_index: u32,
    absolute_rank: Option<u32>,
    item: &Value,
) -> ParsedBlock {
    let fields = SourceFields::from_value(item);
    let text = match kind {
        CanonicalBlockType::AiOverview => overview_text(item),
        CanonicalBlockType::FeaturedSnippet => str_field(item, &["text", "snippet", "description"]),
        _ => None,
    };

    ParsedBlock {
        block_type: kind,
        block_index,
        absolute_rank,
        group_rank: numeric_field(item, "rank_group").filter(|r| *r >= 1),
        title: fields.title,
        url: fields.url,
        domain: fields.domain,
        description: str_field(item, &["description", "snippet"]),
        text,
        items: array_field(item, "items").to_vec(),
        references: array_field(item, "references").to_vec(),
    }
}

/// AI overview text: the block's own text, else its elements' text joined.
fn overview_text(item: &Value) -> Option<String> {
    str_field(item, &["text", "markdown"]).or_else(|| {
        let parts: Vec<String> = array_field(item, "items")
            .iter()
            .filter_map(|el| str_field(el, &["text", "markdown"]))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    })
}

/// Walk the provider items in order and build the layout record.
pub fn parse_layout(items: &[Value]) -> ParsedResult {
    let mut state = LayoutState::default();
    for item in items {
        let Some(kind) = item
            .get("type")
            .and_then(Value::as_str)
            .and_then(normalize_block_type)
        else {
            continue;
        };
        state.accept(kind, item);
    }
    state.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_response() {
        let r = parse_layout(&[]);
        assert!(r.layout_stack.is_empty());
        assert_eq!(r.organic_start_position, 1);
        assert_eq!(r.organic_offset_count, 0);
        assert_eq!(r.flags, FeatureFlags::default());
        assert!(r.blocks.is_empty());
    }

    #[test]
    fn only_ignored_items() {
        let items = vec![json!({"type": "people_also_search"}), json!({"type": "unknown_widget"})];
        let r = parse_layout(&items);
        assert!(r.layout_stack.is_empty());
        assert_eq!(r.organic_start_position, 1);
        assert!(r.blocks.is_empty());
    }

    #[test]
    fn ads_organic_paa_order() {
        let items = vec![
            json!({"type": "paid", "rank_absolute": 1, "domain": "ads.example.com"}),
            json!({"type": "organic", "rank_absolute": 2, "url": "https://www.hubspot.com/crm"}),
            json!({"type": "people_also_ask", "rank_absolute": 3}),
        ];
        let r = parse_layout(&items);
        let stack: Vec<_> = r.layout_stack.iter().map(|e| (e.block_type, e.position)).collect();
        assert_eq!(
            stack,
            vec![
                (CanonicalBlockType::AdsTop, 1),
                (CanonicalBlockType::Organic, 2),
                (CanonicalBlockType::PeopleAlsoAsk, 3),
            ]
        );
        assert_eq!(r.organic_start_position, 2);
        assert_eq!(r.organic_offset_count, 1);
        assert!(r.flags.has_ads);
        assert!(r.flags.has_people_also_ask);
        assert!(!r.flags.has_ai_overview);
    }

    #[test]
    fn repeated_type_keeps_single_entry_with_count_one() {
        let items = vec![
            json!({"type": "organic", "rank_absolute": 1}),
            json!({"type": "organic", "rank_absolute": 2}),
            json!({"type": "organic", "rank_absolute": 3}),
        ];
        let r = parse_layout(&items);
        assert_eq!(r.layout_stack.len(), 1);
        assert_eq!(r.layout_stack[0].result_count, 1);
        assert_eq!(r.blocks.len(), 3);
        let indexes: Vec<u32> = r.blocks.iter().map(|b| b.block_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn ignored_items_do_not_consume_indexes() {
        let items = vec![
            json!({"type": "carousel"}),
            json!({"type": "ai_overview", "text": "Summary"}),
            json!({"type": "map"}),
            json!({"type": "organic"}),
        ];
        let r = parse_layout(&items);
        assert_eq!(r.blocks.len(), 2);
        assert_eq!(r.layout_stack[1].position, 2);
        // no rank_absolute: falls back to block_index + 1
        assert_eq!(r.organic_start_position, 2);
        assert_eq!(r.organic_offset_count, 1);
    }

    #[test]
    fn zero_rank_falls_back_to_index() {
        let items = vec![
            json!({"type": "paid"}),
            json!({"type": "organic", "rank_absolute": 0, "rank_group": 0}),
        ];
        let r = parse_layout(&items);
        assert_eq!(r.organic_start_position, 2);
        assert_eq!(r.blocks[1].absolute_rank, None);
        assert_eq!(r.blocks[1].rank(), None);
    }

    #[test]
    fn no_organic_means_fully_obscured() {
        let items = vec![
            json!({"type": "paid"}),
            json!({"type": "local_pack"}),
            json!({"type": "people_also_ask"}),
        ];
        let r = parse_layout(&items);
        assert_eq!(r.organic_start_position, 4);
        assert_eq!(r.organic_offset_count, 3);
        assert!(r.flags.has_local_pack);
    }

    #[test]
    fn overview_text_from_elements() {
        let items = vec![json!({
            "type": "ai_overview",
            "items": [
                {"type": "ai_overview_element", "text": "First part."},
                {"type": "ai_overview_element", "text": "Second part."}
            ]
        })];
        let r = parse_layout(&items);
        assert_eq!(r.blocks[0].text.as_deref(), Some("First part.\nSecond part."));
        assert_eq!(r.blocks[0].items.len(), 2);
    }

    #[test]
    fn parse_is_pure() {
        let md = std::fs::read_to_string("tests/fixtures/best_crm_software.json").unwrap();
        let items: Vec<Value> = serde_json::from_str(&md).unwrap();
        assert_eq!(parse_layout(&items), parse_layout(&items));
    }

    #[test]
    fn fixture_layout() {
        let md = std::fs::read_to_string("tests/fixtures/best_crm_software.json").unwrap();
        let items: Vec<Value> = serde_json::from_str(&md).unwrap();
        let r = parse_layout(&items);
        let kinds: Vec<&str> = r.layout_stack.iter().map(|e| e.block_type.as_str()).collect();
        assert_eq!(
            kinds,
            vec!["ads_top", "ai_overview", "featured_snippet", "organic", "people_also_ask", "local_pack", "video_carousel"]
        );
        assert_eq!(r.organic_start_position, 4);
        assert_eq!(r.organic_offset_count, 3);
        assert!(r.flags.has_ai_overview && r.flags.has_featured_snippet && r.flags.has_video_carousel);
    }
}
