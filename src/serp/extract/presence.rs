use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::serp::block_types::CanonicalBlockType;
use crate::serp::fields::{array_field, resolve_domain, SourceFields};
use crate::serp::layout::ParsedBlock;

/// A competitor domain sighted in one block of the SERP.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitorPresence {
    pub domain: String,
    pub block_type: CanonicalBlockType,
    pub position: Option<u32>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub is_in_ai_overview: bool,
    pub is_in_featured_snippet: bool,
}

/// Presences accumulated over one parse, keyed by (domain, block type).
#[derive(Default)]
struct PresenceSet {
    seen: HashSet<(String, CanonicalBlockType)>,
    rows: Vec<CompetitorPresence>,
}

impl PresenceSet {
    fn contains(&self, domain: &str, kind: CanonicalBlockType) -> bool {
        self.seen.contains(&(domain.to_string(), kind))
    }

    /// Records a sighting; empty domains are never competitors.
    fn push(&mut self, kind: CanonicalBlockType, position: Option<u32>, fields: SourceFields) {
        if !fields.has_domain() {
            return;
        }
        self.seen.insert((fields.domain.clone(), kind));
        self.rows.push(CompetitorPresence {
            domain: fields.domain,
            block_type: kind,
            position,
            url: fields.url,
            title: fields.title,
            is_in_ai_overview: kind == CanonicalBlockType::AiOverview,
            is_in_featured_snippet: kind == CanonicalBlockType::FeaturedSnippet,
        });
    }

    fn push_unless_seen(&mut self, kind: CanonicalBlockType, position: Option<u32>, fields: SourceFields) {
        if fields.has_domain() && !self.contains(&fields.domain, kind) {
            self.push(kind, position, fields);
        }
    }
}

/// Derive competitor presences for every block of a parse.
pub fn extract_presences(blocks: &[ParsedBlock]) -> Vec<CompetitorPresence> {
    let mut set = PresenceSet::default();

    for block in blocks {
        let kind = block.block_type;
        set.push(kind, block.rank(), baseline_fields(block));

        match kind {
            CanonicalBlockType::AiOverview => {
                for element in &block.items {
                    for reference in array_field(element, "references") {
                        set.push(kind, block.rank(), SourceFields::from_value(reference));
                    }
                }
                for reference in &block.references {
                    set.push_unless_seen(kind, block.rank(), SourceFields::from_value(reference));
                }
            }
            CanonicalBlockType::FeaturedSnippet => {
                if let Some(source) = block.items.iter().map(SourceFields::from_value).find(SourceFields::has_domain) {
                    set.push_unless_seen(kind, block.rank(), source);
                }
            }
            CanonicalBlockType::LocalPack => {
                for listing in &block.items {
                    set.push(kind, None, listing_fields(listing));
                }
            }
            CanonicalBlockType::Organic
            | CanonicalBlockType::AdsTop
            | CanonicalBlockType::AdsBottom
            | CanonicalBlockType::PeopleAlsoAsk
            | CanonicalBlockType::KnowledgePanel
            | CanonicalBlockType::VideoCarousel
            | CanonicalBlockType::ImagePack
            | CanonicalBlockType::Shopping
            | CanonicalBlockType::PopularProducts
            | CanonicalBlockType::TopStories
            | CanonicalBlockType::RelatedSearches
            | CanonicalBlockType::Discussions
            | CanonicalBlockType::TwitterCarousel => {}
        }
    }

    set.rows
}

fn baseline_fields(block: &ParsedBlock) -> SourceFields {
    SourceFields {
        domain: block.domain.clone(),
        url: block.url.clone(),
        title: block.title.clone(),
        ..SourceFields::default()
    }
}

/// Local listings often carry only a website field.
fn listing_fields(listing: &Value) -> SourceFields {
    let mut fields = SourceFields::from_value(listing);
    if !fields.has_domain() {
        if let Some(site) = listing.get("website").and_then(Value::as_str) {
            fields.domain = resolve_domain(site);
            fields.url.get_or_insert_with(|| site.to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serp::layout::parse_layout;
    use serde_json::json;

    fn presences(items: Vec<Value>) -> Vec<CompetitorPresence> {
        extract_presences(&parse_layout(&items).blocks)
    }

    #[test]
    fn organic_baseline() {
        let p = presences(vec![json!({
            "type": "organic", "rank_absolute": 3, "rank_group": 1,
            "url": "https://www.Zoho.com/crm/", "title": "Zoho CRM"
        })]);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].domain, "zoho.com");
        assert_eq!(p[0].position, Some(3));
        assert_eq!(p[0].title.as_deref(), Some("Zoho CRM"));
        assert!(!p[0].is_in_ai_overview && !p[0].is_in_featured_snippet);
    }

    #[test]
    fn position_falls_back_to_group_rank() {
        let p = presences(vec![json!({"type": "organic", "rank_group": 7, "domain": "a.com"})]);
        assert_eq!(p[0].position, Some(7));
    }

    #[test]
    fn blocks_without_domain_yield_nothing() {
        let p = presences(vec![
            json!({"type": "people_also_ask", "rank_absolute": 4}),
            json!({"type": "organic", "url": "not a url"}),
        ]);
        assert!(p.is_empty());
    }

    #[test]
    fn ai_overview_overview_level_duplicate_suppressed() {
        let p = presences(vec![json!({
            "type": "ai_overview",
            "rank_absolute": 1,
            "items": [
                {"type": "ai_overview_element", "text": "A", "references": [
                    {"domain": "www.g2.com", "url": "https://www.g2.com/categories/crm"}
                ]},
                {"type": "ai_overview_element", "text": "B", "references": [
                    {"domain": "g2.com", "url": "https://www.g2.com/categories/crm"}
                ]}
            ],
            "references": [
                {"domain": "g2.com", "url": "https://www.g2.com/categories/crm"}
            ]
        })]);
        let g2: Vec<_> = p
            .iter()
            .filter(|x| x.domain == "g2.com" && x.block_type == CanonicalBlockType::AiOverview)
            .collect();
        assert_eq!(g2.len(), 2);
        assert!(g2.iter().all(|x| x.is_in_ai_overview));
    }

    #[test]
    fn ai_overview_new_overview_level_domain_recorded() {
        let p = presences(vec![json!({
            "type": "ai_overview",
            "items": [{"references": [{"url": "https://a.com/1"}]}],
            "references": [{"url": "https://b.com/1"}, {"url": "https://b.com/2"}]
        })]);
        let domains: Vec<&str> = p.iter().map(|x| x.domain.as_str()).collect();
        assert_eq!(domains, vec!["a.com", "b.com"]);
    }

    #[test]
    fn featured_snippet_single_presence() {
        let p = presences(vec![json!({
            "type": "featured_snippet", "rank_absolute": 2,
            "domain": "hubspot.com", "url": "https://blog.hubspot.com/sales/crm",
            "items": [{"domain": "hubspot.com"}]
        })]);
        assert_eq!(p.len(), 1);
        assert!(p[0].is_in_featured_snippet);
    }

    #[test]
    fn featured_snippet_nested_source_when_block_has_none() {
        let p = presences(vec![json!({
            "type": "featured_snippet",
            "items": [{"title": "no source"}, {"url": "https://www.nerdwallet.com/article/crm"}]
        })]);
        assert_eq!(p.len(), 1);
        assert_eq!(p[0].domain, "nerdwallet.com");
    }

    #[test]
    fn local_pack_listings_have_no_position() {
        let p = presences(vec![json!({
            "type": "local_pack", "rank_absolute": 5,
            "items": [
                {"title": "Acme CRM Consulting", "domain": "acmecrm.com"},
                {"title": "Best Sales Tools", "website": "https://www.bestsales.io/"},
                {"title": "No Website Shop"}
            ]
        })]);
        assert_eq!(p.len(), 2);
        assert!(p.iter().all(|x| x.position.is_none()));
        assert_eq!(p[1].domain, "bestsales.io");
    }
}
