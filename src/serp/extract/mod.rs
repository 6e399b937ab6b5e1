pub mod citations;
pub mod presence;

pub use citations::{extract_citations, AiOverviewReference, ContentType};
pub use presence::{extract_presences, CompetitorPresence};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serp::block_types::CanonicalBlockType;
    use crate::serp::layout::parse_layout;
    use serde_json::{json, Value};

    fn fixture() -> Vec<Value> {
        let raw = std::fs::read_to_string("tests/fixtures/best_crm_software.json").unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn duplicate_overview_reference_counts_once_for_presence_but_citations_keep_urls() {
        let url = "https://www.g2.com/categories/crm";
        let items = vec![json!({
            "type": "ai_overview",
            "items": [
                {"text": "G2 lists many CRMs.", "references": [{"domain": "g2.com", "url": url}]},
                {"text": "Compare them by price.", "references": [{"domain": "g2.com", "url": url}]}
            ],
            "references": [{"domain": "g2.com", "url": url}]
        })];
        let parsed = parse_layout(&items);

        let presences = extract_presences(&parsed.blocks);
        let g2 = presences
            .iter()
            .filter(|p| p.domain == "g2.com" && p.block_type == CanonicalBlockType::AiOverview)
            .count();
        assert_eq!(g2, 2);

        let citations = extract_citations(&parsed.blocks);
        assert_eq!(citations.len(), 2);
        assert!(citations.iter().all(|c| c.is_element_level));
        assert!(citations.iter().all(|c| c.url.as_deref() == Some(url)));
    }

    #[test]
    fn fixture_presences() {
        let parsed = parse_layout(&fixture());
        let presences = extract_presences(&parsed.blocks);

        assert!(presences.iter().all(|p| !p.domain.is_empty()));
        assert!(presences.iter().any(|p| p.domain == "salesforce.com" && p.block_type == CanonicalBlockType::AdsTop));
        assert!(presences.iter().any(|p| p.domain == "blog.hubspot.com" && p.is_in_featured_snippet));

        let local: Vec<_> = presences
            .iter()
            .filter(|p| p.block_type == CanonicalBlockType::LocalPack)
            .collect();
        assert_eq!(local.len(), 2);
        assert!(local.iter().all(|p| p.position.is_none()));

        let in_overview: Vec<&str> = presences
            .iter()
            .filter(|p| p.is_in_ai_overview)
            .map(|p| p.domain.as_str())
            .collect();
        assert_eq!(in_overview, vec!["forbes.com", "g2.com", "g2.com", "zapier.com"]);
    }

    #[test]
    fn fixture_citations() {
        let parsed = parse_layout(&fixture());
        let citations = extract_citations(&parsed.blocks);
        assert_eq!(citations.len(), 4);
        assert_eq!(citations.iter().filter(|c| c.is_element_level).count(), 3);

        let forbes = &citations[0];
        assert_eq!(forbes.source_name, "Forbes Advisor");
        assert_eq!(forbes.content_type, Some(ContentType::List));
        assert_eq!(forbes.reference_position, 1);

        let zapier = citations.last().unwrap();
        assert!(!zapier.is_element_level);
        assert_eq!(zapier.source_name, "Zapier");
        assert_eq!(zapier.content_type, Some(ContentType::Article));
    }
}
