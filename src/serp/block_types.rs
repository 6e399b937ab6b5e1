use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of SERP block kinds the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalBlockType {
    AdsTop,
    AdsBottom,
    Organic,
    FeaturedSnippet,
    PeopleAlsoAsk,
    LocalPack,
    KnowledgePanel,
    VideoCarousel,
    ImagePack,
    Shopping,
    PopularProducts,
    TopStories,
    RelatedSearches,
    AiOverview,
    Discussions,
    TwitterCarousel,
}

impl CanonicalBlockType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AdsTop => "ads_top",
            Self::AdsBottom => "ads_bottom",
            Self::Organic => "organic",
            Self::FeaturedSnippet => "featured_snippet",
            Self::PeopleAlsoAsk => "people_also_ask",
            Self::LocalPack => "local_pack",
            Self::KnowledgePanel => "knowledge_panel",
            Self::VideoCarousel => "video_carousel",
            Self::ImagePack => "image_pack",
            Self::Shopping => "shopping",
            Self::PopularProducts => "popular_products",
            Self::TopStories => "top_stories",
            Self::RelatedSearches => "related_searches",
            Self::AiOverview => "ai_overview",
            Self::Discussions => "discussions",
            Self::TwitterCarousel => "twitter_carousel",
        }
    }

    pub fn is_ads(self) -> bool {
        matches!(self, Self::AdsTop | Self::AdsBottom)
    }
}

impl fmt::Display for CanonicalBlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use CanonicalBlockType::*;

// `None` marks provider types we recognise but deliberately drop.
const TYPE_MAP: &[(&str, Option<CanonicalBlockType>)] = &[
    ("organic", Some(Organic)),
    ("paid", Some(AdsTop)),
    ("ads", Some(AdsTop)),
    ("ads_top", Some(AdsTop)),
    ("top_ads", Some(AdsTop)),
    ("ads_bottom", Some(AdsBottom)),
    ("bottom_ads", Some(AdsBottom)),
    ("paid_bottom", Some(AdsBottom)),
    ("featured_snippet", Some(FeaturedSnippet)),
    ("answer_box", Some(FeaturedSnippet)),
    ("people_also_ask", Some(PeopleAlsoAsk)),
    ("related_questions", Some(PeopleAlsoAsk)),
    ("local_pack", Some(LocalPack)),
    ("local_results", Some(LocalPack)),
    ("knowledge_graph", Some(KnowledgePanel)),
    ("knowledge_panel", Some(KnowledgePanel)),
    ("video", Some(VideoCarousel)),
    ("videos", Some(VideoCarousel)),
    ("video_carousel", Some(VideoCarousel)),
    ("images", Some(ImagePack)),
    ("image_pack", Some(ImagePack)),
    ("shopping", Some(Shopping)),
    ("commercial_units", Some(Shopping)),
    ("popular_products", Some(PopularProducts)),
    ("top_stories", Some(TopStories)),
    ("news", Some(TopStories)),
    ("related_searches", Some(RelatedSearches)),
    ("ai_overview", Some(AiOverview)),
    ("discussions_and_forums", Some(Discussions)),
    ("discussions", Some(Discussions)),
    ("perspectives", Some(Discussions)),
    ("twitter", Some(TwitterCarousel)),
    ("twitter_carousel", Some(TwitterCarousel)),
    ("people_also_search", None),
    ("carousel", None),
    ("multi_carousel", None),
    ("map", None),
    ("hotels_pack", None),
    ("jobs", None),
    ("math_solver", None),
    ("currency_box", None),
    ("find_results_on", None),
    ("scholarly_articles", None),
];

/// Map a provider type string to its canonical block type.
///
/// Returns `None` for ignored or unknown types; callers drop those items.
pub fn normalize_block_type(provider_type: &str) -> Option<CanonicalBlockType> {
    let lower = provider_type.trim().to_lowercase();
    TYPE_MAP
        .iter()
        .find(|(name, _)| *name == lower)
        .and_then(|(_, kind)| *kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::CanonicalBlockType::*;

    #[test]
    fn known_types() {
        assert_eq!(normalize_block_type("organic"), Some(Organic));
        assert_eq!(normalize_block_type("paid"), Some(AdsTop));
        assert_eq!(normalize_block_type("ai_overview"), Some(AiOverview));
        assert_eq!(normalize_block_type("knowledge_graph"), Some(KnowledgePanel));
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(normalize_block_type("Featured_Snippet"), Some(FeaturedSnippet));
        assert_eq!(normalize_block_type("  LOCAL_PACK "), Some(LocalPack));
    }

    #[test]
    fn ignored_and_unknown() {
        assert_eq!(normalize_block_type("people_also_search"), None);
        assert_eq!(normalize_block_type("carousel"), None);
        assert_eq!(normalize_block_type("hologram_box"), None);
        assert_eq!(normalize_block_type(""), None);
    }

    #[test]
    fn canonical_names_round_through_table() {
        for kind in [
            AdsTop, AdsBottom, Organic, FeaturedSnippet, PeopleAlsoAsk, LocalPack,
            KnowledgePanel, VideoCarousel, ImagePack, Shopping, PopularProducts,
            TopStories, RelatedSearches, AiOverview, Discussions, TwitterCarousel,
        ] {
            assert_eq!(normalize_block_type(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&PeopleAlsoAsk).unwrap();
        assert_eq!(json, "\"people_also_ask\"");
    }
}
