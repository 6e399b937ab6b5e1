use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::serp::block_types::CanonicalBlockType;
use crate::serp::fields::{array_field, str_field, SourceFields};
use crate::serp::layout::ParsedBlock;

/// Generated text attached to a citation is capped at this many characters.
pub const AI_CONTEXT_MAX_CHARS: usize = 500;

const KNOWN_TLDS: &[&str] = &[
    "com", "org", "net", "io", "co", "ai", "app", "dev", "edu", "gov", "info", "biz", "us",
    "uk", "de", "fr", "ca", "au", "in", "nl", "es", "it",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Guide,
    Article,
    Review,
    Faq,
    List,
    Product,
    Definition,
    News,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guide => "guide",
            Self::Article => "article",
            Self::Review => "review",
            Self::Faq => "faq",
            Self::List => "list",
            Self::Product => "product",
            Self::Definition => "definition",
            Self::News => "news",
        }
    }
}

// Checked in order; first match wins.
static CONTENT_PATTERNS: LazyLock<Vec<(Regex, ContentType)>> = LazyLock::new(|| {
    [
        (r"\b(guide|guides|how[- ]to|tutorial|step[- ]by[- ]step|walkthrough)\b", ContentType::Guide),
        (r"\b(blog|article|articles|post|posts)\b", ContentType::Article),
        (r"\b(review|reviews|reviewed|comparison|compare|compared|vs|versus)\b", ContentType::Review),
        (r"\b(faq|faqs|questions?|answers?)\b", ContentType::Faq),
        (r"\b(top[- ]\d+|\d+[- ](best|top|greatest|leading|popular|essential|ways|reasons|things|ideas|examples))\b", ContentType::List),
        (r"\b(product|products|shop|store|buy|pricing|price)\b", ContentType::Product),
        (r"\b(definition|define|defined|what[- ]is|what[- ]are|meaning|glossary)\b", ContentType::Definition),
        (r"\b(news|press|announces?|announced|announcement)\b", ContentType::News),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).unwrap(), kind))
    .collect()
});

/// A page cited by an AI overview, at element or overview level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AiOverviewReference {
    pub domain: String,
    pub url: Option<String>,
    pub page_title: Option<String>,
    pub source_name: String,
    pub cited_text: Option<String>,
    pub reference_position: u32,
    pub is_element_level: bool,
    pub ai_generated_context: Option<String>,
    pub content_type: Option<ContentType>,
}

/// Extract citations from every ai_overview block; other blocks yield nothing.
pub fn extract_citations(blocks: &[ParsedBlock]) -> Vec<AiOverviewReference> {
    let mut out = Vec::new();
    for block in blocks {
        if block.block_type == CanonicalBlockType::AiOverview {
            extract_block_citations(block, &mut out);
        }
    }
    out
}

fn extract_block_citations(block: &ParsedBlock, out: &mut Vec<AiOverviewReference>) {
    let mut element_urls: HashSet<String> = HashSet::new();

    for element in &block.items {
        let context = str_field(element, &["text", "markdown"]);
        for (idx, reference) in array_field(element, "references").iter().enumerate() {
            if let Some(citation) = build_citation(reference, idx, true, context.as_deref()) {
                if let Some(url) = &citation.url {
                    element_urls.insert(url.clone());
                }
                out.push(citation);
            }
        }
    }

    for (idx, reference) in block.references.iter().enumerate() {
        if let Some(citation) = build_citation(reference, idx, false, block.text.as_deref()) {
            if citation.url.as_ref().is_some_and(|u| element_urls.contains(u)) {
                continue;
            }
            out.push(citation);
        }
    }
}

fn build_citation(
    reference: &Value,
    idx: usize,
    is_element_level: bool,
    context: Option<&str>,
) -> Option<AiOverviewReference> {
    let fields = SourceFields::from_value(reference);
    if fields.url.is_none() && !fields.has_domain() {
        return None;
    }

    let source_name = fields
        .source
        .clone()
        .unwrap_or_else(|| source_name_from_domain(&fields.domain));
    let content_type = classify_content(
        fields.url.as_deref(),
        fields.title.as_deref(),
        fields.text.as_deref(),
    );

    Some(AiOverviewReference {
        source_name,
        reference_position: fields.order.unwrap_or(idx as u32 + 1),
        is_element_level,
        ai_generated_context: context.map(|c| truncate_chars(c, AI_CONTEXT_MAX_CHARS)),
        content_type,
        domain: fields.domain,
        url: fields.url,
        page_title: fields.title,
        cited_text: fields.text,
    })
}

/// "www.nerdwallet.com" -> "Nerdwallet".
pub fn source_name_from_domain(domain: &str) -> String {
    let bare = domain.strip_prefix("www.").unwrap_or(domain);
    let name = match bare.rsplit_once('.') {
        Some((head, tld)) if KNOWN_TLDS.contains(&tld) && !head.is_empty() => head,
        _ => bare,
    };
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Heuristic page classification over url + title + cited text.
pub fn classify_content(url: Option<&str>, title: Option<&str>, text: Option<&str>) -> Option<ContentType> {
    let haystack = [url, title, text]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if haystack.is_empty() {
        return None;
    }
    CONTENT_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(&haystack))
        .map(|(_, kind)| *kind)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
