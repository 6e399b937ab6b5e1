use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use url::Url;

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[a-z][a-z0-9+.-]*://)?(?:[^@/\s]*@)?([a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,})")
        .unwrap()
});

/// Canonical view over one provider object (item, sub-item or reference).
///
/// Providers spell the same thing several ways (`domain`/`url`/`link`,
/// `order`/`position`, `text`/`snippet`/`description`); every extraction stage
/// goes through this record instead of repeating the fallback chains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFields {
    /// Resolved domain; empty when nothing host-like was found.
    pub domain: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub source: Option<String>,
    /// Upstream ordinal: numeric `order`, else numeric `position`.
    pub order: Option<u32>,
}

impl SourceFields {
    pub fn from_value(value: &Value) -> Self {
        let url = str_field(value, &["url", "link"]);
        let domain = str_field(value, &["domain"])
            .map(|d| resolve_domain(&d))
            .filter(|d| !d.is_empty())
            .or_else(|| url.as_deref().map(resolve_domain))
            .unwrap_or_default();

        Self {
            domain,
            url,
            title: str_field(value, &["title", "name"]),
            text: str_field(value, &["text", "snippet", "description"]),
            source: str_field(value, &["source", "source_name"]),
            order: numeric_field(value, "order").or_else(|| numeric_field(value, "position")),
        }
    }

    pub fn has_domain(&self) -> bool {
        !self.domain.is_empty()
    }
}

/// First non-empty string among `keys`.
pub fn str_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        value
            .get(*k)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Positive integer at `key`, accepting integer-valued numbers and numeric strings.
/// Directional sentinels like `"left"`/`"right"` yield `None`.
pub fn numeric_field(value: &Value, key: &str) -> Option<u32> {
    match value.get(key)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

/// Array at `key`, or an empty slice.
pub fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Resolve a URL or bare host to a lowercase domain without a leading `www.`.
///
/// Returns an empty string when nothing host-like can be found.
pub fn resolve_domain(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let host = match Url::parse(raw) {
        Ok(parsed) => parsed.host_str().map(str::to_string),
        Err(_) => None,
    }
    .or_else(|| HOST_RE.captures(raw).map(|c| c[1].to_string()));

    match host {
        Some(h) => {
            let h = h.to_lowercase();
            h.strip_prefix("www.").unwrap_or(&h).to_string()
        }
        None => String::new(),
    }
}
