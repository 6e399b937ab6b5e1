use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::serp::ParsedResult;
use crate::store::LayoutSnapshot;

/// Organic start must drop by at least this many positions to alert.
pub const ORGANIC_PUSH_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    IntentShift,
    LostSerpFeature,
    OrganicPushedDown,
    CompetitorGainedFeature,
    CompetitorInAiOverview,
    VolatilitySpike,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntentShift => "intent_shift",
            Self::LostSerpFeature => "lost_serp_feature",
            Self::OrganicPushedDown => "organic_pushed_down",
            Self::CompetitorGainedFeature => "competitor_gained_feature",
            Self::CompetitorInAiOverview => "competitor_in_ai_overview",
            Self::VolatilitySpike => "volatility_spike",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// A meaningful structural change between two captures of one keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentAlert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Only the fields that triggered the alert.
    pub previous_state: Value,
    pub new_state: Value,
}

fn flag_alert(
    alert_type: AlertType,
    severity: Severity,
    title: String,
    description: &str,
    field: &str,
    before: bool,
    now: bool,
) -> IntentAlert {
    IntentAlert {
        alert_type,
        severity,
        title,
        description: description.to_string(),
        previous_state: json!({ field: before }),
        new_state: json!({ field: now }),
    }
}

/// Compare a fresh parse with the previous capture. First captures never alert.
///
/// Rules are independent; several may fire for one comparison.
pub fn detect_intent_changes(
    keyword: &str,
    current: &ParsedResult,
    previous: Option<&LayoutSnapshot>,
) -> Vec<IntentAlert> {
    let Some(prev) = previous else {
        return Vec::new();
    };
    let now = &current.flags;
    let before = &prev.flags;
    let mut alerts = Vec::new();

    if !before.has_ai_overview && now.has_ai_overview {
        alerts.push(flag_alert(
            AlertType::IntentShift,
            Severity::High,
            format!("AI Overview appeared for \"{}\"", keyword),
            "An AI-generated overview now sits above the results. Organic click-through for this keyword usually drops.",
            "has_ai_overview",
            false,
            true,
        ));
    }

    if before.has_ai_overview && !now.has_ai_overview {
        alerts.push(flag_alert(
            AlertType::LostSerpFeature,
            Severity::Medium,
            format!("AI Overview disappeared for \"{}\"", keyword),
            "The AI-generated overview is no longer shown. Citations previously earned in it are gone.",
            "has_ai_overview",
            true,
            false,
        ));
    }

    if !before.has_featured_snippet && now.has_featured_snippet {
        alerts.push(flag_alert(
            AlertType::IntentShift,
            Severity::Medium,
            format!("Featured snippet appeared for \"{}\"", keyword),
            "A featured snippet now answers the query directly, signalling informational intent.",
            "has_featured_snippet",
            false,
            true,
        ));
    }

    if !before.has_local_pack && now.has_local_pack {
        alerts.push(flag_alert(
            AlertType::IntentShift,
            Severity::Low,
            format!("Local pack appeared for \"{}\"", keyword),
            "A local pack is now shown, signalling local intent for this keyword.",
            "has_local_pack",
            false,
            true,
        ));
    }

    let pushed = current
        .organic_start_position
        .saturating_sub(prev.organic_start_position);
    if pushed >= ORGANIC_PUSH_THRESHOLD {
        alerts.push(IntentAlert {
            alert_type: AlertType::OrganicPushedDown,
            severity: Severity::High,
            title: format!("Organic results pushed down {} positions for \"{}\"", pushed, keyword),
            description: "SERP features above the first organic result increased, so organic listings start lower on the page.".to_string(),
            previous_state: json!({ "organic_start_position": prev.organic_start_position }),
            new_state: json!({ "organic_start_position": current.organic_start_position }),
        });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serp::layout::parse_layout;
    use crate::store::NewLayoutSnapshot;
    use chrono::Utc;

    fn snapshot_of(parsed: &ParsedResult) -> LayoutSnapshot {
        NewLayoutSnapshot::from_parsed(1, Utc::now(), parsed, 100).with_id(1)
    }

    fn organic_at(rank: u32) -> ParsedResult {
        parse_layout(&[json!({"type": "organic", "rank_absolute": rank})])
    }

    #[test]
    fn first_capture_never_alerts() {
        let parsed = parse_layout(&[json!({"type": "ai_overview"}), json!({"type": "organic", "rank_absolute": 9})]);
        assert!(detect_intent_changes("crm", &parsed, None).is_empty());
    }

    #[test]
    fn unchanged_has_no_alerts() {
        let parsed = organic_at(2);
        assert!(detect_intent_changes("crm", &parsed, Some(&snapshot_of(&parsed))).is_empty());
    }

    #[test]
    fn push_of_three_alerts_once() {
        let prev = snapshot_of(&organic_at(2));
        let alerts = detect_intent_changes("best crm", &organic_at(5), Some(&prev));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::OrganicPushedDown);
        assert_eq!(alerts[0].severity, Severity::High);
        assert!(alerts[0].title.contains("\"best crm\""));
        assert_eq!(alerts[0].previous_state, json!({"organic_start_position": 2}));
        assert_eq!(alerts[0].new_state, json!({"organic_start_position": 5}));
    }

    #[test]
    fn push_of_two_is_quiet() {
        let prev = snapshot_of(&organic_at(2));
        assert!(detect_intent_changes("best crm", &organic_at(4), Some(&prev)).is_empty());
    }

    #[test]
    fn organic_moving_up_is_quiet() {
        let prev = snapshot_of(&organic_at(9));
        assert!(detect_intent_changes("crm", &organic_at(1), Some(&prev)).is_empty());
    }

    #[test]
    fn ai_overview_gained_and_lost() {
        let with_ai = parse_layout(&[json!({"type": "ai_overview"}), json!({"type": "organic", "rank_absolute": 2})]);
        let without = parse_layout(&[json!({"type": "organic", "rank_absolute": 1})]);

        let gained = detect_intent_changes("crm", &with_ai, Some(&snapshot_of(&without)));
        assert_eq!(gained.len(), 1);
        assert_eq!(gained[0].alert_type, AlertType::IntentShift);
        assert_eq!(gained[0].severity, Severity::High);
        assert_eq!(gained[0].new_state, json!({"has_ai_overview": true}));

        let lost = detect_intent_changes("crm", &without, Some(&snapshot_of(&with_ai)));
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].alert_type, AlertType::LostSerpFeature);
        assert_eq!(lost[0].severity, Severity::Medium);
    }

    #[test]
    fn rules_fire_together() {
        let before = organic_at(1);
        let after = parse_layout(&[
            json!({"type": "ai_overview"}),
            json!({"type": "featured_snippet"}),
            json!({"type": "local_pack"}),
            json!({"type": "organic", "rank_absolute": 6}),
        ]);
        let alerts = detect_intent_changes("plumber near me", &after, Some(&snapshot_of(&before)));
        let kinds: Vec<(AlertType, Severity)> = alerts.iter().map(|a| (a.alert_type, a.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (AlertType::IntentShift, Severity::High),
                (AlertType::IntentShift, Severity::Medium),
                (AlertType::IntentShift, Severity::Low),
                (AlertType::OrganicPushedDown, Severity::High),
            ]
        );
    }

    #[test]
    fn losing_snippet_or_local_pack_is_quiet() {
        let before = parse_layout(&[
            json!({"type": "featured_snippet"}),
            json!({"type": "local_pack"}),
            json!({"type": "organic", "rank_absolute": 3}),
        ]);
        let after = organic_at(3);
        assert!(detect_intent_changes("crm", &after, Some(&snapshot_of(&before))).is_empty());
    }
}
