pub mod intent;
pub mod stability;

pub use intent::{detect_intent_changes, AlertType, IntentAlert, Severity};
pub use stability::{stability_breakdown, stability_score, StabilityBreakdown};
