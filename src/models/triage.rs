use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::RiskLevel;

/// Permanent record of one symptom submission and its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub id: String,
    pub pet_id: String,
    pub tutor_id: String,
    pub symptoms: String,
    pub risk_level: RiskLevel,
    pub ai_summary: String,
    pub recommendations: String,
    pub created_at: NaiveDateTime,
}

/// A triage result as served to clients: the stored record plus the
/// localized labels and the legacy code of its tier.
#[derive(Debug, Clone, Serialize)]
pub struct TriageView {
    #[serde(flatten)]
    pub result: TriageResult,
    pub risk_label: &'static str,
    pub risk_notice_label: &'static str,
    pub risk_code: &'static str,
}

impl From<TriageResult> for TriageView {
    fn from(result: TriageResult) -> Self {
        let level = result.risk_level;
        Self {
            result,
            risk_label: level.label(),
            risk_notice_label: level.notice_label(),
            risk_code: level.legacy_code(),
        }
    }
}
