use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    GuardRejection,
    GuardWarning,
    EntryRejection,
    ExitCorrection,
}

/// One rejection, warning or correction, recorded for telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    pub timestamp_ms: u64,
    pub symbol: String,
    pub category: AuditCategory,
    /// Fixed reason code
    pub code: String,
    /// Numeric context
    pub detail: String,
}

impl AuditEntry {
    pub fn new(
        timestamp_ms: u64,
        symbol: &str,
        category: AuditCategory,
        code: &str,
        detail: String,
    ) -> Self {
        Self {
            timestamp_ms,
            symbol: symbol.to_string(),
            category,
            code: code.to_string(),
            detail,
        }
    }
}
