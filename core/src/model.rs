//! Records exchanged between the pipeline and its storage collaborator.
//!
//! Transactions are immutable once ingested. Assessments are created by the
//! rule chain, receive advisory text once, and are later reviewed by a human.

use crate::types::{CallerId, SessionId, TransactionId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Transactions ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(default)]
    pub external_id: Option<String>,
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub vendor_country: String,
    #[serde(default)]
    pub payment_method: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub description: String,
}

impl Transaction {
    /// Trimmed, uppercased vendor name. Empty when the vendor is blank.
    pub fn normalized_vendor(&self) -> String {
        self.vendor_name.trim().to_uppercase()
    }

    /// Amount in the smallest currency unit.
    pub fn amount_cents(&self) -> i64 {
        (self.amount * 100.0).round() as i64
    }
}

// ── Risk classification ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low    => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High   => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low"    => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high"   => Some(RiskLevel::High),
            _ => None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        *self != RiskLevel::Low
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFactorKind {
    DuplicateTransaction,
    HighValue,
    HighRiskCountry,
    HighFrequencyVendor,
}

impl RiskFactorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFactorKind::DuplicateTransaction => "DUPLICATE_TRANSACTION",
            RiskFactorKind::HighValue            => "HIGH_VALUE",
            RiskFactorKind::HighRiskCountry      => "HIGH_RISK_COUNTRY",
            RiskFactorKind::HighFrequencyVendor  => "HIGH_FREQUENCY_VENDOR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskFactor {
    #[serde(rename = "type")]
    pub kind: RiskFactorKind,
    pub description: String,
    pub severity: Severity,
}

/// One assessment per transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub transaction_id: TransactionId,
    pub risk_level: RiskLevel,
    pub risk_score: u8,
    pub risk_factors: Vec<RiskFactor>,
    /// Rule-based explanation. Never replaced by advisory text.
    pub risk_reason: String,
    pub triggered_rules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_observation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_reason_elaboration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
}

impl RiskAssessment {
    pub fn has_advisory(&self) -> bool {
        self.audit_observation.is_some()
            || self.risk_reason_elaboration.is_some()
            || self.suggested_action.is_some()
    }
}

// ── Sessions and reports ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending   => "pending",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending"   => Some(SessionStatus::Pending),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TierCounts {
    pub total: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl TierCounts {
    pub fn tally(assessments: &[RiskAssessment]) -> Self {
        let mut counts = TierCounts::default();
        for a in assessments {
            counts.total += 1;
            match a.risk_level {
                RiskLevel::High   => counts.high += 1,
                RiskLevel::Medium => counts.medium += 1,
                RiskLevel::Low    => counts.low += 1,
            }
        }
        counts
    }

    pub fn flagged(&self) -> u32 {
        self.high + self.medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSession {
    pub id: SessionId,
    pub owner: CallerId,
    pub label: String,
    pub status: SessionStatus,
    pub counts: TierCounts,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Figures frozen into a report at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    pub total_transactions: u32,
    pub high_risk_count: u32,
    pub medium_risk_count: u32,
    pub low_risk_count: u32,
    pub total_amount: f64,
}

/// Derived, immutable. Regeneration inserts a new report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub id: String,
    pub session_id: SessionId,
    pub executive_summary: String,
    pub risk_posture: String,
    pub key_risk_themes: Vec<String>,
    pub areas_of_attention: Vec<String>,
    pub statistics: ReportSnapshot,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(vendor: &str, amount: f64) -> Transaction {
        Transaction {
            id: "t-1".into(),
            external_id: None,
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            amount,
            vendor_name: vendor.into(),
            vendor_country: String::new(),
            payment_method: String::new(),
            department: String::new(),
            description: String::new(),
        }
    }

    #[test]
    fn vendor_normalization_trims_and_uppercases() {
        assert_eq!(txn("  Acme Corp ", 1.0).normalized_vendor(), "ACME CORP");
        assert_eq!(txn("   ", 1.0).normalized_vendor(), "");
    }

    #[test]
    fn cents_absorb_float_noise() {
        assert_eq!(txn("a", 0.1 + 0.2).amount_cents(), 30);
        assert_eq!(txn("a", 1_000_000.01).amount_cents(), 100_000_001);
    }

    #[test]
    fn transaction_parses_from_camel_case_json() {
        let t: Transaction = serde_json::from_str(
            r#"{"id":"t-9","date":"2024-05-02","amount":12.5,"vendorName":"X","vendorCountry":"Panama"}"#,
        )
        .unwrap();
        assert_eq!(t.vendor_country, "Panama");
        assert_eq!(t.department, "");
    }
}
