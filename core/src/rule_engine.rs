//! Ordered, first-match-wins audit rule chain.
//!
//! EVALUATION ORDER (fixed, never reordered):
//!   1. Duplicate        HIGH   90
//!   2. High value       HIGH   85  (amount > 1,000,000)
//!                       MEDIUM 60  (500,000 <= amount <= 1,000,000)
//!   3. Vendor country   MEDIUM 50
//!   4. Frequency        MEDIUM 45
//!   otherwise           LOW     0
//!
//! The first rule that fires produces the only factor and stops the chain.
//! Evaluation has no error path: every transaction resolves to one tier.

use crate::{
    duplicate_detection::{group_duplicates, DuplicateGroups},
    model::{RiskAssessment, RiskFactor, RiskFactorKind, RiskLevel, Severity, Transaction},
};

// ── Constants ────────────────────────────────────────────────────────────────

const DUPLICATE_SCORE: u8 = 90;

const HIGH_VALUE_THRESHOLD: f64 = 1_000_000.0; // strictly above → HIGH
const MEDIUM_VALUE_FLOOR: f64 = 500_000.0;     // inclusive
const MEDIUM_VALUE_CEILING: f64 = 1_000_000.0; // inclusive
const HIGH_VALUE_SCORE: u8 = 85;
const MEDIUM_VALUE_SCORE: u8 = 60;

const HIGH_RISK_COUNTRIES: [&str; 2] = ["PANAMA", "UAE"];
const VENDOR_COUNTRY_SCORE: u8 = 50;

const FREQUENCY_SCORE: u8 = 45;

pub const NO_RULE_REASON: &str = "no rule triggered";

// ── Rule chain ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Duplicate,
    HighValue,
    VendorCountry,
    Frequency,
}

impl Rule {
    pub fn number(&self) -> u8 {
        match self {
            Rule::Duplicate     => 1,
            Rule::HighValue     => 2,
            Rule::VendorCountry => 3,
            Rule::Frequency     => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rule::Duplicate     => "DUPLICATE_TRANSACTION",
            Rule::HighValue     => "HIGH_VALUE_TRANSACTION",
            Rule::VendorCountry => "HIGH_RISK_VENDOR_COUNTRY",
            Rule::Frequency     => "HIGH_FREQUENCY_VENDOR",
        }
    }
}

/// Everything a rule may look at.
pub struct RuleContext<'a> {
    pub txn: &'a Transaction,
    pub batch: &'a [Transaction],
    pub groups: &'a DuplicateGroups,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub rule: Rule,
    pub level: RiskLevel,
    pub score: u8,
    pub factor: RiskFactor,
    pub reason: String,
}

type RuleFn = fn(&RuleContext<'_>) -> Option<RuleOutcome>;

const RULE_CHAIN: [RuleFn; 4] = [
    duplicate_rule,
    high_value_rule,
    vendor_country_rule,
    frequency_rule,
];

/// Run the chain for one transaction.
pub fn evaluate(
    txn: &Transaction,
    batch: &[Transaction],
    groups: &DuplicateGroups,
) -> RiskAssessment {
    let ctx = RuleContext { txn, batch, groups };
    match RULE_CHAIN.iter().find_map(|rule| rule(&ctx)) {
        Some(outcome) => {
            log::debug!(
                "{}: rule {} fired ({} {})",
                txn.id,
                outcome.rule.number(),
                outcome.level,
                outcome.score
            );
            RiskAssessment {
                transaction_id: txn.id.clone(),
                risk_level: outcome.level,
                risk_score: outcome.score,
                risk_factors: vec![outcome.factor],
                risk_reason: outcome.reason,
                triggered_rules: vec![outcome.rule.name().to_string()],
                audit_observation: None,
                risk_reason_elaboration: None,
                suggested_action: None,
                reviewed: false,
                review_notes: None,
            }
        }
        None => low_risk(txn),
    }
}

/// Group duplicates once, then evaluate every transaction against the
/// whole batch. Output order follows input order.
pub fn evaluate_batch(batch: &[Transaction]) -> Vec<RiskAssessment> {
    let groups = group_duplicates(batch);
    batch.iter().map(|t| evaluate(t, batch, &groups)).collect()
}

fn low_risk(txn: &Transaction) -> RiskAssessment {
    RiskAssessment {
        transaction_id: txn.id.clone(),
        risk_level: RiskLevel::Low,
        risk_score: 0,
        risk_factors: Vec::new(),
        risk_reason: NO_RULE_REASON.to_string(),
        triggered_rules: Vec::new(),
        audit_observation: None,
        risk_reason_elaboration: None,
        suggested_action: None,
        reviewed: false,
        review_notes: None,
    }
}

// ── Rules ────────────────────────────────────────────────────────────────────

fn duplicate_rule(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let members = ctx.groups.group_of(&ctx.txn.id)?;
    let count = members.len();
    Some(RuleOutcome {
        rule: Rule::Duplicate,
        level: RiskLevel::High,
        score: DUPLICATE_SCORE,
        factor: RiskFactor {
            kind: RiskFactorKind::DuplicateTransaction,
            description: format!("Transaction appears {count} times with identical vendor, date and amount"),
            severity: Severity::High,
        },
        reason: format!(
            "Rule 1 (duplicate): {count} occurrences of vendor {}, date {}, amount {:.2}",
            ctx.txn.normalized_vendor(),
            ctx.txn.date,
            ctx.txn.amount
        ),
    })
}

fn high_value_rule(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let amount = ctx.txn.amount;
    // Bounds kept exactly as defined: the MEDIUM band is inclusive at both
    // ends and HIGH starts strictly above 1,000,000.
    if amount > HIGH_VALUE_THRESHOLD {
        Some(RuleOutcome {
            rule: Rule::HighValue,
            level: RiskLevel::High,
            score: HIGH_VALUE_SCORE,
            factor: RiskFactor {
                kind: RiskFactorKind::HighValue,
                description: format!("Amount {amount:.2} exceeds 1,000,000"),
                severity: Severity::High,
            },
            reason: format!("Rule 2 (high value): amount {amount:.2} is greater than 1,000,000"),
        })
    } else if (MEDIUM_VALUE_FLOOR..=MEDIUM_VALUE_CEILING).contains(&amount) {
        Some(RuleOutcome {
            rule: Rule::HighValue,
            level: RiskLevel::Medium,
            score: MEDIUM_VALUE_SCORE,
            factor: RiskFactor {
                kind: RiskFactorKind::HighValue,
                description: format!("Amount {amount:.2} is between 500,000 and 1,000,000"),
                severity: Severity::Medium,
            },
            reason: format!(
                "Rule 2 (high value): amount {amount:.2} is between 500,000 and 1,000,000 inclusive"
            ),
        })
    } else {
        None
    }
}

/// Uppercased country with "UNITED ARAB EMIRATES" folded to "UAE".
pub fn normalize_country(country: &str) -> String {
    let upper = country.trim().to_uppercase();
    if upper == "UNITED ARAB EMIRATES" {
        "UAE".to_string()
    } else {
        upper
    }
}

fn vendor_country_rule(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let country = normalize_country(&ctx.txn.vendor_country);
    if !HIGH_RISK_COUNTRIES.contains(&country.as_str()) {
        return None;
    }
    Some(RuleOutcome {
        rule: Rule::VendorCountry,
        level: RiskLevel::Medium,
        score: VENDOR_COUNTRY_SCORE,
        factor: RiskFactor {
            kind: RiskFactorKind::HighRiskCountry,
            description: format!("Vendor located in high-risk jurisdiction {country}"),
            severity: Severity::Medium,
        },
        reason: format!("Rule 3 (vendor country): vendor country {country} is on the high-risk list"),
    })
}

fn frequency_rule(ctx: &RuleContext<'_>) -> Option<RuleOutcome> {
    let vendor = ctx.txn.normalized_vendor();
    if vendor.is_empty() {
        return None;
    }
    let count = ctx
        .batch
        .iter()
        .filter(|t| t.date == ctx.txn.date && t.normalized_vendor() == vendor)
        .count();
    if count <= 1 {
        return None;
    }
    Some(RuleOutcome {
        rule: Rule::Frequency,
        level: RiskLevel::Medium,
        score: FREQUENCY_SCORE,
        factor: RiskFactor {
            kind: RiskFactorKind::HighFrequencyVendor,
            description: format!("{count} transactions with {vendor} on {}", ctx.txn.date),
            severity: Severity::Medium,
        },
        reason: format!(
            "Rule 4 (frequency): {count} transactions with vendor {vendor} on {}",
            ctx.txn.date
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_normalization() {
        assert_eq!(normalize_country("united arab emirates"), "UAE");
        assert_eq!(normalize_country(" Panama "), "PANAMA");
        assert_eq!(normalize_country("uae"), "UAE");
        assert_eq!(normalize_country(""), "");
    }

    #[test]
    fn rule_numbers_follow_chain_order() {
        let numbers: Vec<u8> = [Rule::Duplicate, Rule::HighValue, Rule::VendorCountry, Rule::Frequency]
            .iter()
            .map(Rule::number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }
}
