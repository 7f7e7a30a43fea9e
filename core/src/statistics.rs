//! Session statistics for audit reporting.
//!
//! Computes:
//!   1. Tier counts and total amount
//!   2. Top vendors by total amount
//!   3. Top triggered risk-factor types by occurrence
//!   4. Average risk score per department
//!
//! Rankings use stable sorts, so equal values keep first-seen order.

use crate::{
    model::{AnalysisSession, RiskAssessment, RiskFactorKind, TierCounts, Transaction},
    types::SessionId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const TOP_N: usize = 5;
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";
pub const UNASSIGNED_DEPARTMENT: &str = "Unassigned";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VendorTotal {
    pub vendor: String,
    pub total_amount: f64,
    pub transaction_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FactorCount {
    pub factor_type: RiskFactorKind,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRisk {
    pub department: String,
    pub average_risk_score: f64,
    pub transaction_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatistics {
    pub session_id: SessionId,
    pub total_transactions: u32,
    pub high_risk_count: u32,
    pub medium_risk_count: u32,
    pub low_risk_count: u32,
    pub total_amount: f64,
    pub top_vendors: Vec<VendorTotal>,
    pub top_risk_factors: Vec<FactorCount>,
    pub department_risk: Vec<DepartmentRisk>,
}

pub fn aggregate(
    session: &AnalysisSession,
    transactions: &[Transaction],
    assessments: &[RiskAssessment],
) -> SessionStatistics {
    let tiers = TierCounts::tally(assessments);
    let total_amount = transactions.iter().map(|t| t.amount).sum();

    SessionStatistics {
        session_id: session.id.clone(),
        total_transactions: transactions.len() as u32,
        high_risk_count: tiers.high,
        medium_risk_count: tiers.medium,
        low_risk_count: tiers.low,
        total_amount,
        top_vendors: top_vendors(transactions),
        top_risk_factors: top_risk_factors(assessments),
        department_risk: department_risk(transactions, assessments),
    }
}

/// Vendors are keyed the way the rule chain keys them (trimmed,
/// uppercased) and shown with their first-seen spelling.
fn top_vendors(transactions: &[Transaction]) -> Vec<VendorTotal> {
    let mut order: HashMap<String, usize> = HashMap::new();
    let mut totals: Vec<VendorTotal> = Vec::new();
    for t in transactions {
        let name = t.vendor_name.trim();
        let name = if name.is_empty() { UNKNOWN_VENDOR } else { name };
        let idx = *order.entry(name.to_uppercase()).or_insert_with(|| {
            totals.push(VendorTotal {
                vendor: name.to_string(),
                total_amount: 0.0,
                transaction_count: 0,
            });
            totals.len() - 1
        });
        totals[idx].total_amount += t.amount;
        totals[idx].transaction_count += 1;
    }
    totals.sort_by(|a, b| b.total_amount.total_cmp(&a.total_amount));
    totals.truncate(TOP_N);
    totals
}

fn top_risk_factors(assessments: &[RiskAssessment]) -> Vec<FactorCount> {
    let mut counts: Vec<FactorCount> = Vec::new();
    for factor in assessments.iter().flat_map(|a| &a.risk_factors) {
        match counts.iter_mut().find(|c| c.factor_type == factor.kind) {
            Some(c) => c.count += 1,
            None => counts.push(FactorCount {
                factor_type: factor.kind,
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_N);
    counts
}

fn department_risk(
    transactions: &[Transaction],
    assessments: &[RiskAssessment],
) -> Vec<DepartmentRisk> {
    let scores: HashMap<&str, u8> = assessments
        .iter()
        .map(|a| (a.transaction_id.as_str(), a.risk_score))
        .collect();

    // department -> (score sum, transaction count)
    let mut departments: BTreeMap<&str, (u64, u32)> = BTreeMap::new();
    for t in transactions {
        let dept = t.department.trim();
        let dept = if dept.is_empty() { UNASSIGNED_DEPARTMENT } else { dept };
        // Unassessed transactions count with score 0.
        let score = scores.get(t.id.as_str()).copied().unwrap_or(0);
        let entry = departments.entry(dept).or_insert((0, 0));
        entry.0 += u64::from(score);
        entry.1 += 1;
    }

    departments
        .into_iter()
        .map(|(department, (sum, n))| DepartmentRisk {
            department: department.to_string(),
            average_risk_score: if n == 0 { 0.0 } else { sum as f64 / n as f64 },
            transaction_count: n,
        })
        .collect()
}
