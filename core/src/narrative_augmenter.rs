//! Attaches advisory text to flagged assessments.
//!
//! Only `audit_observation`, `risk_reason_elaboration` and
//! `suggested_action` are ever written here. Tier, score, factors and the
//! rule-based reason are owned by the rule chain.

use crate::{
    model::{RiskAssessment, RiskFactor, Transaction},
    narrative::{parse_structured, NarrativeError, NarrativeGenerator, NarrativePrompt},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const ADVISORY_INSTRUCTIONS: &str = "\
You are assisting a financial auditor. For each flagged transaction you receive, \
write advisory notes grounded ONLY in the evidence provided: the transaction \
record, its risk level, its score, and the rule-based reason. Do not speculate, \
do not infer intent, and do not introduce facts, amounts, or parties that are \
not in the evidence. Do not change the risk level. \
Respond with a JSON array and nothing else. Each element must have the keys \
\"transactionId\", \"auditObservation\", \"riskReasonElaboration\" and \
\"suggestedAction\", and transactionId must be copied exactly from the input.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryStatus {
    /// Nothing was flagged; the generator was not called.
    NotRequired,
    Complete,
    /// Transport failure or unusable response. Advisory fields stay blank.
    Unavailable,
    QuotaExhausted,
    RateLimited,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AugmentOutcome {
    pub status: AdvisoryStatus,
    pub flagged: usize,
    pub enriched: usize,
    pub error: Option<NarrativeError>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlaggedEvidence<'a> {
    transaction_id: &'a str,
    risk_level: &'a str,
    risk_score: u8,
    rule_reason: &'a str,
    risk_factors: &'a [RiskFactor],
    transaction: Option<&'a Transaction>,
}

#[derive(Debug, Deserialize)]
struct AdvisoryEntry {
    #[serde(rename = "transactionId", alias = "transaction_id")]
    transaction_id: String,
    #[serde(default, rename = "auditObservation", alias = "audit_observation", alias = "observation")]
    audit_observation: Option<String>,
    #[serde(
        default,
        rename = "riskReasonElaboration",
        alias = "risk_reason_elaboration",
        alias = "reasonElaboration"
    )]
    risk_reason_elaboration: Option<String>,
    #[serde(default, rename = "suggestedAction", alias = "suggested_action")]
    suggested_action: Option<String>,
}

/// Build the advisory prompt for the flagged subset.
pub fn advisory_prompt(
    assessments: &[RiskAssessment],
    transactions: &[Transaction],
) -> Result<NarrativePrompt, serde_json::Error> {
    let by_id: HashMap<&str, &Transaction> =
        transactions.iter().map(|t| (t.id.as_str(), t)).collect();
    let evidence: Vec<FlaggedEvidence<'_>> = assessments
        .iter()
        .filter(|a| a.risk_level.is_flagged())
        .map(|a| FlaggedEvidence {
            transaction_id: &a.transaction_id,
            risk_level: a.risk_level.as_str(),
            risk_score: a.risk_score,
            rule_reason: &a.risk_reason,
            risk_factors: &a.risk_factors,
            transaction: by_id.get(a.transaction_id.as_str()).copied(),
        })
        .collect();
    Ok(NarrativePrompt {
        system: ADVISORY_INSTRUCTIONS.to_string(),
        user: serde_json::to_string_pretty(&evidence)?,
    })
}

/// Enrich every non-low assessment in place. Never fails: generator
/// problems are reported through the outcome.
pub fn augment(
    assessments: &mut [RiskAssessment],
    transactions: &[Transaction],
    generator: &dyn NarrativeGenerator,
) -> AugmentOutcome {
    let flagged = assessments.iter().filter(|a| a.risk_level.is_flagged()).count();
    if flagged == 0 {
        return AugmentOutcome {
            status: AdvisoryStatus::NotRequired,
            flagged,
            enriched: 0,
            error: None,
        };
    }

    let result = advisory_prompt(assessments, transactions)
        .map_err(|e| NarrativeError::Malformed(e.to_string()))
        .and_then(|prompt| {
            log::debug!("requesting advisory text for {flagged} transactions ({} bytes)", prompt.user.len());
            generator.generate(&prompt)
        })
        .and_then(|raw| parse_structured::<Vec<AdvisoryEntry>>(&raw, '[', ']'));

    let entries = match result {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("advisory text unavailable for {flagged} flagged transactions: {e}");
            let status = match e {
                NarrativeError::QuotaExhausted => AdvisoryStatus::QuotaExhausted,
                NarrativeError::RateLimited    => AdvisoryStatus::RateLimited,
                _ => AdvisoryStatus::Unavailable,
            };
            return AugmentOutcome {
                status,
                flagged,
                enriched: 0,
                error: Some(e),
            };
        }
    };

    let mut pending: HashMap<String, usize> = assessments
        .iter()
        .enumerate()
        .filter(|(_, a)| a.risk_level.is_flagged())
        .map(|(i, a)| (a.transaction_id.clone(), i))
        .collect();

    let mut updates = Vec::new();
    for entry in entries {
        match pending.remove(&entry.transaction_id) {
            Some(idx) => updates.push((idx, entry)),
            None => log::debug!("ignoring advisory for unknown or repeated id {}", entry.transaction_id),
        }
    }

    let enriched = updates.len();
    for (idx, entry) in updates {
        let a = &mut assessments[idx];
        a.audit_observation = non_blank(entry.audit_observation);
        a.risk_reason_elaboration = non_blank(entry.risk_reason_elaboration);
        a.suggested_action = non_blank(entry.suggested_action);
    }

    AugmentOutcome {
        status: AdvisoryStatus::Complete,
        flagged,
        enriched,
        error: None,
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
