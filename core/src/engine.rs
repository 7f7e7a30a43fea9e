//! The audit engine: the two request entry points.
//!
//! ANALYZE (fixed order):
//!   1. Resolve caller identity
//!   2. Analysis rate limit
//!   3. Validate the batch, check session ownership
//!   4. Group duplicates over the whole batch
//!   5. Run the rule chain per transaction
//!   6. Advisory text for flagged transactions (best effort)
//!   7. In one SQL transaction: replace the session's batch, store
//!      assessments, counts and events
//!
//! GENERATE REPORT:
//!   1. Resolve caller identity
//!   2. Report rate limit
//!   3. Session ownership, session must be analysed
//!   4. Aggregate statistics
//!   5. Report narrative (required; nothing is persisted on failure)
//!   6. Persist the report
//!
//! RULES:
//!   - Each request makes at most one narrative call and never retries it.
//!   - Rule evaluation results never depend on generator output.

use crate::{
    config::AuditConfig,
    duplicate_detection::group_duplicates,
    error::{AuditError, AuditResult},
    event::AuditEvent,
    model::{AnalysisSession, AuditReport, RiskAssessment, SessionStatus, TierCounts, Transaction},
    narrative::{HttpNarrative, NarrativeGenerator},
    narrative_augmenter::{augment, AdvisoryStatus},
    rate_limiter::{Endpoint, RateDecision, RateLimiters},
    report::{build_report, generate_narrative},
    rule_engine::evaluate,
    statistics::aggregate,
    store::AuditStore,
    types::SessionId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const NO_TRANSACTIONS: &str = "No transactions provided";

// ── Requests and responses ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub session_id: SessionId,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub session_id: SessionId,
    pub assessments: Vec<RiskAssessment>,
    pub summary: TierCounts,
    pub advisory: AdvisoryStatus,
}

impl AnalyzeResponse {
    /// HTTP-equivalent status. Quota and throttling from the narrative
    /// generator are reported even though the assessments are complete.
    pub fn status(&self) -> u16 {
        match self.advisory {
            AdvisoryStatus::QuotaExhausted => 402,
            AdvisoryStatus::RateLimited    => 429,
            _ => 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportResponse {
    pub report: AuditReport,
    pub success: bool,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct AuditEngine {
    store: AuditStore,
    limiters: RateLimiters,
    narrator: Box<dyn NarrativeGenerator>,
}

impl AuditEngine {
    pub fn new(store: AuditStore, config: &AuditConfig, narrator: Box<dyn NarrativeGenerator>) -> Self {
        Self {
            store,
            limiters: RateLimiters::from_config(&config.rate_limits),
            narrator,
        }
    }

    /// Open and migrate the database at `db_path` and wire the HTTP
    /// narrative generator from config.
    pub fn build(db_path: &str, config: &AuditConfig) -> AuditResult<Self> {
        let store = AuditStore::open(db_path)?;
        store.migrate()?;
        let narrator = HttpNarrative::from_env(&config.narrative);
        Ok(Self::new(store, config, narrator))
    }

    /// In-memory store, test limits, and the given generator.
    pub fn build_test(narrator: Box<dyn NarrativeGenerator>) -> AuditResult<Self> {
        Self::build_test_with_config(narrator, &AuditConfig::default_test())
    }

    pub fn build_test_with_config(
        narrator: Box<dyn NarrativeGenerator>,
        config: &AuditConfig,
    ) -> AuditResult<Self> {
        let store = AuditStore::in_memory()?;
        store.migrate()?;
        Ok(Self::new(store, config, narrator))
    }

    pub fn store(&self) -> &AuditStore {
        &self.store
    }

    // ── Entry points ───────────────────────────────────────────

    pub fn analyze(
        &self,
        caller: Option<&str>,
        request: AnalyzeRequest,
    ) -> AuditResult<AnalyzeResponse> {
        let caller = authenticate(caller)?;
        self.throttle(Endpoint::Analysis, caller)?;

        let batch = request.transactions;
        validate_batch(&batch)?;
        let session = self.owned_session(&request.session_id, caller)?;

        let groups = group_duplicates(&batch);
        let mut assessments: Vec<RiskAssessment> =
            batch.iter().map(|t| evaluate(t, &batch, &groups)).collect();

        // Nothing is written before the narrative call returns.
        let outcome = augment(&mut assessments, &batch, self.narrator.as_ref());
        let summary = TierCounts::tally(&assessments);

        let mut events = Vec::with_capacity(2);
        if let Some(err) = &outcome.error {
            events.push(AuditEvent::NarrativeDegraded {
                session_id: session.id.clone(),
                flagged: outcome.flagged,
                reason: err.to_string(),
            });
        }
        events.push(AuditEvent::SessionAssessed {
            session_id: session.id.clone(),
            total: summary.total,
            high: summary.high,
            medium: summary.medium,
            low: summary.low,
        });
        self.store
            .record_analysis(&session.id, &batch, &assessments, &summary, &events)?;

        log::info!(
            "session {} assessed: {} transactions ({} high, {} medium, {} low), advisory {:?} ({}/{})",
            session.id,
            summary.total,
            summary.high,
            summary.medium,
            summary.low,
            outcome.status,
            outcome.enriched,
            outcome.flagged
        );

        Ok(AnalyzeResponse {
            session_id: session.id,
            assessments,
            summary,
            advisory: outcome.status,
        })
    }

    pub fn generate_report(
        &self,
        caller: Option<&str>,
        request: ReportRequest,
    ) -> AuditResult<ReportResponse> {
        let caller = authenticate(caller)?;
        self.throttle(Endpoint::Report, caller)?;

        let session = self.owned_session(&request.session_id, caller)?;
        if session.status != SessionStatus::Completed {
            return Err(AuditError::Validation(
                "Session has not been analyzed yet".into(),
            ));
        }

        let transactions = self.store.transactions_for_session(&session.id)?;
        let assessments = self.store.assessments_for_session(&session.id)?;
        let stats = aggregate(&session, &transactions, &assessments);

        let narrative = match generate_narrative(&stats, self.narrator.as_ref()) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("report for session {} failed: {e}", session.id);
                self.store.append_event(
                    Some(session.id.as_str()),
                    &AuditEvent::ReportFailed {
                        session_id: session.id.clone(),
                        reason: e.to_string(),
                    },
                )?;
                return Err(AuditError::Upstream(e));
            }
        };

        let report = build_report(&stats, narrative);
        self.store.insert_report(&report)?;
        self.store.append_event(
            Some(session.id.as_str()),
            &AuditEvent::ReportGenerated {
                session_id: session.id.clone(),
                report_id: report.id.clone(),
            },
        )?;
        log::info!(
            "report {} generated for session {} (posture: {})",
            report.id,
            session.id,
            report.risk_posture
        );

        Ok(ReportResponse {
            report,
            success: true,
        })
    }

    // ── Session management ─────────────────────────────────────

    pub fn create_session(&self, caller: Option<&str>, label: &str) -> AuditResult<AnalysisSession> {
        let caller = authenticate(caller)?;
        self.store.create_session(caller, label)
    }

    pub fn delete_session(&self, caller: Option<&str>, session_id: &str) -> AuditResult<()> {
        let caller = authenticate(caller)?;
        let session = self.owned_session(session_id, caller)?;
        self.store.delete_session(&session.id)?;
        Ok(())
    }

    /// Record a human review. Tier, score and reason are left untouched.
    pub fn review_assessment(
        &self,
        caller: Option<&str>,
        session_id: &str,
        transaction_id: &str,
        notes: Option<&str>,
    ) -> AuditResult<()> {
        let caller = authenticate(caller)?;
        let session = self.owned_session(session_id, caller)?;
        if !self.store.record_review(&session.id, transaction_id, notes)? {
            return Err(AuditError::Validation(format!(
                "No assessment for transaction {transaction_id}"
            )));
        }
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────

    /// Throttle events are not attached to the named session: ownership
    /// has not been checked yet.
    fn throttle(&self, endpoint: Endpoint, caller: &str) -> AuditResult<()> {
        match self.limiters.for_endpoint(endpoint).check(caller) {
            RateDecision::Allowed => Ok(()),
            RateDecision::Denied { retry_after_secs } => {
                log::warn!("{endpoint} request from {caller} throttled for {retry_after_secs}s");
                self.store.append_event(
                    None,
                    &AuditEvent::RequestThrottled {
                        caller: caller.to_string(),
                        endpoint,
                        retry_after_secs,
                    },
                )?;
                Err(AuditError::RateLimited {
                    endpoint,
                    retry_after_secs,
                })
            }
        }
    }

    fn owned_session(&self, session_id: &str, caller: &str) -> AuditResult<AnalysisSession> {
        self.store
            .session_for_owner(session_id, caller)?
            .ok_or(AuditError::NotFound)
    }
}

fn authenticate(caller: Option<&str>) -> AuditResult<&str> {
    caller
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(AuditError::Unauthorized)
}

fn validate_batch(batch: &[Transaction]) -> AuditResult<()> {
    if batch.is_empty() {
        return Err(AuditError::Validation(NO_TRANSACTIONS.into()));
    }
    let mut seen = HashSet::new();
    for t in batch {
        if t.id.trim().is_empty() {
            return Err(AuditError::Validation("Transaction id must not be blank".into()));
        }
        if !seen.insert(t.id.as_str()) {
            return Err(AuditError::Validation(format!(
                "Transaction id {} appears more than once",
                t.id
            )));
        }
        if !t.amount.is_finite() || t.amount < 0.0 {
            return Err(AuditError::Validation(format!(
                "Transaction {} has an invalid amount",
                t.id
            )));
        }
    }
    Ok(())
}
