//! Risk assessment queries.

use super::{
    parse_json,
    session::{write_completion, write_transactions},
    write_event, AuditStore,
};
use crate::{
    error::AuditResult,
    event::AuditEvent,
    model::{RiskAssessment, RiskLevel, TierCounts, Transaction},
};
use chrono::Utc;
use rusqlite::{params, Connection};

impl AuditStore {
    /// Replace the session's batch with `transactions`, store their
    /// assessments, mark the session completed and append `events`.
    /// Earlier rows and reviews are dropped. Either everything is written
    /// or nothing is.
    pub fn record_analysis(
        &self,
        session_id: &str,
        transactions: &[Transaction],
        assessments: &[RiskAssessment],
        counts: &TierCounts,
        events: &[AuditEvent],
    ) -> AuditResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        // Assessments go with their transactions (ON DELETE CASCADE).
        tx.execute("DELETE FROM txn WHERE session_id = ?1", params![session_id])?;
        write_transactions(&tx, session_id, transactions, 0)?;
        write_assessments(&tx, session_id, assessments)?;
        write_completion(&tx, session_id, counts)?;
        for event in events {
            write_event(&tx, Some(session_id), event)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Assessments in transaction upload order.
    pub fn assessments_for_session(&self, session_id: &str) -> AuditResult<Vec<RiskAssessment>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.transaction_id, a.risk_level, a.risk_score, a.risk_factors,
                    a.risk_reason, a.triggered_rules, a.audit_observation,
                    a.risk_reason_elaboration, a.suggested_action, a.reviewed,
                    a.review_notes
             FROM risk_assessment a
             JOIN txn t ON t.session_id = a.session_id AND t.transaction_id = a.transaction_id
             WHERE a.session_id = ?1
             ORDER BY t.seq ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], |r| {
                let level: String = r.get(1)?;
                let factors: String = r.get(3)?;
                let rules: String = r.get(5)?;
                Ok(RiskAssessment {
                    transaction_id: r.get(0)?,
                    risk_level: RiskLevel::parse(&level).unwrap_or(RiskLevel::Low),
                    risk_score: r.get(2)?,
                    risk_factors: parse_json(3, &factors)?,
                    risk_reason: r.get(4)?,
                    triggered_rules: parse_json(5, &rules)?,
                    audit_observation: r.get(6)?,
                    risk_reason_elaboration: r.get(7)?,
                    suggested_action: r.get(8)?,
                    reviewed: r.get::<_, i32>(9)? != 0,
                    review_notes: r.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mark an assessment reviewed. Returns false when it does not exist.
    pub fn record_review(
        &self,
        session_id: &str,
        transaction_id: &str,
        notes: Option<&str>,
    ) -> AuditResult<bool> {
        let updated = self.conn.execute(
            "UPDATE risk_assessment SET reviewed = 1, review_notes = ?1
             WHERE session_id = ?2 AND transaction_id = ?3",
            params![notes, session_id, transaction_id],
        )?;
        Ok(updated > 0)
    }

    pub fn assessment_count(&self, session_id: &str) -> AuditResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM risk_assessment WHERE session_id = ?1",
            params![session_id],
            |r| r.get(0),
        )?)
    }
}

fn write_assessments(
    conn: &Connection,
    session_id: &str,
    assessments: &[RiskAssessment],
) -> AuditResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO risk_assessment
         (session_id, transaction_id, risk_level, risk_score, risk_factors,
          risk_reason, triggered_rules, audit_observation,
          risk_reason_elaboration, suggested_action, reviewed, review_notes,
          assessed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, NULL, ?11)",
    )?;
    let now = Utc::now().to_rfc3339();
    for a in assessments {
        stmt.execute(params![
            session_id,
            a.transaction_id,
            a.risk_level.as_str(),
            a.risk_score,
            serde_json::to_string(&a.risk_factors)?,
            a.risk_reason,
            serde_json::to_string(&a.triggered_rules)?,
            a.audit_observation,
            a.risk_reason_elaboration,
            a.suggested_action,
            now,
        ])?;
    }
    Ok(())
}
