//! Session and transaction queries.

use super::{parse_date, parse_timestamp, AuditStore};
use crate::{
    error::AuditResult,
    model::{AnalysisSession, SessionStatus, TierCounts, Transaction},
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const SESSION_COLUMNS: &str = "session_id, owner_id, label, status, total_count,
    high_count, medium_count, low_count, created_at, completed_at";

fn session_from_row(r: &Row<'_>) -> rusqlite::Result<AnalysisSession> {
    let status: String = r.get(3)?;
    let created_at: String = r.get(8)?;
    let completed_at: Option<String> = r.get(9)?;
    Ok(AnalysisSession {
        id:    r.get(0)?,
        owner: r.get(1)?,
        label: r.get(2)?,
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Pending),
        counts: TierCounts {
            total:  r.get(4)?,
            high:   r.get(5)?,
            medium: r.get(6)?,
            low:    r.get(7)?,
        },
        created_at: parse_timestamp(8, &created_at)?,
        completed_at: completed_at.as_deref().map(|s| parse_timestamp(9, s)).transpose()?,
    })
}

impl AuditStore {
    pub fn create_session(&self, owner: &str, label: &str) -> AuditResult<AnalysisSession> {
        let session = AnalysisSession {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            label: label.to_string(),
            status: SessionStatus::Pending,
            counts: TierCounts::default(),
            created_at: Utc::now(),
            completed_at: None,
        };
        self.conn.execute(
            "INSERT INTO analysis_session (session_id, owner_id, label, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id,
                session.owner,
                session.label,
                session.status.as_str(),
                session.created_at.to_rfc3339(),
            ],
        )?;
        Ok(session)
    }

    pub fn get_session(&self, session_id: &str) -> AuditResult<Option<AnalysisSession>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM analysis_session WHERE session_id = ?1"),
                params![session_id],
                session_from_row,
            )
            .optional()?)
    }

    /// The session only if `owner` created it.
    pub fn session_for_owner(
        &self,
        session_id: &str,
        owner: &str,
    ) -> AuditResult<Option<AnalysisSession>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM analysis_session
                     WHERE session_id = ?1 AND owner_id = ?2"
                ),
                params![session_id, owner],
                session_from_row,
            )
            .optional()?)
    }

    pub fn sessions_for_owner(&self, owner: &str) -> AuditResult<Vec<AnalysisSession>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM analysis_session
             WHERE owner_id = ?1 ORDER BY rowid DESC"
        ))?;
        let rows = stmt
            .query_map(params![owner], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete a session with its transactions, assessments, reports and events.
    /// Returns false when no such session existed.
    pub fn delete_session(&self, session_id: &str) -> AuditResult<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM event_log WHERE session_id = ?1", params![session_id])?;
        let removed = tx.execute(
            "DELETE FROM analysis_session WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }

    // ── Transactions ───────────────────────────────────────────

    /// Attach transactions to a session. Already-attached ids are left
    /// unchanged. Returns the number of rows added.
    pub fn insert_transactions(
        &self,
        session_id: &str,
        transactions: &[Transaction],
    ) -> AuditResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM txn WHERE session_id = ?1",
            params![session_id],
            |r| r.get(0),
        )?;
        let added = write_transactions(&tx, session_id, transactions, next_seq)?;
        tx.commit()?;
        Ok(added)
    }

    /// Transactions in upload order.
    pub fn transactions_for_session(&self, session_id: &str) -> AuditResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, external_id, txn_date, amount, vendor_name,
                    vendor_country, payment_method, department, description
             FROM txn WHERE session_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], |r| {
                let date: String = r.get(2)?;
                Ok(Transaction {
                    id:             r.get(0)?,
                    external_id:    r.get(1)?,
                    date:           parse_date(2, &date)?,
                    amount:         r.get(3)?,
                    vendor_name:    r.get(4)?,
                    vendor_country: r.get(5)?,
                    payment_method: r.get(6)?,
                    department:     r.get(7)?,
                    description:    r.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn transaction_count(&self, session_id: &str) -> AuditResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM txn WHERE session_id = ?1",
            params![session_id],
            |r| r.get(0),
        )?)
    }
}

pub(super) fn write_transactions(
    conn: &Connection,
    session_id: &str,
    transactions: &[Transaction],
    first_seq: i64,
) -> AuditResult<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO txn
         (session_id, transaction_id, seq, external_id, txn_date, amount,
          vendor_name, vendor_country, payment_method, department, description)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    let mut added = 0usize;
    for t in transactions {
        added += stmt.execute(params![
            session_id,
            t.id,
            first_seq + added as i64,
            t.external_id,
            t.date.format("%Y-%m-%d").to_string(),
            t.amount,
            t.vendor_name,
            t.vendor_country,
            t.payment_method,
            t.department,
            t.description,
        ])?;
    }
    Ok(added)
}

/// Record tier counts and mark the session completed.
pub(super) fn write_completion(
    conn: &Connection,
    session_id: &str,
    counts: &TierCounts,
) -> AuditResult<()> {
    conn.execute(
        "UPDATE analysis_session
         SET status = ?1, total_count = ?2, high_count = ?3, medium_count = ?4,
             low_count = ?5, completed_at = ?6
         WHERE session_id = ?7",
        params![
            SessionStatus::Completed.as_str(),
            counts.total,
            counts.high,
            counts.medium,
            counts.low,
            Utc::now().to_rfc3339(),
            session_id,
        ],
    )?;
    Ok(())
}
