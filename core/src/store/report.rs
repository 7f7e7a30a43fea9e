//! Audit report queries. Reports are insert-only.

use super::{parse_json, parse_timestamp, AuditStore};
use crate::{error::AuditResult, model::AuditReport};
use rusqlite::{params, OptionalExtension, Row};

const REPORT_COLUMNS: &str = "report_id, session_id, executive_summary, risk_posture,
    key_risk_themes, areas_of_attention, statistics, created_at";

fn report_from_row(r: &Row<'_>) -> rusqlite::Result<AuditReport> {
    let themes: String = r.get(4)?;
    let areas: String = r.get(5)?;
    let stats: String = r.get(6)?;
    let created_at: String = r.get(7)?;
    Ok(AuditReport {
        id:                 r.get(0)?,
        session_id:         r.get(1)?,
        executive_summary:  r.get(2)?,
        risk_posture:       r.get(3)?,
        key_risk_themes:    parse_json(4, &themes)?,
        areas_of_attention: parse_json(5, &areas)?,
        statistics:         parse_json(6, &stats)?,
        created_at:         parse_timestamp(7, &created_at)?,
    })
}

impl AuditStore {
    pub fn insert_report(&self, report: &AuditReport) -> AuditResult<()> {
        self.conn.execute(
            "INSERT INTO audit_report
             (report_id, session_id, executive_summary, risk_posture,
              key_risk_themes, areas_of_attention, statistics, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                report.id,
                report.session_id,
                report.executive_summary,
                report.risk_posture,
                serde_json::to_string(&report.key_risk_themes)?,
                serde_json::to_string(&report.areas_of_attention)?,
                serde_json::to_string(&report.statistics)?,
                report.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Oldest first.
    pub fn reports_for_session(&self, session_id: &str) -> AuditResult<Vec<AuditReport>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM audit_report
             WHERE session_id = ?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id], report_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn latest_report(&self, session_id: &str) -> AuditResult<Option<AuditReport>> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {REPORT_COLUMNS} FROM audit_report
                     WHERE session_id = ?1 ORDER BY rowid DESC LIMIT 1"
                ),
                params![session_id],
                report_from_row,
            )
            .optional()?)
    }
}
