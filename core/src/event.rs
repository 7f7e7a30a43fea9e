//! Audit trail of pipeline activity. Most events belong to a session;
//! throttling events carry only the caller.

use crate::{
    rate_limiter::Endpoint,
    types::{CallerId, SessionId},
};
use serde::{Deserialize, Serialize};

/// Variants are added over time, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    SessionAssessed {
        session_id: SessionId,
        total: u32,
        high: u32,
        medium: u32,
        low: u32,
    },
    NarrativeDegraded {
        session_id: SessionId,
        flagged: usize,
        reason: String,
    },
    ReportGenerated {
        session_id: SessionId,
        report_id: String,
    },
    ReportFailed {
        session_id: SessionId,
        reason: String,
    },
    RequestThrottled {
        caller: CallerId,
        endpoint: Endpoint,
        retry_after_secs: u64,
    },
}

impl AuditEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            AuditEvent::SessionAssessed { .. }   => "session_assessed",
            AuditEvent::NarrativeDegraded { .. } => "narrative_degraded",
            AuditEvent::ReportGenerated { .. }   => "report_generated",
            AuditEvent::ReportFailed { .. }      => "report_failed",
            AuditEvent::RequestThrottled { .. }  => "request_throttled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub session_id: Option<SessionId>,
    pub event_type: String,
    pub payload: String,
    pub created_at: String,
}
