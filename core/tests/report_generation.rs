//! Report entry point: statistics, narrative requirement, persistence.

mod common;

use audit_risk_core::{
    engine::{AnalyzeRequest, AuditEngine, ReportRequest},
    error::AuditError,
    model::RiskFactorKind,
    narrative::NarrativeError,
    statistics::{aggregate, UNKNOWN_VENDOR},
};
use common::{engine_with, txn, with_department, ScriptedNarrative, CALLER, REPORT_JSON};

fn analysed_session(engine: &AuditEngine) -> String {
    let session = engine.create_session(Some(CALLER), "q2").unwrap();
    let batch = vec![
        with_department(txn("d1", "Acme", 1, 300.0), "Procurement"),
        with_department(txn("d2", "Acme", 1, 300.0), "Procurement"),
        with_department(txn("big", "Contoso", 2, 1_500_000.0), "Finance"),
        with_department(txn("small", "", 3, 0.5), "Legal"),
    ];
    engine
        .analyze(Some(CALLER), AnalyzeRequest { session_id: session.id.clone(), transactions: batch })
        .unwrap();
    session.id
}

#[test]
fn report_is_generated_and_persisted() {
    let narrative = ScriptedNarrative::ok("[]");
    let engine = engine_with(&narrative);
    let session_id = analysed_session(&engine);

    narrative.set_response(Ok(format!("```json\n{REPORT_JSON}\n```")));
    let resp = engine
        .generate_report(Some(CALLER), ReportRequest { session_id: session_id.clone() })
        .unwrap();

    assert!(resp.success);
    assert_eq!(resp.report.risk_posture, "Elevated");
    assert_eq!(resp.report.key_risk_themes, vec!["Duplicate payments".to_string()]);
    assert_eq!(resp.report.statistics.total_transactions, 4);
    assert_eq!(resp.report.statistics.high_risk_count, 3);
    assert_eq!(resp.report.statistics.low_risk_count, 1);
    assert_eq!(resp.report.statistics.total_amount, 1_500_600.5);

    let stored = engine.store().latest_report(&session_id).unwrap().unwrap();
    assert_eq!(stored, resp.report);

    let prompt = narrative.last_prompt().unwrap();
    assert!(prompt.user.contains("Contoso"));
    assert!(prompt.user.contains("DUPLICATE_TRANSACTION"));
}

#[test]
fn regeneration_creates_a_new_report() {
    let narrative = ScriptedNarrative::ok(REPORT_JSON);
    let engine = engine_with(&narrative);
    let session_id = analysed_session(&engine);

    let first = engine
        .generate_report(Some(CALLER), ReportRequest { session_id: session_id.clone() })
        .unwrap();
    let second = engine
        .generate_report(Some(CALLER), ReportRequest { session_id: session_id.clone() })
        .unwrap();

    assert_ne!(first.report.id, second.report.id);
    let all = engine.store().reports_for_session(&session_id).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0], first.report, "earlier report is unchanged");
}

#[test]
fn narrative_failure_persists_no_report() {
    let narrative = ScriptedNarrative::ok("[]");
    let engine = engine_with(&narrative);
    let session_id = analysed_session(&engine);

    for (err, status) in [
        (NarrativeError::Timeout, 502),
        (NarrativeError::Malformed("x".into()), 502),
        (NarrativeError::QuotaExhausted, 402),
        (NarrativeError::RateLimited, 429),
    ] {
        narrative.set_response(Err(err.clone()));
        let e = engine
            .generate_report(Some(CALLER), ReportRequest { session_id: session_id.clone() })
            .unwrap_err();
        assert!(matches!(e, AuditError::Upstream(_)), "{err:?}");
        assert_eq!(e.status(), status);
    }
    assert!(engine.store().latest_report(&session_id).unwrap().is_none());
    assert_eq!(engine.store().event_count("report_failed").unwrap(), 4);
}

#[test]
fn unparseable_report_is_an_upstream_error() {
    let narrative = ScriptedNarrative::ok("[]");
    let engine = engine_with(&narrative);
    let session_id = analysed_session(&engine);

    narrative.set_response(Ok("Here's your summary: things look fine.".into()));
    let e = engine
        .generate_report(Some(CALLER), ReportRequest { session_id: session_id.clone() })
        .unwrap_err();
    assert!(matches!(e, AuditError::Upstream(NarrativeError::Malformed(_))));
    assert!(engine.store().reports_for_session(&session_id).unwrap().is_empty());
}

#[test]
fn foreign_session_is_not_found() {
    let narrative = ScriptedNarrative::ok(REPORT_JSON);
    let engine = engine_with(&narrative);
    let session_id = analysed_session(&engine);

    let e = engine
        .generate_report(Some("someone-else"), ReportRequest { session_id })
        .unwrap_err();
    assert_eq!(e.to_response().status, 404);
    assert_eq!(e.to_response().error, "Session not found or access denied");

    let e = engine
        .generate_report(Some(CALLER), ReportRequest { session_id: "no-such-session".into() })
        .unwrap_err();
    assert!(matches!(e, AuditError::NotFound));
}

#[test]
fn unanalysed_session_is_rejected() {
    let narrative = ScriptedNarrative::ok(REPORT_JSON);
    let engine = engine_with(&narrative);
    let session = engine.create_session(Some(CALLER), "fresh").unwrap();

    let e = engine
        .generate_report(Some(CALLER), ReportRequest { session_id: session.id })
        .unwrap_err();
    assert_eq!(e.status(), 400);
    assert_eq!(narrative.calls(), 0);
}

#[test]
fn statistics_from_stored_session() {
    let narrative = ScriptedNarrative::ok("[]");
    let engine = engine_with(&narrative);
    let session_id = analysed_session(&engine);

    let store = engine.store();
    let session = store.get_session(&session_id).unwrap().unwrap();
    let stats = aggregate(
        &session,
        &store.transactions_for_session(&session_id).unwrap(),
        &store.assessments_for_session(&session_id).unwrap(),
    );

    assert_eq!(stats.top_vendors[0].vendor, "Contoso");
    assert_eq!(stats.top_vendors[1].vendor, "Acme");
    assert_eq!(stats.top_vendors[1].transaction_count, 2);
    assert_eq!(stats.top_vendors[2].vendor, UNKNOWN_VENDOR);

    assert_eq!(stats.top_risk_factors[0].factor_type, RiskFactorKind::DuplicateTransaction);
    assert_eq!(stats.top_risk_factors[0].count, 2);

    let legal = stats.department_risk.iter().find(|d| d.department == "Legal").unwrap();
    assert_eq!(legal.average_risk_score, 0.0);
    let procurement = stats.department_risk.iter().find(|d| d.department == "Procurement").unwrap();
    assert_eq!(procurement.average_risk_score, 90.0);
}
