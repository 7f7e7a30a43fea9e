//! Session storage: ingestion order, review, cascading delete.

mod common;

use audit_risk_core::{
    engine::{AnalyzeRequest, ReportRequest},
    error::AuditError,
    event::AuditEvent,
    model::{RiskLevel, SessionStatus, TierCounts},
    rule_engine::evaluate_batch,
    store::AuditStore,
};
use common::{engine_with, txn, ScriptedNarrative, CALLER, REPORT_JSON};

#[test]
fn transactions_round_trip_in_upload_order() {
    let store = AuditStore::in_memory().unwrap();
    store.migrate().unwrap();
    let session = store.create_session(CALLER, "order").unwrap();
    assert_eq!(session.status, SessionStatus::Pending);

    let batch = vec![txn("z", "Zed", 9, 9.99), txn("a", "Ay", 1, 1.01), txn("m", "Em", 5, 5.0)];
    assert_eq!(store.insert_transactions(&session.id, &batch).unwrap(), 3);
    // Re-attaching the same ids adds nothing.
    assert_eq!(store.insert_transactions(&session.id, &batch).unwrap(), 0);

    let loaded = store.transactions_for_session(&session.id).unwrap();
    assert_eq!(loaded, batch);
}

#[test]
fn sessions_are_listed_per_owner() {
    let store = AuditStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.create_session("alice", "one").unwrap();
    store.create_session("alice", "two").unwrap();
    store.create_session("bob", "three").unwrap();

    assert_eq!(store.sessions_for_owner("alice").unwrap().len(), 2);
    assert_eq!(store.sessions_for_owner("bob").unwrap().len(), 1);
    assert!(store.sessions_for_owner("carol").unwrap().is_empty());
}

#[test]
fn review_keeps_rule_outcome() {
    let narrative = ScriptedNarrative::ok("[]");
    let engine = engine_with(&narrative);
    let session = engine.create_session(Some(CALLER), "review").unwrap();
    engine
        .analyze(
            Some(CALLER),
            AnalyzeRequest {
                session_id: session.id.clone(),
                transactions: vec![txn("a", "Acme", 1, 10.0), txn("b", "Acme", 1, 10.0)],
            },
        )
        .unwrap();

    engine
        .review_assessment(Some(CALLER), &session.id, "a", Some("Confirmed with AP: duplicate invoice"))
        .unwrap();

    let stored = engine.store().assessments_for_session(&session.id).unwrap();
    let a = stored.iter().find(|x| x.transaction_id == "a").unwrap();
    assert!(a.reviewed);
    assert_eq!(a.review_notes.as_deref(), Some("Confirmed with AP: duplicate invoice"));
    assert_eq!(a.risk_level, RiskLevel::High);
    assert_eq!(a.risk_score, 90);

    let err = engine
        .review_assessment(Some(CALLER), &session.id, "missing", None)
        .unwrap_err();
    assert_eq!(err.status(), 400);

    let err = engine
        .review_assessment(Some("intruder"), &session.id, "a", None)
        .unwrap_err();
    assert!(matches!(err, AuditError::NotFound));
}

#[test]
fn delete_cascades_to_children() {
    let narrative = ScriptedNarrative::ok(REPORT_JSON);
    let engine = engine_with(&narrative);
    let session = engine.create_session(Some(CALLER), "doomed").unwrap();
    engine
        .analyze(
            Some(CALLER),
            AnalyzeRequest { session_id: session.id.clone(), transactions: vec![txn("a", "Acme", 1, 10.0)] },
        )
        .unwrap();
    engine
        .generate_report(Some(CALLER), ReportRequest { session_id: session.id.clone() })
        .unwrap();

    engine.delete_session(Some(CALLER), &session.id).unwrap();

    let store = engine.store();
    assert!(store.get_session(&session.id).unwrap().is_none());
    assert_eq!(store.transaction_count(&session.id).unwrap(), 0);
    assert_eq!(store.assessment_count(&session.id).unwrap(), 0);
    assert!(store.reports_for_session(&session.id).unwrap().is_empty());
    assert!(store.events_for_session(&session.id).unwrap().is_empty());
    assert!(!store.delete_session(&session.id).unwrap());
}

/// A failed write leaves the previous analysis exactly as it was.
#[test]
fn failed_analysis_write_rolls_back() {
    let narrative = ScriptedNarrative::ok("[]");
    let engine = engine_with(&narrative);
    let session = engine.create_session(Some(CALLER), "atomic").unwrap();
    let first = engine
        .analyze(
            Some(CALLER),
            AnalyzeRequest { session_id: session.id.clone(), transactions: vec![txn("a", "Acme", 1, 10.0)] },
        )
        .unwrap();

    let store = engine.store();
    let events_before = store.events_for_session(&session.id).unwrap().len();

    // Assessment for a transaction that is not part of the batch: the
    // foreign key rejects it after the old rows were already deleted.
    let batch = vec![txn("b", "Bolt", 2, 20.0)];
    let orphan = evaluate_batch(&[txn("c", "Cog", 3, 30.0)]);
    let counts = TierCounts::tally(&orphan);
    let event = AuditEvent::SessionAssessed {
        session_id: session.id.clone(),
        total: 1,
        high: 0,
        medium: 0,
        low: 1,
    };
    assert!(store
        .record_analysis(&session.id, &batch, &orphan, &counts, &[event])
        .is_err());

    let stored = store.transactions_for_session(&session.id).unwrap();
    assert_eq!(stored.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(store.assessments_for_session(&session.id).unwrap(), first.assessments);
    assert_eq!(store.events_for_session(&session.id).unwrap().len(), events_before);
    let reloaded = store.get_session(&session.id).unwrap().unwrap();
    assert_eq!(reloaded.counts, first.summary);
}
