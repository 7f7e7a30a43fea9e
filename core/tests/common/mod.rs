//! Shared helpers for integration tests.

#![allow(dead_code)]

use audit_risk_core::{
    engine::AuditEngine,
    model::Transaction,
    narrative::{NarrativeError, NarrativeGenerator, NarrativePrompt},
};
use chrono::NaiveDate;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

pub const CALLER: &str = "auditor-1";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// A transaction with sensible defaults: US vendor, no duplicates.
pub fn txn(id: &str, vendor: &str, day: u32, amount: f64) -> Transaction {
    Transaction {
        id: id.to_string(),
        external_id: Some(format!("EXT-{id}")),
        date: date(2024, 4, day),
        amount,
        vendor_name: vendor.to_string(),
        vendor_country: "USA".to_string(),
        payment_method: "wire".to_string(),
        department: "Finance".to_string(),
        description: String::new(),
    }
}

pub fn with_country(mut t: Transaction, country: &str) -> Transaction {
    t.vendor_country = country.to_string();
    t
}

pub fn with_department(mut t: Transaction, department: &str) -> Transaction {
    t.department = department.to_string();
    t
}

/// Fake generator: replays a fixed response and counts calls.
#[derive(Clone)]
pub struct ScriptedNarrative {
    response: Arc<Mutex<Result<String, NarrativeError>>>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<NarrativePrompt>>>,
}

impl ScriptedNarrative {
    pub fn ok(body: &str) -> Self {
        Self::with(Ok(body.to_string()))
    }

    pub fn failing(err: NarrativeError) -> Self {
        Self::with(Err(err))
    }

    fn with(response: Result<String, NarrativeError>) -> Self {
        Self {
            response: Arc::new(Mutex::new(response)),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_response(&self, response: Result<String, NarrativeError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<NarrativePrompt> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl NarrativeGenerator for ScriptedNarrative {
    fn generate(&self, prompt: &NarrativePrompt) -> Result<String, NarrativeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.clone());
        self.response.lock().unwrap().clone()
    }
}

/// Engine wired to `narrative`; the returned handle shares its counters.
pub fn engine_with(narrative: &ScriptedNarrative) -> AuditEngine {
    init_logging();
    AuditEngine::build_test(Box::new(narrative.clone())).expect("build test engine")
}

pub const REPORT_JSON: &str = r#"{
  "executiveSummary": "8 transactions totalling 1000.5 were reviewed.",
  "riskPosture": "Elevated",
  "keyRiskThemes": ["Duplicate payments"],
  "areasOfAttention": ["Procurement approvals"]
}"#;
