//! audit-runner: headless driver for the audit risk pipeline.
//!
//! Usage:
//!   audit-runner --input batch.json
//!   audit-runner --input batch.json --db audit.db --caller analyst-1 --report
//!   audit-runner --input batch.json --config data/audit_config.json

use anyhow::{Context, Result};
use audit_risk_core::{
    config::AuditConfig,
    engine::{AnalyzeRequest, AnalyzeResponse, AuditEngine, ReportRequest},
    error::AuditError,
    model::{AuditReport, RiskLevel, Transaction},
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let input = arg_value(&args, "--input").context("--input <batch.json> is required")?;
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let caller = arg_value(&args, "--caller").unwrap_or("audit-runner");
    let want_report = args.iter().any(|a| a == "--report");

    let config = match arg_value(&args, "--config") {
        Some(path) => AuditConfig::load(path)?,
        None => AuditConfig::default(),
    };

    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Cannot read {input}"))?;
    let transactions: Vec<Transaction> = serde_json::from_str(&content)
        .with_context(|| format!("{input} is not a JSON array of transactions"))?;

    println!("Audit risk runner");
    println!("  input:        {input}");
    println!("  db:           {db}");
    println!("  caller:       {caller}");
    println!("  transactions: {}", transactions.len());
    println!();

    let engine = AuditEngine::build(db, &config)?;
    let session = engine.create_session(Some(caller), input)?;
    log::info!("created session {} for {caller}", session.id);

    let response = engine.analyze(
        Some(caller),
        AnalyzeRequest {
            session_id: session.id.clone(),
            transactions,
        },
    );
    let response = match response {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_analysis(&response);

    if want_report {
        match engine.generate_report(Some(caller), ReportRequest { session_id: session.id.clone() }) {
            Ok(r) => print_report(&r.report),
            Err(e) => return fail(e),
        }
    }

    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn fail(e: AuditError) -> Result<()> {
    let response = e.to_response();
    eprintln!("{}", serde_json::to_string_pretty(&response)?);
    std::process::exit(i32::from(response.status / 100));
}

fn print_analysis(response: &AnalyzeResponse) {
    let s = &response.summary;
    println!("── Assessment ─────────────────────────────");
    println!("  session:  {}", response.session_id);
    println!("  total:    {}", s.total);
    println!("  high:     {}", s.high);
    println!("  medium:   {}", s.medium);
    println!("  low:      {}", s.low);
    println!("  advisory: {:?} (status {})", response.advisory, response.status());
    println!();

    for a in response.assessments.iter().filter(|a| a.risk_level != RiskLevel::Low) {
        println!("  [{:>6}] {:>3}  {}  {}", a.risk_level, a.risk_score, a.transaction_id, a.risk_reason);
        if let Some(action) = &a.suggested_action {
            println!("           → {action}");
        }
    }
    println!();
}

fn print_report(report: &AuditReport) {
    println!("── Audit report ───────────────────────────");
    println!("  id:       {}", report.id);
    println!("  posture:  {}", report.risk_posture);
    println!("  created:  {}", report.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    println!("{}", report.executive_summary);
    println!();
    if !report.key_risk_themes.is_empty() {
        println!("  Key risk themes:");
        for theme in &report.key_risk_themes {
            println!("    - {theme}");
        }
    }
    if !report.areas_of_attention.is_empty() {
        println!("  Areas of attention:");
        for area in &report.areas_of_attention {
            println!("    - {area}");
        }
    }
}
