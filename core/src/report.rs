//! Audit report narrative: prompt, response parsing, and report assembly.

use crate::{
    model::{AuditReport, ReportSnapshot},
    narrative::{parse_structured, NarrativeError, NarrativeGenerator, NarrativePrompt},
    statistics::SessionStatistics,
};
use chrono::Utc;
use serde::Deserialize;

const REPORT_INSTRUCTIONS: &str = "\
You are drafting an audit risk report for a batch of financial transactions. \
Use ONLY the statistics provided. Every number you mention must be copied \
verbatim from the input; do not round, estimate, or describe figures as \
approximate, and do not introduce figures that are not present. Do not \
speculate about causes that the statistics do not show. \
Respond with a single JSON object and nothing else, with the keys \
\"executiveSummary\" (string), \"riskPosture\" (a short label such as \
\"Low\", \"Moderate\", \"Elevated\" or \"High\"), \"keyRiskThemes\" (array of \
strings) and \"areasOfAttention\" (array of strings).";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ReportNarrative {
    #[serde(rename = "executiveSummary", alias = "executive_summary")]
    pub executive_summary: String,
    #[serde(rename = "riskPosture", alias = "risk_posture")]
    pub risk_posture: String,
    #[serde(default, rename = "keyRiskThemes", alias = "key_risk_themes")]
    pub key_risk_themes: Vec<String>,
    #[serde(default, rename = "areasOfAttention", alias = "areas_of_attention")]
    pub areas_of_attention: Vec<String>,
}

pub fn report_prompt(stats: &SessionStatistics) -> Result<NarrativePrompt, serde_json::Error> {
    Ok(NarrativePrompt {
        system: REPORT_INSTRUCTIONS.to_string(),
        user: serde_json::to_string_pretty(stats)?,
    })
}

/// One generator call; any failure is returned to the caller untouched.
pub fn generate_narrative(
    stats: &SessionStatistics,
    generator: &dyn NarrativeGenerator,
) -> Result<ReportNarrative, NarrativeError> {
    let prompt = report_prompt(stats).map_err(|e| NarrativeError::Malformed(e.to_string()))?;
    let raw = generator.generate(&prompt)?;
    parse_structured(&raw, '{', '}')
}

pub fn build_report(stats: &SessionStatistics, narrative: ReportNarrative) -> AuditReport {
    AuditReport {
        id: uuid::Uuid::new_v4().to_string(),
        session_id: stats.session_id.clone(),
        executive_summary: narrative.executive_summary,
        risk_posture: narrative.risk_posture,
        key_risk_themes: narrative.key_risk_themes,
        areas_of_attention: narrative.areas_of_attention,
        statistics: ReportSnapshot {
            total_transactions: stats.total_transactions,
            high_risk_count: stats.high_risk_count,
            medium_risk_count: stats.medium_risk_count,
            low_risk_count: stats.low_risk_count,
            total_amount: stats.total_amount,
        },
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl NarrativeGenerator for Fixed {
        fn generate(&self, _prompt: &NarrativePrompt) -> Result<String, NarrativeError> {
            Ok(self.0.to_string())
        }
    }

    fn stats() -> SessionStatistics {
        SessionStatistics {
            session_id: "s-1".into(),
            total_transactions: 4,
            high_risk_count: 1,
            medium_risk_count: 1,
            low_risk_count: 2,
            total_amount: 1234.5,
            top_vendors: Vec::new(),
            top_risk_factors: Vec::new(),
            department_risk: Vec::new(),
        }
    }

    #[test]
    fn parses_snake_or_camel_keys() {
        let n = generate_narrative(
            &stats(),
            &Fixed(r#"{"executive_summary":"ok","risk_posture":"Moderate","key_risk_themes":["dupes"]}"#),
        )
        .unwrap();
        assert_eq!(n.risk_posture, "Moderate");
        assert!(n.areas_of_attention.is_empty());
    }

    #[test]
    fn missing_summary_is_malformed() {
        let err = generate_narrative(&stats(), &Fixed(r#"{"riskPosture":"High"}"#)).unwrap_err();
        assert!(matches!(err, NarrativeError::Malformed(_)));
    }

    #[test]
    fn report_snapshot_copies_statistics() {
        let narrative = ReportNarrative {
            executive_summary: "s".into(),
            risk_posture: "Low".into(),
            key_risk_themes: vec![],
            areas_of_attention: vec![],
        };
        let report = build_report(&stats(), narrative);
        assert_eq!(report.session_id, "s-1");
        assert_eq!(report.statistics.total_amount, 1234.5);
        assert_eq!(report.statistics.low_risk_count, 2);
    }

    #[test]
    fn prompt_embeds_figures_verbatim() {
        let prompt = report_prompt(&stats()).unwrap();
        assert!(prompt.user.contains("1234.5"));
        assert!(prompt.system.contains("verbatim"));
    }
}
