use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    pub analysis: LimitConfig,
    pub report: LimitConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            analysis: LimitConfig { max_requests: 10, window_secs: 60 * 60 },
            report:   LimitConfig { max_requests: 20, window_secs: 24 * 60 * 60 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NarrativeConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            model: "gpt-4o-mini".into(),
            api_key_env: "AUDIT_NARRATIVE_API_KEY".into(),
            timeout_secs: 30,
            max_tokens: 4000,
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    #[serde(default)]
    pub narrative: NarrativeConfig,
}

impl AuditConfig {
    /// Load from a JSON file. Missing sections fall back to defaults.
    /// In tests, use AuditConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: AuditConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, limit) in [("analysis", &self.rate_limits.analysis), ("report", &self.rate_limits.report)] {
            if limit.window_secs == 0 {
                anyhow::bail!("rate_limits.{name}.window_secs must be positive");
            }
        }
        if self.narrative.timeout_secs == 0 {
            anyhow::bail!("narrative.timeout_secs must be positive");
        }
        Ok(())
    }

    /// Small limits so tests can exhaust a window quickly.
    pub fn default_test() -> Self {
        Self {
            rate_limits: RateLimitConfig {
                analysis: LimitConfig { max_requests: 3, window_secs: 60 * 60 },
                report:   LimitConfig { max_requests: 5, window_secs: 24 * 60 * 60 },
            },
            narrative: NarrativeConfig {
                timeout_secs: 5,
                ..NarrativeConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_uses_defaults() {
        let cfg: AuditConfig =
            serde_json::from_str(r#"{"rate_limits":{"analysis":{"max_requests":2,"window_secs":10},"report":{"max_requests":4,"window_secs":20}}}"#)
                .unwrap();
        assert_eq!(cfg.rate_limits.analysis.max_requests, 2);
        assert_eq!(cfg.narrative, NarrativeConfig::default());
    }

    #[test]
    fn zero_window_rejected() {
        let mut cfg = AuditConfig::default();
        cfg.rate_limits.report.window_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn report_limit_is_larger_than_analysis() {
        let cfg = RateLimitConfig::default();
        assert!(cfg.report.max_requests > cfg.analysis.max_requests);
        assert!(cfg.report.window_secs > cfg.analysis.window_secs);
    }
}
