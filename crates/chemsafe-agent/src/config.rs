//! Environment-driven runtime configuration.

use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Plans longer than this are truncated (char boundary) before prompt
/// assembly, so a pasted lab notebook cannot blow the request budget.
pub const DEFAULT_MAX_PLAN_CHARS: usize = 8000;

#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub api_base: String,
    pub api_key: String,
    pub max_tokens: u32,
    /// How many rules retrieval contributes to a review prompt.
    pub top_k: usize,
    pub timeout: Duration,
    pub max_plan_chars: usize,
    /// Opt-in: append an advisory note when a pass verdict contradicts a
    /// critical structural finding. Never rewrites the verdict itself.
    pub verdict_consistency_check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            top_k: DEFAULT_TOP_K,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_plan_chars: DEFAULT_MAX_PLAN_CHARS,
            verdict_consistency_check: false,
        }
    }
}

impl Config {
    /// Read configuration from `CHEMSAFE_*` environment variables, falling
    /// back to defaults. Unparseable numeric values fall back rather than
    /// erroring; a review should not abort over a typo'd tuning knob.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("CHEMSAFE_LLM_MODEL") {
            if !v.trim().is_empty() {
                cfg.model = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("CHEMSAFE_API_BASE") {
            if !v.trim().is_empty() {
                cfg.api_base = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(v) = std::env::var("CHEMSAFE_API_KEY") {
            cfg.api_key = v.trim().to_string();
        }
        if let Ok(v) = std::env::var("CHEMSAFE_MAX_TOKENS") {
            match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => cfg.max_tokens = n,
                _ => tracing::warn!(value = %v, "ignoring invalid CHEMSAFE_MAX_TOKENS"),
            }
        }
        if let Ok(v) = std::env::var("CHEMSAFE_TOP_K") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => cfg.top_k = n,
                _ => tracing::warn!(value = %v, "ignoring invalid CHEMSAFE_TOP_K"),
            }
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.model, DEFAULT_MODEL);
        assert_eq!(cfg.top_k, 5);
        assert_eq!(cfg.max_tokens, 2048);
        assert_eq!(cfg.timeout, Duration::from_secs(120));
        assert!(!cfg.verdict_consistency_check);
    }
}
