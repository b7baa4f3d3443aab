use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Triagelink";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bind address for the HTTP server.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

/// Runtime configuration for the intake pipeline.
///
/// Compiled defaults with environment overrides. Tests construct this
/// directly to tighten deadlines and ceilings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum accepted link TTL, in hours.
    pub ttl_min_hours: i64,
    /// Maximum accepted link TTL, in hours.
    pub ttl_max_hours: i64,
    /// Failed DOB verification attempts before the link is force-expired.
    pub max_verification_attempts: u32,
    /// Bearer key required on provider-facing routes.
    pub provider_api_key: String,
    /// How long a generation lease is honored before it may be reclaimed.
    pub lease_ttl_secs: i64,
    /// Generative AI call discipline.
    pub ai: AiConfig,
}

/// Call discipline for the external generative service.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Base URL of the generative HTTP endpoint.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Hard deadline per attempt.
    pub deadline: Duration,
    /// Retries after the first attempt, for transient failures only.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub backoff_base: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ttl_min_hours: 1,
            ttl_max_hours: 168,
            max_verification_attempts: 5,
            provider_api_key: String::new(),
            lease_ttl_secs: 120,
            ai: AiConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "medgemma:4b".to_string(),
            deadline: Duration::from_secs(30),
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
        }
    }
}

impl PipelineConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    ///
    /// `TRIAGELINK_PROVIDER_KEY` has no default — provider routes reject
    /// everything until it is set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ttl_min_hours: env_i64("TRIAGELINK_TTL_MIN_HOURS", defaults.ttl_min_hours),
            ttl_max_hours: env_i64("TRIAGELINK_TTL_MAX_HOURS", defaults.ttl_max_hours),
            max_verification_attempts: env_i64(
                "TRIAGELINK_MAX_VERIFY_ATTEMPTS",
                defaults.max_verification_attempts as i64,
            ) as u32,
            provider_api_key: std::env::var("TRIAGELINK_PROVIDER_KEY").unwrap_or_default(),
            lease_ttl_secs: env_i64("TRIAGELINK_LEASE_TTL_SECS", defaults.lease_ttl_secs),
            ai: AiConfig::from_env(),
        }
    }
}

impl AiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("TRIAGELINK_AI_URL").unwrap_or(defaults.base_url),
            model: std::env::var("TRIAGELINK_AI_MODEL").unwrap_or(defaults.model),
            deadline: Duration::from_secs(
                env_i64("TRIAGELINK_AI_DEADLINE_SECS", 30).max(1) as u64
            ),
            max_retries: env_i64("TRIAGELINK_AI_MAX_RETRIES", 2).max(0) as u32,
            backoff_base: Duration::from_millis(
                env_i64("TRIAGELINK_AI_BACKOFF_MS", 500).max(1) as u64,
            ),
        }
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
