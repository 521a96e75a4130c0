//! Engine configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use super::diagnostic::DialogueConfig;
use super::explanation::DEFAULT_EXPLANATION_MAX_TOKENS;
use super::pool::PoolConfig;
use crate::error::ConfigError;
use crate::search::IndexConfig;

/// Default provider name.
const DEFAULT_PROVIDER: &str = "openai";
/// Default model for explanations.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for the triage engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API keys, one pool credential each. Empty means deterministic mode.
    pub api_keys: Vec<String>,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for the explanation agent.
    pub model: String,
    /// Maximum tokens for explanation responses.
    pub explanation_max_tokens: u32,
    /// Credential pool settings.
    pub pool: PoolConfig,
    /// Dialogue thresholds.
    pub dialogue: DialogueConfig,
    /// Retrieval settings.
    pub index: IndexConfig,
    /// Directory containing prompt template files.
    pub prompt_dir: Option<PathBuf>,
    /// Seed for credential selection. `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl EngineConfig {
    /// Creates a new builder for `EngineConfig`.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a setting is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env().build()
    }

    /// Whether any credential is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            api_keys: Vec::new(),
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            explanation_max_tokens: DEFAULT_EXPLANATION_MAX_TOKENS,
            pool: PoolConfig::default(),
            dialogue: DialogueConfig::default(),
            index: IndexConfig::default(),
            prompt_dir: None,
            rng_seed: None,
        }
    }
}

/// Splits a comma-separated key list, dropping blanks.
fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses one environment setting.
fn parse_setting<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    provider: Option<String>,
    api_keys: Option<Vec<String>>,
    base_url: Option<String>,
    model: Option<String>,
    explanation_max_tokens: Option<u32>,
    max_follow_ups: Option<u32>,
    min_turns: Option<usize>,
    diagnosis_threshold: Option<f32>,
    match_threshold: Option<f32>,
    vote_top_k: Option<usize>,
    min_relevance: Option<f32>,
    profile_boost: Option<f32>,
    max_attempts: Option<u32>,
    cooldown_base: Option<Duration>,
    cooldown_max: Option<Duration>,
    timeout: Option<Duration>,
    prompt_dir: Option<PathBuf>,
    rng_seed: Option<u64>,
    env_error: Option<(&'static str, String)>,
}

impl EngineConfigBuilder {
    /// Reads a numeric environment variable. A value that does not parse is
    /// kept and reported by [`build`](Self::build).
    fn env_parse<T: std::str::FromStr>(&mut self, name: &'static str) -> Option<T> {
        let raw = std::env::var(name).ok()?;
        let parsed = parse_setting(name, &raw).ok();
        if parsed.is_none() {
            self.env_error.get_or_insert((name, raw));
        }
        parsed
    }

    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("TRIAGE_PROVIDER").ok();
        }
        if self.api_keys.is_none() {
            self.api_keys = std::env::var("OPENAI_API_KEYS")
                .ok()
                .map(|v| split_keys(&v))
                .filter(|keys| !keys.is_empty())
                .or_else(|| {
                    std::env::var("OPENAI_API_KEY")
                        .ok()
                        .map(|v| split_keys(&v))
                });
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL").ok();
        }
        if self.model.is_none() {
            self.model = std::env::var("TRIAGE_MODEL").ok();
        }
        if self.max_follow_ups.is_none() {
            self.max_follow_ups = self.env_parse("TRIAGE_MAX_FOLLOW_UPS");
        }
        if self.max_attempts.is_none() {
            self.max_attempts = self.env_parse("TRIAGE_MAX_ATTEMPTS");
        }
        if self.timeout.is_none() {
            self.timeout = self
                .env_parse("TRIAGE_TIMEOUT_SECS")
                .map(Duration::from_secs);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("TRIAGE_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.rng_seed.is_none() {
            self.rng_seed = self.env_parse("TRIAGE_RNG_SEED");
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Adds an API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.get_or_insert_with(Vec::new).push(key.into());
        self
    }

    /// Sets the API keys, replacing any added before.
    #[must_use]
    pub fn api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Runs without credentials even if the environment provides some.
    #[must_use]
    pub fn offline(mut self) -> Self {
        self.api_keys = Some(Vec::new());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the explanation model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the explanation max tokens.
    #[must_use]
    pub const fn explanation_max_tokens(mut self, n: u32) -> Self {
        self.explanation_max_tokens = Some(n);
        self
    }

    /// Sets the follow-up cap.
    #[must_use]
    pub const fn max_follow_ups(mut self, n: u32) -> Self {
        self.max_follow_ups = Some(n);
        self
    }

    /// Sets the user turns required before an unforced diagnosis.
    #[must_use]
    pub const fn min_turns(mut self, n: usize) -> Self {
        self.min_turns = Some(n);
        self
    }

    /// Sets the diagnosis confidence threshold.
    #[must_use]
    pub const fn diagnosis_threshold(mut self, t: f32) -> Self {
        self.diagnosis_threshold = Some(t);
        self
    }

    /// Sets the score at which a symptom counts as described.
    #[must_use]
    pub const fn match_threshold(mut self, t: f32) -> Self {
        self.match_threshold = Some(t);
        self
    }

    /// Sets how many top matches vote on the condition.
    #[must_use]
    pub const fn vote_top_k(mut self, n: usize) -> Self {
        self.vote_top_k = Some(n);
        self
    }

    /// Sets the minimum relevance for query results.
    #[must_use]
    pub const fn min_relevance(mut self, t: f32) -> Self {
        self.min_relevance = Some(t);
        self
    }

    /// Sets the known-condition score boost.
    #[must_use]
    pub const fn profile_boost(mut self, b: f32) -> Self {
        self.profile_boost = Some(b);
        self
    }

    /// Sets the transient attempts per request.
    #[must_use]
    pub const fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = Some(n);
        self
    }

    /// Sets the first cooldown.
    #[must_use]
    pub const fn cooldown_base(mut self, d: Duration) -> Self {
        self.cooldown_base = Some(d);
        self
    }

    /// Sets the cooldown ceiling.
    #[must_use]
    pub const fn cooldown_max(mut self, d: Duration) -> Self {
        self.cooldown_max = Some(d);
        self
    }

    /// Sets the per-attempt request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the credential selection seed.
    #[must_use]
    pub const fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Builds the [`EngineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a threshold is outside
    /// `[0, 1]`, `max_attempts` or `vote_top_k` is zero, the timeout is
    /// zero, or a numeric environment variable did not parse.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        if let Some((name, value)) = self.env_error {
            return Err(ConfigError::InvalidValue { name, value });
        }
        let defaults = EngineConfig::default();

        let dialogue = DialogueConfig {
            max_follow_ups: self
                .max_follow_ups
                .unwrap_or(defaults.dialogue.max_follow_ups),
            min_turns: self.min_turns.unwrap_or(defaults.dialogue.min_turns),
            diagnosis_threshold: unit(
                "diagnosis_threshold",
                self.diagnosis_threshold
                    .unwrap_or(defaults.dialogue.diagnosis_threshold),
            )?,
            match_threshold: unit(
                "match_threshold",
                self.match_threshold
                    .unwrap_or(defaults.dialogue.match_threshold),
            )?,
            vote_top_k: positive(
                "vote_top_k",
                self.vote_top_k.unwrap_or(defaults.dialogue.vote_top_k),
            )?,
        };

        let index = IndexConfig {
            min_relevance: unit(
                "min_relevance",
                self.min_relevance.unwrap_or(defaults.index.min_relevance),
            )?,
            profile_boost: unit(
                "profile_boost",
                self.profile_boost.unwrap_or(defaults.index.profile_boost),
            )?,
        };

        let cooldown_base = self.cooldown_base.unwrap_or(defaults.pool.cooldown_base);
        let pool = PoolConfig {
            max_attempts: positive(
                "max_attempts",
                self.max_attempts.unwrap_or(defaults.pool.max_attempts),
            )?,
            cooldown_base,
            cooldown_max: self
                .cooldown_max
                .unwrap_or(defaults.pool.cooldown_max)
                .max(cooldown_base),
            request_timeout: nonzero(
                "timeout",
                self.timeout.unwrap_or(defaults.pool.request_timeout),
            )?,
        };

        Ok(EngineConfig {
            provider: self.provider.unwrap_or(defaults.provider),
            api_keys: self.api_keys.unwrap_or_default(),
            base_url: self.base_url,
            model: self.model.unwrap_or(defaults.model),
            explanation_max_tokens: self
                .explanation_max_tokens
                .unwrap_or(defaults.explanation_max_tokens),
            pool,
            dialogue,
            index,
            prompt_dir: self.prompt_dir,
            rng_seed: self.rng_seed,
        })
    }
}

fn unit(name: &'static str, value: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        })
    }
}

fn positive<T>(name: &'static str, value: T) -> Result<T, ConfigError>
where
    T: Copy + PartialEq + Default + ToString,
{
    if value == T::default() {
        Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        })
    } else {
        Ok(value)
    }
}

fn nonzero(name: &'static str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        Err(ConfigError::InvalidValue {
            name,
            value: format!("{value:?}"),
        })
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::diagnostic::DEFAULT_MAX_FOLLOW_UPS;
    use crate::agent::pool::DEFAULT_MAX_ATTEMPTS;

    #[test]
    fn test_builder_defaults() {
        let config = EngineConfig::builder()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert!(!config.has_credentials());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.dialogue.max_follow_ups, DEFAULT_MAX_FOLLOW_UPS);
        assert_eq!(config.pool.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = EngineConfig::builder()
            .api_key("k1")
            .api_key("k2")
            .provider("custom")
            .model("gpt-4o")
            .max_follow_ups(2)
            .diagnosis_threshold(0.6)
            .timeout(Duration::from_secs(5))
            .rng_seed(7)
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.api_keys, vec!["k1", "k2"]);
        assert_eq!(config.provider, "custom");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.dialogue.max_follow_ups, 2);
        assert!((config.dialogue.diagnosis_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.pool.request_timeout, Duration::from_secs(5));
        assert_eq!(config.rng_seed, Some(7));
    }

    #[test]
    fn test_offline_clears_keys() {
        let config = EngineConfig::builder()
            .api_key("k1")
            .offline()
            .from_env()
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let result = EngineConfig::builder().diagnosis_threshold(1.5).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                name: "diagnosis_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_zero_attempts_and_top_k() {
        assert!(matches!(
            EngineConfig::builder().max_attempts(0).build(),
            Err(ConfigError::InvalidValue {
                name: "max_attempts",
                ..
            })
        ));
        assert!(matches!(
            EngineConfig::builder().vote_top_k(0).build(),
            Err(ConfigError::InvalidValue {
                name: "vote_top_k",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert!(EngineConfig::builder().timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn test_parse_setting() {
        assert_eq!(parse_setting::<u32>("TRIAGE_MAX_ATTEMPTS", " 4 ").ok(), Some(4));
        assert!(matches!(
            parse_setting::<u32>("TRIAGE_MAX_ATTEMPTS", "abc"),
            Err(ConfigError::InvalidValue {
                name: "TRIAGE_MAX_ATTEMPTS",
                value,
            }) if value == "abc"
        ));
        assert!(parse_setting::<u64>("TRIAGE_RNG_SEED", "-1").is_err());
    }

    #[test]
    fn test_env_error_reported_by_build() {
        let builder = EngineConfigBuilder {
            env_error: Some(("TRIAGE_TIMEOUT_SECS", "soon".to_string())),
            ..EngineConfigBuilder::default()
        };
        assert!(matches!(
            builder.build(),
            Err(ConfigError::InvalidValue {
                name: "TRIAGE_TIMEOUT_SECS",
                ..
            })
        ));
    }

    #[test]
    fn test_split_keys() {
        assert_eq!(split_keys(" a, ,b ,"), vec!["a", "b"]);
        assert!(split_keys("").is_empty());
    }
}
