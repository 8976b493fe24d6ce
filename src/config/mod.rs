use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::tot::{EvaluationMethod, SearchStrategy, TotConfig};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Present only when `LANGBASE_API_KEY` is set.
    pub langbase: Option<LangbaseConfig>,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipes: PipeConfig,
    pub reasoning: ReasoningConfig,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Langbase pipe name configuration
#[derive(Debug, Clone)]
pub struct PipeConfig {
    pub thoughts: String,
}

/// Which thought generator backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Deterministic template generator, no network.
    Heuristic,
    /// LLM completions through a Langbase pipe.
    Langbase,
}

impl FromStr for GeneratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "heuristic" | "default" => Ok(GeneratorKind::Heuristic),
            "langbase" | "llm" => Ok(GeneratorKind::Langbase),
            _ => Err(format!("Unknown thought generator: {}", s)),
        }
    }
}

/// Tree-of-Thoughts engine configuration
#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    /// Session config applied when a caller does not pass one.
    pub defaults: TotConfig,
    /// Hard cap on explored nodes per run.
    pub exploration_cap: usize,
    pub generator_timeout_ms: u64,
    /// Wall-clock budget for one exploration run, unbounded when `None`.
    pub exploration_timeout_ms: Option<u64>,
    pub generator: GeneratorKind,
}

impl ReasoningConfig {
    /// Per-call generator timeout as a [`Duration`].
    pub fn generator_timeout(&self) -> Duration {
        Duration::from_millis(self.generator_timeout_ms)
    }

    /// Exploration budget as a [`Duration`], if one is configured.
    pub fn exploration_timeout(&self) -> Option<Duration> {
        self.exploration_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            defaults: TotConfig::default(),
            exploration_cap: 50,
            generator_timeout_ms: 10_000,
            exploration_timeout_ms: None,
            generator: GeneratorKind::Heuristic,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = env::var("LANGBASE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|api_key| LangbaseConfig {
                api_key,
                base_url: env::var("LANGBASE_BASE_URL")
                    .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
            });

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env_number("REQUEST_TIMEOUT_MS", 30000),
            max_retries: env_number("MAX_RETRIES", 3),
            retry_delay_ms: env_number("RETRY_DELAY_MS", 1000),
        };

        let pipes = PipeConfig {
            thoughts: env::var("PIPE_THOUGHTS")
                .unwrap_or_else(|_| "tot-thought-generator-v1".to_string()),
        };

        let reasoning = Self::reasoning_from_env()?;

        if reasoning.generator == GeneratorKind::Langbase && langbase.is_none() {
            return Err(AppError::Config {
                message: "TOT_GENERATOR=langbase requires LANGBASE_API_KEY".to_string(),
            });
        }

        Ok(Config {
            langbase,
            logging,
            request,
            pipes,
            reasoning,
        })
    }

    fn reasoning_from_env() -> Result<ReasoningConfig, AppError> {
        let fallback = ReasoningConfig::default();

        let search_strategy = match env::var("TOT_SEARCH_STRATEGY") {
            Ok(raw) => raw
                .parse::<SearchStrategy>()
                .map_err(|message| AppError::Config { message })?,
            Err(_) => fallback.defaults.search_strategy,
        };
        let evaluation_method = match env::var("TOT_EVALUATION_METHOD") {
            Ok(raw) => raw
                .parse::<EvaluationMethod>()
                .map_err(|message| AppError::Config { message })?,
            Err(_) => fallback.defaults.evaluation_method,
        };
        let generator = match env::var("TOT_GENERATOR") {
            Ok(raw) => raw
                .parse::<GeneratorKind>()
                .map_err(|message| AppError::Config { message })?,
            Err(_) => fallback.generator,
        };

        let defaults = TotConfig {
            max_depth: env_number("TOT_MAX_DEPTH", fallback.defaults.max_depth),
            branching_factor: env_number("TOT_BRANCHING_FACTOR", fallback.defaults.branching_factor),
            evaluation_method,
            search_strategy,
            pruning_threshold: env_number(
                "TOT_PRUNING_THRESHOLD",
                fallback.defaults.pruning_threshold,
            ),
        };
        defaults.validate().map_err(|e| AppError::Config {
            message: e.to_string(),
        })?;

        let exploration_cap = env_number("TOT_EXPLORATION_CAP", fallback.exploration_cap);
        if exploration_cap == 0 {
            return Err(AppError::Config {
                message: "TOT_EXPLORATION_CAP must be at least 1".to_string(),
            });
        }

        Ok(ReasoningConfig {
            defaults,
            exploration_cap,
            generator_timeout_ms: env_number(
                "TOT_GENERATOR_TIMEOUT_MS",
                fallback.generator_timeout_ms,
            ),
            exploration_timeout_ms: env::var("TOT_EXPLORATION_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok()),
            generator,
        })
    }
}

/// Read a numeric env var, falling back to `default` when unset or unparsable.
fn env_number<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_default() {
        let config = RequestConfig::default();
        assert_eq!(config.timeout_ms, 30000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 1000);
    }

    #[test]
    fn test_reasoning_config_default() {
        let config = ReasoningConfig::default();
        assert_eq!(config.exploration_cap, 50);
        assert_eq!(config.generator, GeneratorKind::Heuristic);
        assert_eq!(config.generator_timeout(), Duration::from_secs(10));
        assert!(config.exploration_timeout().is_none());
        assert_eq!(config.defaults, TotConfig::default());
    }

    #[test]
    fn test_generator_kind_from_str() {
        assert_eq!("heuristic".parse::<GeneratorKind>(), Ok(GeneratorKind::Heuristic));
        assert_eq!("LANGBASE".parse::<GeneratorKind>(), Ok(GeneratorKind::Langbase));
        assert_eq!("llm".parse::<GeneratorKind>(), Ok(GeneratorKind::Langbase));
        assert!("oracle".parse::<GeneratorKind>().is_err());
    }
}
