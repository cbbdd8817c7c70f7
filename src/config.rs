use std::{env, net::SocketAddr, num::NonZeroUsize, time::Duration};

use thiserror::Error;

use crate::scheduler::MinuteRounding;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// ドキュメントストアの実装種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    store_backend: StoreBackend,
    content_db_dsn: Option<String>,
    content_db_max_connections: u32,
    content_db_acquire_timeout: Duration,
    llm_base_url: String,
    llm_api_key: String,
    llm_model: String,
    llm_timeout: Duration,
    cron_secret: String,
    supported_languages: Vec<String>,
    canonical_language: String,
    duplicate_threshold: f64,
    duplicate_content_chars: usize,
    generation_max_concurrency: NonZeroUsize,
    generation_timeout: Duration,
    translation_max_concurrency: NonZeroUsize,
    translation_timeout: Duration,
    minute_rounding: MinuteRounding,
    internal_cron_enabled: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から Content Worker の設定値を読み込み、検証する。
    ///
    /// # Errors
    /// `LLM_API_KEY` / `CRON_SECRET` が未設定、Postgres バックエンドで `CONTENT_DB_DSN` が未設定、
    /// もしくは各種値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("CONTENT_WORKER_HTTP_BIND", "0.0.0.0:9010")?;
        let store_backend = parse_store_backend("STORE_BACKEND", StoreBackend::Postgres)?;
        let content_db_dsn = env::var("CONTENT_DB_DSN").ok();
        if store_backend == StoreBackend::Postgres && content_db_dsn.is_none() {
            return Err(ConfigError::Missing("CONTENT_DB_DSN"));
        }
        let content_db_max_connections = parse_u32("CONTENT_DB_MAX_CONNECTIONS", 10)?;
        let content_db_acquire_timeout =
            parse_duration_secs("CONTENT_DB_ACQUIRE_TIMEOUT_SECS", 30)?;

        // Generative text provider (OpenAI-compatible chat completions)
        let llm_base_url =
            env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/".to_string());
        let llm_api_key = env_var("LLM_API_KEY")?;
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let llm_timeout = parse_duration_secs("LLM_TIMEOUT_SECS", 180)?;

        let cron_secret = env_var("CRON_SECRET")?;

        let supported_languages = parse_csv("SUPPORTED_LANGUAGES", "ja,en,zh,ko,fr,es");
        if supported_languages.is_empty() {
            return Err(ConfigError::Invalid {
                name: "SUPPORTED_LANGUAGES",
                source: anyhow::anyhow!("at least one language code is required"),
            });
        }
        let canonical_language =
            env::var("CANONICAL_LANGUAGE").unwrap_or_else(|_| "ja".to_string());

        // Duplicate screening
        let duplicate_threshold = parse_ratio("DUPLICATE_THRESHOLD", 0.7)?;
        let duplicate_content_chars = parse_usize("DUPLICATE_CONTENT_CHARS", 500)?;

        // Fan-out settings
        let generation_max_concurrency = parse_non_zero_usize("GENERATION_MAX_CONCURRENCY", 3)?;
        let generation_timeout = parse_duration_secs("GENERATION_TIMEOUT_SECS", 240)?;
        let translation_max_concurrency = parse_non_zero_usize("TRANSLATION_MAX_CONCURRENCY", 4)?;
        let translation_timeout = parse_duration_secs("TRANSLATION_TIMEOUT_SECS", 60)?;

        let minute_rounding = parse_minute_rounding("SCHEDULE_MINUTE_ROUNDING")?;
        let internal_cron_enabled = parse_bool("INTERNAL_CRON_ENABLED", false)?;

        Ok(Self {
            http_bind,
            store_backend,
            content_db_dsn,
            content_db_max_connections,
            content_db_acquire_timeout,
            llm_base_url,
            llm_api_key,
            llm_model,
            llm_timeout,
            cron_secret,
            supported_languages,
            canonical_language,
            duplicate_threshold,
            duplicate_content_chars,
            generation_max_concurrency,
            generation_timeout,
            translation_max_concurrency,
            translation_timeout,
            minute_rounding,
            internal_cron_enabled,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            http_bind: "127.0.0.1:0".parse().expect("valid bind address"),
            store_backend: StoreBackend::Memory,
            content_db_dsn: None,
            content_db_max_connections: 1,
            content_db_acquire_timeout: Duration::from_secs(1),
            llm_base_url: "http://localhost:18080/".to_string(),
            llm_api_key: "test-key".to_string(),
            llm_model: "test-model".to_string(),
            llm_timeout: Duration::from_secs(5),
            cron_secret: "cron-secret".to_string(),
            supported_languages: vec!["ja".to_string(), "en".to_string(), "fr".to_string()],
            canonical_language: "ja".to_string(),
            duplicate_threshold: 0.7,
            duplicate_content_chars: 500,
            generation_max_concurrency: NonZeroUsize::new(3).expect("non-zero"),
            generation_timeout: Duration::from_secs(5),
            translation_max_concurrency: NonZeroUsize::new(2).expect("non-zero"),
            translation_timeout: Duration::from_secs(5),
            minute_rounding: MinuteRounding::Nearest,
            internal_cron_enabled: false,
        }
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    #[must_use]
    pub fn content_db_dsn(&self) -> Option<&str> {
        self.content_db_dsn.as_deref()
    }

    #[must_use]
    pub fn content_db_max_connections(&self) -> u32 {
        self.content_db_max_connections
    }

    #[must_use]
    pub fn content_db_acquire_timeout(&self) -> Duration {
        self.content_db_acquire_timeout
    }

    #[must_use]
    pub fn llm_base_url(&self) -> &str {
        &self.llm_base_url
    }

    #[must_use]
    pub fn llm_api_key(&self) -> &str {
        &self.llm_api_key
    }

    #[must_use]
    pub fn llm_model(&self) -> &str {
        &self.llm_model
    }

    #[must_use]
    pub fn llm_timeout(&self) -> Duration {
        self.llm_timeout
    }

    #[must_use]
    pub fn cron_secret(&self) -> &str {
        &self.cron_secret
    }

    #[must_use]
    pub fn supported_languages(&self) -> &[String] {
        &self.supported_languages
    }

    #[must_use]
    pub fn canonical_language(&self) -> &str {
        &self.canonical_language
    }

    #[must_use]
    pub fn duplicate_threshold(&self) -> f64 {
        self.duplicate_threshold
    }

    #[must_use]
    pub fn duplicate_content_chars(&self) -> usize {
        self.duplicate_content_chars
    }

    #[must_use]
    pub fn generation_max_concurrency(&self) -> NonZeroUsize {
        self.generation_max_concurrency
    }

    #[must_use]
    pub fn generation_timeout(&self) -> Duration {
        self.generation_timeout
    }

    #[must_use]
    pub fn translation_max_concurrency(&self) -> NonZeroUsize {
        self.translation_max_concurrency
    }

    #[must_use]
    pub fn translation_timeout(&self) -> Duration {
        self.translation_timeout
    }

    #[must_use]
    pub fn minute_rounding(&self) -> MinuteRounding {
        self.minute_rounding
    }

    #[must_use]
    pub fn internal_cron_enabled(&self) -> bool {
        self.internal_cron_enabled
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_store_backend(
    name: &'static str,
    default: StoreBackend,
) -> Result<StoreBackend, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid {
                name,
                source: anyhow::anyhow!("unknown store backend: {other}"),
            }),
        },
    }
}

fn parse_minute_rounding(name: &'static str) -> Result<MinuteRounding, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(MinuteRounding::Nearest),
        Ok(raw) => raw.parse().map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::Error::msg(error),
        }),
    }
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let parsed = parse_usize(name, default)?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_ratio(name: &'static str, default: f64) -> Result<f64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<f64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    if !(0.0..=1.0).contains(&parsed) {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be between 0.0 and 1.0"),
        });
    }
    Ok(parsed)
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}

fn parse_csv(name: &'static str, default: &str) -> Vec<String> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let mut values: Vec<String> = Vec::new();
    for value in raw.split(',') {
        let normalized = value.trim().to_lowercase();
        if !normalized.is_empty() && !values.contains(&normalized) {
            values.push(normalized);
        }
    }
    values
}
