//! Configuration for the engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Configuration for the unified engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Completion API settings.
    pub completion: CompletionConfig,

    /// Encoder backend settings.
    pub encoder: EncoderConfig,

    /// Cache store settings.
    pub cache: CacheConfig,

    /// Relational store settings.
    pub database: DatabaseConfig,
}

impl EngineConfig {
    /// Build a configuration from the environment, loading a `.env`
    /// file when present. `OPENAI_API_KEY` and `DATABASE_URL` are
    /// required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let completion = CompletionConfig {
            api_key: require("OPENAI_API_KEY")?,
            base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            model: var_or("OPENAI_MODEL", "gpt-4o-mini"),
            timeout: secs_or("LLM_TIMEOUT", 10)?,
        };

        let encoder = EncoderConfig {
            base_url: var_or("ENCODER_URL", "http://localhost:8100"),
            model: var_or("CLIP_MODEL_NAME", "ViT-B-32"),
            request_timeout: secs_or("EMBEDDING_TIMEOUT", 5)?,
            fetch_timeout: secs_or("IMAGE_FETCH_TIMEOUT", 5)?,
            batch_fetch_timeout: secs_or("BATCH_IMAGE_FETCH_TIMEOUT", 20)?,
            max_concurrent_fetches: parse_or("MAX_CONCURRENT_FETCHES", 8)?,
        };

        let cache = CacheConfig {
            url: var_or("REDIS_URL", "redis://localhost:6379"),
            ttl: secs_or("REDIS_TTL", 3600)?,
        };

        let database = DatabaseConfig {
            url: require("DATABASE_URL")?,
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 8)?,
            acquire_timeout: secs_or("DATABASE_ACQUIRE_TIMEOUT", 5)?,
        };

        Ok(Self {
            completion,
            encoder,
            cache,
            database,
        })
    }
}

/// Completion API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// API key.
    pub api_key: String,

    /// API base URL.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

/// Encoder backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Inference server base URL.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Per-request timeout for encode calls.
    pub request_timeout: Duration,

    /// Timeout for a single image fetch.
    pub fetch_timeout: Duration,

    /// Per-image timeout during batch fetches.
    pub batch_fetch_timeout: Duration,

    /// Bound on concurrent image downloads.
    pub max_concurrent_fetches: usize,
}

/// Cache store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL.
    pub url: String,

    /// TTL for parsed-prompt entries.
    pub ttl: Duration,
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection URL.
    pub url: String,

    /// Pool size bound.
    pub max_connections: u32,

    /// Per-acquire timeout.
    pub acquire_timeout: Duration,
}

fn require(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| EngineError::Config(format!("{name} is not set")))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| EngineError::Config(format!("{name} is not a valid number"))),
        Err(_) => Ok(default),
    }
}

fn secs_or(name: &str, default: u64) -> Result<Duration> {
    Ok(Duration::from_secs(parse_or(name, default)?))
}
