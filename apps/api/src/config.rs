use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::documents::transfer::DEFAULT_CHUNK_BYTES;

/// Where raw document bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    Fs { dir: PathBuf },
    S3(S3Settings),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Which analysis engine the workers call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineConfig {
    Http { url: String },
    Llm { anthropic_api_key: String },
}

/// Application configuration loaded from environment variables.
/// Startup fails if a variable required by the selected backends is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub worker_pool_size: usize,
    pub analysis_timeout: Duration,
    pub transfer_chunk_bytes: usize,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub redis_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(lookup);

        Ok(Config {
            port: env.parse_or("PORT", 8080)?,
            rust_log: env.or("RUST_LOG", "info"),
            worker_pool_size: env.positive_or("WORKER_POOL_SIZE", 4)?,
            analysis_timeout: Duration::from_secs(
                env.positive_or("ANALYSIS_TIMEOUT_SECS", 120)? as u64,
            ),
            transfer_chunk_bytes: env.positive_or("TRANSFER_CHUNK_BYTES", DEFAULT_CHUNK_BYTES)?,
            storage: storage_config(&env)?,
            engine: engine_config(&env)?,
            redis_url: env.get("REDIS_URL"),
        })
    }
}

fn storage_config<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<StorageConfig> {
    match env.or("STORAGE_BACKEND", "memory").to_lowercase().as_str() {
        "memory" => Ok(StorageConfig::Memory),
        "fs" => Ok(StorageConfig::Fs {
            dir: PathBuf::from(env.or("STORAGE_DIR", "./data")),
        }),
        "s3" => Ok(StorageConfig::S3(S3Settings {
            bucket: env.require("S3_BUCKET")?,
            endpoint: env.require("S3_ENDPOINT")?,
            region: env.or("S3_REGION", "us-east-1"),
            access_key_id: env.require("AWS_ACCESS_KEY_ID")?,
            secret_access_key: env.require("AWS_SECRET_ACCESS_KEY")?,
        })),
        other => bail!("STORAGE_BACKEND must be one of memory, fs, s3 (got '{other}')"),
    }
}

fn engine_config<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<EngineConfig> {
    match env.or("ANALYSIS_ENGINE", "http").to_lowercase().as_str() {
        "http" => Ok(EngineConfig::Http {
            url: env.require("ANALYSIS_ENGINE_URL")?,
        }),
        "llm" => Ok(EngineConfig::Llm {
            anthropic_api_key: env.require("ANTHROPIC_API_KEY")?,
        }),
        other => bail!("ANALYSIS_ENGINE must be one of http, llm (got '{other}')"),
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Unset and blank are treated the same.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("Required environment variable '{key}' is not set"))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.get(key) {
            Some(raw) => raw
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'")),
            None => Ok(default),
        }
    }

    fn positive_or(&self, key: &str, default: usize) -> Result<usize> {
        let value = self.parse_or(key, default)?;
        if value == 0 {
            bail!("{key} must be at least 1");
        }
        Ok(value)
    }
}
