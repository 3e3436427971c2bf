//! Environment-driven configuration.
//!
//! Everything has a sensible default except `EXTRACTION_URL`; without a
//! `DATABASE_URL` the process runs entirely in memory (jobs are lost on
//! restart, notifications are disabled).

use std::time::Duration;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub extraction_url: String,
    pub expo_access_token: Option<String>,
    pub max_concurrent_jobs: usize,
    pub job_poll_interval: Duration,
    pub job_timeout: Duration,
    pub cleanup_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: parse_or("PORT", 8080)?,
            database_url: std::env::var("DATABASE_URL").ok(),
            extraction_url: std::env::var("EXTRACTION_URL")
                .context("EXTRACTION_URL must be set")?,
            expo_access_token: std::env::var("EXPO_ACCESS_TOKEN").ok(),
            max_concurrent_jobs: parse_or("MAX_CONCURRENT_JOBS", 5)?,
            job_poll_interval: Duration::from_millis(parse_or("JOB_POLL_INTERVAL_MS", 1000)?),
            job_timeout: Duration::from_millis(parse_or("JOB_TIMEOUT_MS", 300_000)?),
            cleanup_interval: Duration::from_secs(
                parse_or("CLEANUP_INTERVAL_MINUTES", 60u64)? * 60,
            ),
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}
