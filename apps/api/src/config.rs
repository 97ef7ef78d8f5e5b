use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::comparison::engine::EngineSettings;

/// Application configuration loaded from environment variables.
/// Everything has a default; `DATABASE_URL` switches storage to PostgreSQL.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub frontend_url: String,
    pub k_factor: f64,
    pub baseline_rating: f64,
    pub comparisons_per_applicant: u32,
    pub reservation_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Config {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            frontend_url: lookup("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            k_factor: parse_or(&lookup, "ELO_K_FACTOR", 32.0)?,
            baseline_rating: parse_or(&lookup, "BASELINE_RATING", 1500.0)?,
            comparisons_per_applicant: parse_or(&lookup, "COMPARISONS_PER_APPLICANT", 5)?,
            reservation_ttl_secs: parse_or(&lookup, "PAIR_RESERVATION_TTL_SECS", 300)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.k_factor.is_finite() || self.k_factor <= 0.0 {
            bail!("ELO_K_FACTOR must be a positive number, got {}", self.k_factor);
        }
        if !self.baseline_rating.is_finite() || self.baseline_rating < 0.0 {
            bail!(
                "BASELINE_RATING must be a non-negative number, got {}",
                self.baseline_rating
            );
        }
        if self.comparisons_per_applicant == 0 {
            bail!("COMPARISONS_PER_APPLICANT must be at least 1");
        }
        if self.reservation_ttl_secs == 0 {
            bail!("PAIR_RESERVATION_TTL_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            k_factor: self.k_factor,
            baseline_rating: self.baseline_rating,
            comparisons_per_applicant: self.comparisons_per_applicant,
            reservation_ttl: Duration::from_secs(self.reservation_ttl_secs),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
