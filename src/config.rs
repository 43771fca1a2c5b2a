//! Environment-driven configuration for the dashboard client and the
//! results backend. A `.env` file is honored when present.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5001";
pub const RESULTS_PATH: &str = "/api/td3-results";
pub const RUN_PATH: &str = "/api/run-td3";
pub const STATIC_RESULTS_PATH: &str = "/td3_results.json";
pub const DEFAULT_EPISODES: u32 = 3;
pub const MAX_EPISODES: u32 = 100;

/// Client side: where results come from and how long they stay fresh
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub fallback_url: String,
    /// Zero disables expiry: entries stay until invalidated.
    pub cache_max_age: Duration,
    /// `None` leaves the transport default in place.
    pub http_timeout: Option<Duration>,
    pub episodes: u32,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Set-but-unparsable numbers
    /// are errors, not silent defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base = env_str(&lookup, "TD3_API_URL", DEFAULT_API_BASE);
        let fallback_url = env_opt(&lookup, "TD3_FALLBACK_URL")
            .unwrap_or_else(|| join_url(&api_base, STATIC_RESULTS_PATH));

        let cache_max_age = Duration::from_secs(env_u64(&lookup, "TD3_CACHE_MAX_AGE_SECS", 300)?);
        let http_timeout = Some(env_u64(&lookup, "TD3_HTTP_TIMEOUT_SECS", 0)?)
            .filter(|&s| s > 0)
            .map(Duration::from_secs);

        let episodes = env_u64(&lookup, "TD3_EPISODES", DEFAULT_EPISODES as u64)?;
        if !(1..=MAX_EPISODES as u64).contains(&episodes) {
            bail!("TD3_EPISODES must be between 1 and {}, got {}", MAX_EPISODES, episodes);
        }

        Ok(Self {
            api_base,
            fallback_url,
            cache_max_age,
            http_timeout,
            episodes: episodes as u32,
        })
    }

    pub fn results_url(&self) -> String {
        join_url(&self.api_base, RESULTS_PATH)
    }

    pub fn run_url(&self) -> String {
        join_url(&self.api_base, RUN_PATH)
    }
}

/// Backend side: training job and results artifact locations
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub results_path: PathBuf,
    pub script: PathBuf,
    pub interpreter: String,
    pub csv_path: PathBuf,
    pub job_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match env_opt(&lookup, "PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {:?}", raw))?,
            None => 5001,
        };

        Ok(Self {
            port,
            results_path: PathBuf::from(env_str(
                &lookup,
                "TD3_RESULTS_PATH",
                "frontend/public/td3_results.json",
            )),
            script: PathBuf::from(env_str(&lookup, "TD3_SCRIPT", "td3/run_csv.py")),
            interpreter: env_str(&lookup, "TD3_INTERPRETER", "python3"),
            csv_path: PathBuf::from(env_str(&lookup, "TD3_CSV_PATH", "CSV file/AAPL_data.csv")),
            job_timeout: Duration::from_secs(env_u64(&lookup, "TD3_JOB_TIMEOUT_SECS", 600)?.max(1)),
        })
    }
}

pub fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Trimmed value; empty counts as unset
fn env_opt(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_str(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    env_opt(lookup, name).unwrap_or_else(|| default.to_string())
}

fn env_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> Result<u64> {
    match env_opt(lookup, name) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", name, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_client_defaults() {
        let config = ClientConfig::from_lookup(vars(&[])).unwrap();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.fallback_url, "http://127.0.0.1:5001/td3_results.json");
        assert_eq!(config.cache_max_age, Duration::from_secs(300));
        assert_eq!(config.http_timeout, None);
        assert_eq!(config.episodes, DEFAULT_EPISODES);
        assert_eq!(config.results_url(), "http://127.0.0.1:5001/api/td3-results");
    }

    #[test]
    fn test_client_overrides() {
        let config = ClientConfig::from_lookup(vars(&[
            ("TD3_API_URL", "http://backend:8080/"),
            ("TD3_CACHE_MAX_AGE_SECS", "0"),
            ("TD3_HTTP_TIMEOUT_SECS", "15"),
            ("TD3_EPISODES", " 7 "),
        ]))
        .unwrap();
        assert_eq!(config.fallback_url, "http://backend:8080/td3_results.json");
        assert_eq!(config.run_url(), "http://backend:8080/api/run-td3");
        assert_eq!(config.cache_max_age, Duration::ZERO);
        assert_eq!(config.http_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.episodes, 7);
    }

    #[test]
    fn test_unparsable_values_are_errors() {
        let err = ClientConfig::from_lookup(vars(&[("TD3_CACHE_MAX_AGE_SECS", "abc")]))
            .unwrap_err();
        assert!(err.to_string().contains("TD3_CACHE_MAX_AGE_SECS"));

        assert!(ClientConfig::from_lookup(vars(&[("TD3_EPISODES", "0")])).is_err());
        assert!(ClientConfig::from_lookup(vars(&[("TD3_EPISODES", "101")])).is_err());

        let err = ServerConfig::from_lookup(vars(&[("PORT", "x")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
        assert!(ServerConfig::from_lookup(vars(&[("TD3_JOB_TIMEOUT_SECS", "-1")])).is_err());
    }

    #[test]
    fn test_server_defaults() {
        let config = ServerConfig::from_lookup(vars(&[])).unwrap();
        assert_eq!(config.port, 5001);
        assert_eq!(config.script, PathBuf::from("td3/run_csv.py"));
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.csv_path, PathBuf::from("CSV file/AAPL_data.csv"));
        assert_eq!(config.job_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("http://a:1/", RESULTS_PATH),
            "http://a:1/api/td3-results"
        );
        assert_eq!(join_url("http://a:1", RUN_PATH), "http://a:1/api/run-td3");
        assert_eq!(join_url("", STATIC_RESULTS_PATH), "/td3_results.json");
    }
}
