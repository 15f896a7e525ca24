//! Server configuration loaded from the environment.

use std::str::FromStr;

use notecurate_core::defaults;
use notecurate_inference::ExtractionConfig;

/// Default comma-separated CORS origins.
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub ollama_base: String,
    pub gen_timeout_secs: u64,
    pub extraction: ExtractionConfig,
    pub console_capacity: usize,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    /// Read configuration from process environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DATABASE_URL` | `sqlite://notecurate.db` |
    /// | `HOST` / `PORT` | `127.0.0.1` / `3000` |
    /// | `OLLAMA_BASE` | `http://127.0.0.1:11434` |
    /// | `NOTECURATE_GEN_MODEL` | `gemma3:latest` |
    /// | `NOTECURATE_MAX_ATTEMPTS` | `3`, at most `10` |
    /// | `NOTECURATE_GEN_TIMEOUT_SECS` | `120` |
    /// | `CONSOLE_CAPACITY` | `500` |
    /// | `ALLOWED_ORIGINS` | localhost on port 3000 |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            host: lookup("HOST").unwrap_or_else(|| defaults::SERVER_HOST.to_string()),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults::SERVER_PORT),
            ollama_base: lookup(defaults::ENV_OLLAMA_BASE)
                .unwrap_or_else(|| defaults::OLLAMA_URL.to_string()),
            gen_timeout_secs: parse_var(&lookup, defaults::ENV_GEN_TIMEOUT_SECS)
                .unwrap_or(defaults::GEN_TIMEOUT_SECS),
            extraction: ExtractionConfig::new(
                lookup(defaults::ENV_GEN_MODEL).unwrap_or_else(|| defaults::GEN_MODEL.to_string()),
                parse_var(&lookup, defaults::ENV_MAX_ATTEMPTS)
                    .unwrap_or(defaults::MAX_ATTEMPTS)
                    .min(defaults::MAX_ATTEMPTS_LIMIT),
            ),
            console_capacity: parse_var(&lookup, "CONSOLE_CAPACITY").unwrap_or(defaults::CONSOLE_CAPACITY),
            allowed_origins,
            max_body_bytes: defaults::MAX_BODY_SIZE_BYTES,
        }
    }

    /// `host:port` for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database_url, "sqlite://notecurate.db");
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert_eq!(config.extraction, ExtractionConfig::default());
        assert_eq!(config.console_capacity, 500);
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("PORT", "8080"),
            ("NOTECURATE_GEN_MODEL", "llama3:8b"),
            ("NOTECURATE_MAX_ATTEMPTS", "5"),
            ("ALLOWED_ORIGINS", "https://a.example, ,https://b.example"),
        ]));
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.port, 8080);
        assert_eq!(config.extraction, ExtractionConfig::new("llama3:8b", 5));
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_unparseable_numbers_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("PORT", "not-a-port"),
            ("NOTECURATE_MAX_ATTEMPTS", "-1"),
        ]));
        assert_eq!(config.port, 3000);
        assert_eq!(config.extraction.max_attempts, 3);
    }

    #[test]
    fn test_max_attempts_is_capped() {
        let config = AppConfig::from_lookup(lookup_from(&[("NOTECURATE_MAX_ATTEMPTS", "500")]));
        assert_eq!(config.extraction.max_attempts, defaults::MAX_ATTEMPTS_LIMIT);
    }
}
