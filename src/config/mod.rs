use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::rate_limit::policies;

/// Quota and window for one limiter preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSettings {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl LimitSettings {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window_secs: window.as_secs(),
            max_requests,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    /// Absent means the cache starts degraded.
    pub redis_url: Option<String>,
    pub cache_reconnect_secs: Option<u64>,
    /// Set to sweep expired rate-limit records in the background instead of
    /// on every request.
    pub rate_limit_sweep_secs: Option<u64>,
    pub auth_limit: LimitSettings,
    pub api_limit: LimitSettings,
    pub upload_limit: LimitSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "::".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            redis_url: None,
            cache_reconnect_secs: None,
            rate_limit_sweep_secs: None,
            auth_limit: LimitSettings::new(policies::AUTH_WINDOW, policies::AUTH_MAX_REQUESTS),
            api_limit: LimitSettings::new(policies::API_WINDOW, policies::API_MAX_REQUESTS),
            upload_limit: LimitSettings::new(
                policies::UPLOAD_WINDOW,
                policies::UPLOAD_MAX_REQUESTS,
            ),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name))
    }

    /// Builds the config from any variable source. Missing or malformed
    /// numbers fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, env::VarError>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = Config::default();
        let optional = |name: &str| match lookup(name) {
            Ok(value) if !value.trim().is_empty() => Ok(Some(value.trim().to_string())),
            Ok(_) | Err(env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(e),
        };
        let parsed = |name: &str| -> Result<Option<u64>, env::VarError> {
            Ok(optional(name)?.and_then(|v| parse_or_warn(name, &v)))
        };
        let limit = |window: &str, requests: &str, fallback: LimitSettings| {
            Ok::<_, env::VarError>(LimitSettings {
                window_secs: parsed(window)?.unwrap_or(fallback.window_secs),
                max_requests: optional(requests)?
                    .and_then(|v| parse_or_warn(requests, &v))
                    .unwrap_or(fallback.max_requests),
            })
        };

        Ok(Config {
            server_host: optional("SERVER_HOST")?.unwrap_or(defaults.server_host),
            server_port: optional("SERVER_PORT")?
                .and_then(|v| parse_or_warn("SERVER_PORT", &v))
                .unwrap_or(defaults.server_port),
            api_base_uri: optional("API_BASE_URI")?.unwrap_or(defaults.api_base_uri),
            redis_url: optional("REDIS_URL")?,
            cache_reconnect_secs: parsed("CACHE_RECONNECT_INTERVAL")?.filter(|s| *s > 0),
            rate_limit_sweep_secs: parsed("RATE_LIMIT_SWEEP_INTERVAL")?.filter(|s| *s > 0),
            auth_limit: limit(
                "AUTH_RATE_LIMIT_WINDOW",
                "AUTH_RATE_LIMIT_REQUESTS",
                defaults.auth_limit,
            )?,
            api_limit: limit("RATE_LIMIT_WINDOW", "RATE_LIMIT_REQUESTS", defaults.api_limit)?,
            upload_limit: limit(
                "UPLOAD_RATE_LIMIT_WINDOW",
                "UPLOAD_RATE_LIMIT_REQUESTS",
                defaults.upload_limit,
            )?,
        })
    }

    pub fn cache_reconnect_interval(&self) -> Option<Duration> {
        self.cache_reconnect_secs.map(Duration::from_secs)
    }

    pub fn rate_limit_sweep_interval(&self) -> Option<Duration> {
        self.rate_limit_sweep_secs.map(Duration::from_secs)
    }
}

fn parse_or_warn<T: FromStr>(name: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring malformed {}={:?}, using default", name, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.api_base_uri, "/api");
        assert!(config.redis_url.is_none());
        assert!(config.cache_reconnect_interval().is_none());
        assert_eq!(config.api_limit, Config::default().api_limit);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("REDIS_URL", "redis://127.0.0.1/"),
            ("SERVER_PORT", "8080"),
            ("RATE_LIMIT_WINDOW", "60"),
            ("RATE_LIMIT_REQUESTS", "20"),
            ("UPLOAD_RATE_LIMIT_REQUESTS", "3"),
            ("CACHE_RECONNECT_INTERVAL", "30"),
            ("RATE_LIMIT_SWEEP_INTERVAL", "0"),
        ]))
        .unwrap();

        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.api_limit, LimitSettings { window_secs: 60, max_requests: 20 });
        assert_eq!(config.upload_limit.max_requests, 3);
        assert_eq!(config.upload_limit.window_secs, 3600);
        assert_eq!(config.cache_reconnect_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.rate_limit_sweep_interval(), None);
    }

    #[test]
    fn malformed_numbers_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("SERVER_PORT", "eighty"),
            ("AUTH_RATE_LIMIT_REQUESTS", "-1"),
            ("REDIS_URL", "   "),
        ]))
        .unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.auth_limit.max_requests, 5);
        assert!(config.redis_url.is_none());
    }
}
