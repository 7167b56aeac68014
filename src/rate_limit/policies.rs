//! Preset limiters for the three endpoint families.

use std::time::Duration;

use super::{RateLimitConfig, SweepMode, key};
use crate::config::{Config, LimitSettings};

pub const AUTH_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const AUTH_MAX_REQUESTS: u32 = 5;
pub const API_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const API_MAX_REQUESTS: u32 = 100;
pub const UPLOAD_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const UPLOAD_MAX_REQUESTS: u32 = 10;

/// Login-style endpoints, keyed by address and submitted identifier.
pub fn auth(settings: LimitSettings) -> RateLimitConfig {
    RateLimitConfig::new("auth", settings.window(), settings.max_requests)
        .key_fn(key::by_address_and_identity())
}

/// General API traffic; only failed responses consume quota.
pub fn api(settings: LimitSettings) -> RateLimitConfig {
    RateLimitConfig::new("api", settings.window(), settings.max_requests).skip_successful()
}

pub fn upload(settings: LimitSettings) -> RateLimitConfig {
    RateLimitConfig::new("upload", settings.window(), settings.max_requests)
}

/// All three presets as configured in the environment.
pub fn from_config(config: &Config) -> [RateLimitConfig; 3] {
    let sweep = config
        .rate_limit_sweep_interval()
        .map_or(SweepMode::EveryRequest, SweepMode::Periodic);
    [
        auth(config.auth_limit).sweep(sweep),
        api(config.api_limit).sweep(sweep),
        upload(config.upload_limit).sweep(sweep),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_endpoint_families() {
        let config = Config::default();
        let [auth, api, upload] = from_config(&config);

        assert_eq!(auth.window, AUTH_WINDOW);
        assert_eq!(auth.max_requests, AUTH_MAX_REQUESTS);
        assert!(auth.count_on_success && auth.count_on_failure);

        assert_eq!(api.window, API_WINDOW);
        assert_eq!(api.max_requests, API_MAX_REQUESTS);
        assert!(!api.count_on_success);
        assert!(api.count_on_failure);

        assert_eq!(upload.window, UPLOAD_WINDOW);
        assert_eq!(upload.max_requests, UPLOAD_MAX_REQUESTS);
        assert_eq!(upload.sweep, SweepMode::EveryRequest);
    }

    #[test]
    fn sweep_interval_switches_to_background_sweeping() {
        let config = Config {
            rate_limit_sweep_secs: Some(60),
            ..Config::default()
        };
        for preset in from_config(&config) {
            assert_eq!(preset.sweep, SweepMode::Periodic(Duration::from_secs(60)));
        }
    }
}
