//! Configuration loader: merges .env, config.toml and environment variables.

use common::config::DashboardConfig;
use common::Error;
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_bool(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered != "0" && lowered != "false" && lowered != "no" && lowered != "off"
}

fn validate_config(config: &DashboardConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    let url = config.api_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        issues.push("api_url must start with http:// or https://".into());
    }
    if config.store_dir.trim().is_empty() {
        issues.push("store_dir must not be empty".into());
    }

    if config.retry.max_attempts == 0 {
        issues.push("retry.max_attempts must be > 0".into());
    }
    if !config.retry.backoff_factor.is_finite() || config.retry.backoff_factor < 1.0 {
        issues.push("retry.backoff_factor must be >= 1.0".into());
    }

    if config.cache.default_ttl_ms == 0 {
        issues.push("cache.default_ttl_ms must be > 0".into());
    }
    if config.cache.forecast_ttl_ms == 0 {
        issues.push("cache.forecast_ttl_ms must be > 0".into());
    }

    if config.timeouts.request_secs == 0 {
        issues.push("timeouts.request_secs must be > 0".into());
    }
    if config.timeouts.forecast_secs == 0 {
        issues.push("timeouts.forecast_secs must be > 0".into());
    }
    if config.timeouts.upload_secs == 0 {
        issues.push("timeouts.upload_secs must be > 0".into());
    }

    let p = config.forecast.max_perturbation;
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        issues.push("forecast.max_perturbation must be in [0,1]".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply `SUPPLY_DASH_*` overrides read through `var`.
fn apply_env_overrides(
    config: &mut DashboardConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(url) = var("SUPPLY_DASH_API_URL") {
        config.api_url = url.trim().trim_end_matches('/').to_string();
    }
    if let Some(dir) = var("SUPPLY_DASH_STORE_DIR") {
        config.store_dir = dir.trim().to_string();
    }
    if let Some(raw) = var("SUPPLY_DASH_MAX_ATTEMPTS") {
        let parsed = parse_positive_u64(&raw, "SUPPLY_DASH_MAX_ATTEMPTS")?;
        config.retry.max_attempts = u32::try_from(parsed).map_err(|_| {
            Error::Config("SUPPLY_DASH_MAX_ATTEMPTS is out of range".into())
        })?;
    }
    if let Some(raw) = var("SUPPLY_DASH_INITIAL_DELAY_MS") {
        config.retry.initial_delay_ms = parse_positive_u64(&raw, "SUPPLY_DASH_INITIAL_DELAY_MS")?;
    }
    if let Some(raw) = var("SUPPLY_DASH_CACHE_TTL_MS") {
        config.cache.default_ttl_ms = parse_positive_u64(&raw, "SUPPLY_DASH_CACHE_TTL_MS")?;
    }
    if let Some(raw) = var("SUPPLY_DASH_FORECAST_TTL_MS") {
        config.cache.forecast_ttl_ms = parse_positive_u64(&raw, "SUPPLY_DASH_FORECAST_TTL_MS")?;
    }
    if let Some(raw) = var("SUPPLY_DASH_PERTURB_FORECAST") {
        config.forecast.perturb_duplicate_series = parse_bool(&raw);
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<DashboardConfig, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load client configuration from environment and optional config file.
pub fn load_config(config_path: &Path) -> Result<DashboardConfig, Error> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let mut config = if config_path.exists() {
        read_config_file(config_path)?
    } else {
        DashboardConfig::default()
    };

    // Environment wins over the file.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;
    Ok(config)
}
