use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub license_env: String,
    pub license_path: PathBuf,
    pub refresh_interval: Duration,
    pub license_required: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_addr = var("DDUI_BIND", "0.0.0.0:3000");
        let license_env = var("DDUI_LICENSE_ENV", "DDUI_LICENSE");
        let license_path = PathBuf::from(var("DDUI_LICENSE_PATH", "/run/secrets/ddui_license"));
        let refresh_interval = parse_interval(&var("DDUI_LICENSE_REFRESH_INTERVAL", "1h"))
            .context("DDUI_LICENSE_REFRESH_INTERVAL")?;
        let license_required =
            parse_bool(&var("DDUI_LICENSE_REQUIRED", "false")).context("DDUI_LICENSE_REQUIRED")?;

        Ok(Self {
            bind_addr,
            license_env,
            license_path,
            refresh_interval,
            license_required,
        })
    }

    /// The configured license key: the env var named by `license_env`, else
    /// the contents of `license_path`. Blank values count as absent.
    pub fn license_key(&self) -> Option<String> {
        let from_env = std::env::var(&self.license_env).ok();
        let key = from_env.or_else(|| std::fs::read_to_string(&self.license_path).ok())?;
        let key = key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}

/// `"30s"`, `"10m"`, `"1h"`, `"7d"`, or bare seconds. Zero is rejected.
pub fn parse_interval(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let n: u64 = digits
        .parse()
        .map_err(|_| anyhow!("invalid interval '{raw}'"))?;
    let secs = match unit.trim() {
        "" | "s" => n,
        "m" => n.saturating_mul(60),
        "h" => n.saturating_mul(60 * 60),
        "d" => n.saturating_mul(24 * 60 * 60),
        other => return Err(anyhow!("unknown interval unit '{other}' in '{raw}'")),
    };
    if secs == 0 {
        return Err(anyhow!("interval must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000");
        assert_eq!(cfg.license_env, "DDUI_LICENSE");
        assert_eq!(cfg.refresh_interval, Duration::from_secs(3600));
        assert!(!cfg.license_required);
    }

    #[test]
    fn overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("DDUI_BIND", "127.0.0.1:8080"),
            ("DDUI_LICENSE_REFRESH_INTERVAL", "10m"),
            ("DDUI_LICENSE_REQUIRED", "yes"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.refresh_interval, Duration::from_secs(600));
        assert!(cfg.license_required);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AppConfig::from_lookup(lookup(&[("DDUI_LICENSE_REFRESH_INTERVAL", "0s")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("DDUI_LICENSE_REQUIRED", "maybe")])).is_err());
    }

    #[test]
    fn interval_units() {
        assert_eq!(parse_interval("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_interval("1d").unwrap(), Duration::from_secs(86_400));
        assert!(parse_interval("h").is_err());
        assert!(parse_interval("5w").is_err());
    }

    #[test]
    fn license_key_falls_back_to_file() {
        let path = std::env::temp_dir().join(format!("ddui-license-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, "  abc123\n").unwrap();
        let cfg = AppConfig {
            license_env: format!("DDUI_TEST_UNSET_{}", uuid::Uuid::new_v4().simple()),
            license_path: path.clone(),
            ..AppConfig::from_lookup(lookup(&[])).unwrap()
        };
        assert_eq!(cfg.license_key().as_deref(), Some("abc123"));

        std::fs::write(&path, "\n").unwrap();
        assert_eq!(cfg.license_key(), None);
        std::fs::remove_file(&path).unwrap();
    }
}
