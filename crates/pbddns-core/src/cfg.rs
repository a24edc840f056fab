//! Resolve `pbddns.toml`, `PBDDNS_*` environment variables and CLI flags into
//! one validated `AppConfig`

use crate::engine::DEFAULT_TTL;
use crate::error::ConfigError;
use anyhow::Result;
use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, File};
use serde::Deserialize;
use std::{env, path::Path, time::Duration};
use validator::Validate;

/*──────── Porkbun ────────*/
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PorkbunCfg {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_api_key: String,
    /// API root, e.g. `https://porkbun.com/api/json/v3`
    #[serde(default = "default_endpoint")]
    #[validate(url)]
    pub endpoint: String,
    /// per-request timeout in seconds
    #[serde(default = "default_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    /// TTL of the managed A record; Porkbun refuses anything below 600
    #[serde(default = "default_ttl")]
    #[validate(range(min = 600))]
    pub ttl: u32,
}

/*──────── Target ────────*/
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TargetCfg {
    #[serde(default)]
    pub domain: String,
    /// empty → manage the bare domain
    #[serde(default)]
    pub subdomain: String,
}

/*──────── Detect ────────*/
/// Where the current address comes from; fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum AddressSource {
    #[default]
    #[serde(rename = "public")]
    Public,
    #[serde(rename = "local", alias = "interface")]
    LocalInterface,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DetectCfg {
    #[serde(default)]
    pub source: AddressSource,
    /// plain-text address echo endpoint (public source only)
    #[serde(default = "default_echo_url")]
    #[validate(url)]
    pub url: String,
    #[serde(default = "default_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

/*──────── Scheduler ────────*/
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SchedulerCfg {
    /// address-only re-check
    #[serde(default = "default_fast")]
    #[validate(range(min = 1))]
    pub fast_interval_secs: u64,
    /// full re-validation against the provider
    #[serde(default = "default_slow")]
    #[validate(range(min = 1))]
    pub slow_interval_secs: u64,
}

impl SchedulerCfg {
    pub fn fast(&self) -> Duration {
        Duration::from_secs(self.fast_interval_secs)
    }
    pub fn slow(&self) -> Duration {
        Duration::from_secs(self.slow_interval_secs)
    }
}

fn default_endpoint() -> String {
    "https://porkbun.com/api/json/v3".to_string()
}
fn default_echo_url() -> String {
    "https://api.ipify.org".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_ttl() -> u32 {
    DEFAULT_TTL
}
fn default_fast() -> u64 {
    60
}
fn default_slow() -> u64 {
    10 * 60
}

impl Default for PorkbunCfg {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_api_key: String::new(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
            ttl: default_ttl(),
        }
    }
}

impl Default for DetectCfg {
    fn default() -> Self {
        Self {
            source: AddressSource::default(),
            url: default_echo_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            fast_interval_secs: default_fast(),
            slow_interval_secs: default_slow(),
        }
    }
}

/*──────── AppConfig ────────*/
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub porkbun: PorkbunCfg,
    #[serde(default)]
    pub target: TargetCfg,
    #[serde(default)]
    pub detect: DetectCfg,
    #[serde(default)]
    pub scheduler: SchedulerCfg,
}

impl AppConfig {
    /// Required values first (one message per missing value), then field
    /// constraints.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.porkbun.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("No API key specified"));
        }
        if self.porkbun.secret_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("No API secret specified"));
        }
        if self.target.domain.trim().is_empty() {
            return Err(ConfigError::Missing("No domain specified"));
        }
        self.porkbun.validate()?;
        self.detect.validate()?;
        self.scheduler.validate()?;
        let (fast, slow) = (
            self.scheduler.fast_interval_secs,
            self.scheduler.slow_interval_secs,
        );
        if fast > slow {
            return Err(ConfigError::Intervals { fast, slow });
        }
        Ok(())
    }
}

/// Values given on the command line (or their dedicated env vars); these
/// win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub domain: Option<String>,
    pub subdomain: Option<String>,
    /// `--local`; only ever switches the source on
    pub local: bool,
    /// Generic `DOMAIN`; used only when no other source names a domain
    pub fallback_domain: Option<String>,
}

/// Convert a raw environment value into a `toml::Value`.
///
/// * `"true"` / `"false"`  → `Boolean`
/// * valid integer         → `Integer` (`i64`)
/// * everything else       → `String`
fn parse_val(raw: &str) -> toml::Value {
    let lower = raw.to_ascii_lowercase();
    if lower == "true" || lower == "false" {
        toml::Value::Boolean(lower == "true")
    } else if let Ok(i) = raw.parse::<i64>() {
        toml::Value::Integer(i)
    } else {
        toml::Value::String(raw.to_owned())
    }
}

/// Map `PBDDNS_<SECTION>_<FIELD>` to `section.field`, e.g.
/// `PBDDNS_SCHEDULER_FAST_INTERVAL_SECS` → `scheduler.fast_interval_secs`.
/// Variables without a section part (`PBDDNS_CONFIG`) are not config keys.
fn env_key(key: &str) -> Option<String> {
    let (section, field) = key.split_once('_')?;
    if section.is_empty() || field.is_empty() {
        return None;
    }
    Some(format!(
        "{}.{}",
        section.to_ascii_lowercase(),
        field.to_ascii_lowercase()
    ))
}

/// Inject scalar environment variables into a `ConfigBuilder`.
fn add_scalar_env<I>(
    mut b: ConfigBuilder<DefaultState>,
    prefix: &str,
    vars: I,
) -> Result<ConfigBuilder<DefaultState>>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (k, v) in vars {
        let Some(path) = k.strip_prefix(prefix).and_then(env_key) else {
            continue;
        };
        match parse_val(&v) {
            toml::Value::Boolean(bv) => b = b.set_override(path, bv)?,
            toml::Value::Integer(iv) => b = b.set_override(path, iv)?,
            other => b = b.set_override(path, other.as_str().unwrap_or(&v).to_owned())?,
        }
    }
    Ok(b)
}

fn add_overrides(
    mut b: ConfigBuilder<DefaultState>,
    o: &Overrides,
) -> Result<ConfigBuilder<DefaultState>> {
    let pairs = [
        ("porkbun.api_key", &o.api_key),
        ("porkbun.secret_api_key", &o.api_secret),
        ("target.domain", &o.domain),
        ("target.subdomain", &o.subdomain),
    ];
    for (path, val) in pairs {
        if let Some(v) = val.as_deref().filter(|v| !v.is_empty()) {
            b = b.set_override(path, v)?;
        }
    }
    if o.local {
        b = b.set_override("detect.source", "local")?;
    }
    Ok(b)
}

/// Load configuration from an optional TOML file, the environment and the
/// command line, then validate it.
///
/// Priority (high → low):
/// 1. Command-line values ([`Overrides`])
/// 2. Environment scalars (`PBDDNS_TARGET_DOMAIN`, …)
/// 3. Values in `pbddns.toml` (if the file exists)
pub fn load_config(path: &str, overrides: &Overrides) -> Result<AppConfig> {
    let cfg = build_config(path, env::vars(), overrides)?;
    cfg.check()?;
    Ok(cfg)
}

fn build_config<I>(path: &str, vars: I, overrides: &Overrides) -> Result<AppConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut builder = Config::builder();
    if let Some(d) = overrides.fallback_domain.as_deref().filter(|d| !d.is_empty()) {
        builder = builder.set_default("target.domain", d)?;
    }
    if Path::new(path).exists() {
        builder = builder.add_source(File::with_name(path).required(true));
    } else {
        tracing::info!("config file `{path}` not found; environment-only mode");
    }

    builder = add_scalar_env(builder, "PBDDNS_", vars)?;
    builder = add_overrides(builder, overrides)?;

    Ok(builder.build()?.try_deserialize()?)
}
