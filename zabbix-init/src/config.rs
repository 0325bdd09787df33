//! Configuration from the process environment
//!
//! Handles:
//! - optional `KEY=value` env file (first one found wins)
//! - Zabbix URL, credentials and auth mode
//! - target host, agent interface, group and templates
//! - wait/timeout tuning and the dashboard switch
//!
//! `Settings` is built once at startup and passed around by reference.

use crate::error::{Result, ZabbixError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Env files searched, in order, in the working directory and then next to the executable
pub const ENV_FILE_NAMES: [&str; 2] = ["zabbix-init-config.local.env", "zabbix-init-config.env"];

/// Explicit env file path, checked before the standard names
pub const ENV_FILE_VAR: &str = "ZABBIX_INIT_ENV_FILE";

pub const DEFAULT_DASHBOARD_NAME: &str = "Главный экран";

/// How the session token travels with each request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Pick from the server version (header from 6.4 on)
    Auto,
    /// `Authorization: Bearer <token>`
    Header,
    /// `auth` member of the JSON-RPC envelope
    Field,
}

impl FromStr for AuthMode {
    type Err = ZabbixError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "header" | "bearer" => Ok(Self::Header),
            "field" | "auth" => Ok(Self::Field),
            other => Err(ZabbixError::Config(format!(
                "ZABBIX_AUTH_MODE must be auto, header or field (got '{other}')"
            ))),
        }
    }
}

/// Agent interface declared on a newly created host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInterface {
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSettings {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSettings {
    pub name: String,
}

#[derive(Clone)]
pub struct Settings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub agent: AgentInterface,
    pub host_group: String,
    pub templates: Vec<String>,
    pub auth_mode: AuthMode,
    /// Accept self-signed certificates. On by default: the target servers are
    /// internal installations without a trusted chain.
    pub allow_insecure_tls: bool,
    pub request_timeout: Duration,
    pub wait: WaitSettings,
    /// `None` disables dashboard reconciliation
    pub dashboard: Option<DashboardSettings>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("hostname", &self.hostname)
            .field("agent", &self.agent)
            .field("host_group", &self.host_group)
            .field("templates", &self.templates)
            .field("auth_mode", &self.auth_mode)
            .field("allow_insecure_tls", &self.allow_insecure_tls)
            .field("request_timeout", &self.request_timeout)
            .field("wait", &self.wait)
            .field("dashboard", &self.dashboard)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080".to_string(),
            username: "Admin".to_string(),
            password: "zabbix".to_string(),
            hostname: "Visiology-Server".to_string(),
            agent: AgentInterface {
                ip: "127.0.0.1".to_string(),
                port: 10050,
            },
            host_group: "Visiology".to_string(),
            templates: vec![
                "Linux by Zabbix agent 2".to_string(),
                "Docker by Zabbix agent 2".to_string(),
            ],
            auth_mode: AuthMode::Auto,
            allow_insecure_tls: true,
            request_timeout: Duration::from_secs(30),
            wait: WaitSettings {
                max_wait: Duration::from_secs(120),
                poll_interval: Duration::from_secs(5),
            },
            dashboard: Some(DashboardSettings {
                name: DEFAULT_DASHBOARD_NAME.to_string(),
            }),
        }
    }
}

impl Settings {
    /// Build settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let url = match get("ZABBIX_URL") {
            Some(url) if url.is_empty() => {
                return Err(ZabbixError::Config(
                    "ZABBIX_URL is empty; set it (see zabbix-init-config.env)".into(),
                ))
            }
            Some(url) => url.trim_end_matches('/').to_string(),
            None => defaults.url,
        };

        let templates: Vec<String> = [
            get("ZABBIX_TEMPLATE_LINUX").unwrap_or_else(|| defaults.templates[0].clone()),
            get("ZABBIX_TEMPLATE_DOCKER").unwrap_or_else(|| defaults.templates[1].clone()),
        ]
        .into_iter()
        .filter(|name| !name.is_empty())
        .collect();

        let dashboard_enabled = parse_or(
            "ZABBIX_DASHBOARD_ENABLED",
            get("ZABBIX_DASHBOARD_ENABLED"),
            true,
            parse_bool,
        )?;
        let dashboard = if dashboard_enabled {
            Some(DashboardSettings {
                name: get("ZABBIX_DASHBOARD_NAME")
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| DEFAULT_DASHBOARD_NAME.to_string()),
            })
        } else {
            None
        };

        let settings = Self {
            url,
            username: get("ZABBIX_USER").unwrap_or(defaults.username),
            password: lookup("ZABBIX_PASSWORD").unwrap_or(defaults.password),
            hostname: get("ZBX_HOSTNAME").unwrap_or(defaults.hostname),
            agent: AgentInterface {
                ip: get("ZABBIX_AGENT_IP").unwrap_or(defaults.agent.ip),
                port: parse_or(
                    "ZABBIX_AGENT_PORT",
                    get("ZABBIX_AGENT_PORT"),
                    defaults.agent.port,
                    |v| v.parse::<u16>().ok().filter(|p| *p != 0),
                )?,
            },
            host_group: get("ZABBIX_HOST_GROUP").unwrap_or(defaults.host_group),
            templates,
            auth_mode: match get("ZABBIX_AUTH_MODE") {
                Some(mode) => mode.parse()?,
                None => defaults.auth_mode,
            },
            allow_insecure_tls: parse_or(
                "ZABBIX_INSECURE_TLS",
                get("ZABBIX_INSECURE_TLS"),
                defaults.allow_insecure_tls,
                parse_bool,
            )?,
            request_timeout: parse_or(
                "ZABBIX_REQUEST_TIMEOUT_SECS",
                get("ZABBIX_REQUEST_TIMEOUT_SECS"),
                defaults.request_timeout,
                parse_secs,
            )?,
            wait: WaitSettings {
                max_wait: parse_or(
                    "ZABBIX_WAIT_MAX_SECS",
                    get("ZABBIX_WAIT_MAX_SECS"),
                    defaults.wait.max_wait,
                    parse_secs,
                )?,
                poll_interval: parse_or(
                    "ZABBIX_WAIT_STEP_SECS",
                    get("ZABBIX_WAIT_STEP_SECS"),
                    defaults.wait.poll_interval,
                    parse_secs,
                )?,
            },
            dashboard,
        };

        for (key, value) in [
            ("ZABBIX_USER", &settings.username),
            ("ZBX_HOSTNAME", &settings.hostname),
            ("ZABBIX_AGENT_IP", &settings.agent.ip),
            ("ZABBIX_HOST_GROUP", &settings.host_group),
        ] {
            if value.is_empty() {
                return Err(ZabbixError::Config(format!("{key} must not be empty")));
            }
        }

        debug!(?settings, "configuration loaded");
        Ok(settings)
    }

    /// JSON-RPC endpoint derived from the base URL
    pub fn api_endpoint(&self) -> String {
        format!("{}/api_jsonrpc.php", self.url)
    }
}

fn parse_or<T, F>(key: &str, raw: Option<String>, default: T, parse: F) -> Result<T>
where
    F: Fn(&str) -> Option<T>,
{
    match raw {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) => parse(&v)
            .ok_or_else(|| ZabbixError::Config(format!("invalid value for {key}: '{v}'"))),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_secs(v: &str) -> Option<Duration> {
    v.parse::<u64>().ok().filter(|s| *s > 0).map(Duration::from_secs)
}

/// Candidate env files, in search order
pub fn env_file_candidates(
    explicit: Option<PathBuf>,
    cwd: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path);
    }
    for dir in [cwd, exe_dir].into_iter().flatten() {
        for name in ENV_FILE_NAMES {
            let path = dir.join(name);
            if !candidates.contains(&path) {
                candidates.push(path);
            }
        }
    }
    candidates
}

/// First existing file among the candidates
pub fn find_env_file(candidates: &[PathBuf]) -> Option<&Path> {
    candidates.iter().map(PathBuf::as_path).find(|p| p.is_file())
}

/// Env file to load, if any. An explicit path that is not a file is a config error.
pub fn resolve_env_file(
    explicit: Option<PathBuf>,
    cwd: Option<PathBuf>,
    exe_dir: Option<PathBuf>,
) -> Result<Option<PathBuf>> {
    if let Some(path) = &explicit {
        if !path.is_file() {
            return Err(ZabbixError::Config(format!(
                "{ENV_FILE_VAR} points at a missing file: {}",
                path.display()
            )));
        }
    }
    let candidates = env_file_candidates(explicit, cwd, exe_dir);
    Ok(find_env_file(&candidates).map(Path::to_path_buf))
}

/// Load the first env file found into the process environment.
///
/// File values override variables already set. Returns the loaded path.
pub fn load_env_file() -> Result<Option<PathBuf>> {
    let explicit = std::env::var_os(ENV_FILE_VAR)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let cwd = std::env::current_dir().ok();
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    let Some(path) = resolve_env_file(explicit, cwd, exe_dir)? else {
        debug!("no env file found, using process environment only");
        return Ok(None);
    };

    dotenvy::from_path_override(&path)
        .map_err(|e| ZabbixError::Config(format!("cannot read {}: {e}", path.display())))?;
    info!("Loaded configuration from {}", path.display());
    Ok(Some(path))
}
