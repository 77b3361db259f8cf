//! Client configuration, read from `POLICLINICO_*` environment variables.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use policlinico_auth::Role;
use policlinico_observability::LogFormat;
use reqwest::Url;
use thiserror::Error;

use crate::storage::FileStore;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_LOGIN_LOCATION: &str = "/login";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REFRESH_LEAD_SECS: u64 = 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {message}")]
    Invalid { var: &'static str, message: String },

    #[error("cannot determine a state directory; set POLICLINICO_STATE_DIR")]
    NoStateDir,
}

/// Where the client sends users: the login page and one dashboard per role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    pub login: String,
    pub dashboards: BTreeMap<Role, String>,
}

impl Default for Locations {
    fn default() -> Self {
        let dashboards = Role::ALL
            .into_iter()
            .map(|role| (role, format!("/dashboard/{}", role.as_str())))
            .collect();
        Self {
            login: DEFAULT_LOGIN_LOCATION.to_string(),
            dashboards,
        }
    }
}

impl Locations {
    pub fn dashboard_for(&self, role: Role) -> Option<&str> {
        self.dashboards.get(&role).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the clinic API, without trailing slash.
    pub api_url: String,
    /// Directory holding the persisted session.
    pub state_dir: PathBuf,
    pub locations: Locations,
    /// Transport timeout applied by the HTTP client.
    pub request_timeout: Duration,
    /// How long before token expiry the refresh fires.
    pub refresh_lead: Duration,
    pub log_format: LogFormat,
    /// Optional JSON file replacing the built-in menu.
    pub menu_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = parse_api_url(var("POLICLINICO_API_URL").as_deref().unwrap_or(DEFAULT_API_URL))?;

        let state_dir = match var("POLICLINICO_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => FileStore::default_dir().ok_or(ConfigError::NoStateDir)?,
        };

        let mut locations = Locations::default();
        if let Some(login) = var("POLICLINICO_LOGIN_LOCATION") {
            locations.login = login;
        }
        for role in Role::ALL {
            let name = format!("POLICLINICO_DASHBOARD_{}", role.as_str().to_ascii_uppercase());
            if let Some(location) = var(&name) {
                locations.dashboards.insert(role, location);
            }
        }

        let request_timeout = Duration::from_secs(parse_secs(
            "POLICLINICO_REQUEST_TIMEOUT_SECS",
            var("POLICLINICO_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let refresh_lead = Duration::from_secs(parse_secs(
            "POLICLINICO_REFRESH_LEAD_SECS",
            var("POLICLINICO_REFRESH_LEAD_SECS"),
            DEFAULT_REFRESH_LEAD_SECS,
        )?);

        let log_format = match var("POLICLINICO_LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(|e: policlinico_observability::UnknownLogFormat| {
                ConfigError::Invalid {
                    var: "POLICLINICO_LOG_FORMAT",
                    message: e.to_string(),
                }
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            api_url,
            state_dir,
            locations,
            request_timeout,
            refresh_lead,
            log_format,
            menu_path: var("POLICLINICO_MENU_PATH").map(PathBuf::from),
        })
    }
}

fn parse_api_url(raw: &str) -> Result<String, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        var: "POLICLINICO_API_URL",
        message,
    };

    let parsed = Url::parse(raw).map_err(|e| invalid(format!("'{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(invalid(format!(
                "expected an 'http' or 'https' URL, not '{other}'"
            )));
        }
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn parse_secs(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
            var,
            message: format!("'{raw}': {e}"),
        }),
    }
}
