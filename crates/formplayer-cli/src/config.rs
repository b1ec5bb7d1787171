//! Session settings for the command line, layered from a TOML file, the
//! environment, and flags (later layers win).

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use formplayer_session::SessionConfig;
use formplayer_session::config::DEFAULT_TIMEOUT_SECS;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const XFORM_URL_ENV: &str = "FORMPLAYER_XFORM_URL";
pub const FORM_URL_ENV: &str = "FORMPLAYER_FORM_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("no formplayer server configured (set xform_url, {XFORM_URL_ENV} or --xform-url)")]
    MissingXformUrl,
    #[error("no form configured (set form_url, {FORM_URL_ENV} or --form-url)")]
    MissingFormUrl,
    #[error("invalid {field} '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Every setting is optional until [`FileConfig::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub xform_url: Option<String>,
    pub form_url: Option<String>,
    pub lang: Option<String>,
    pub session_data: Option<Value>,
    pub domain: Option<String>,
    pub username: Option<String>,
    pub restore_as: Option<String>,
    pub timeout_secs: Option<u64>,
    pub error_report_url: Option<String>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub xform_url: Option<String>,
    pub form_url: Option<String>,
    pub lang: Option<String>,
}

/// `<config dir>/formplayer/config.toml` for the current user.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "formplayer", "formplayer")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl FileConfig {
    /// Reads `path`, or the default location when none is given. Only an
    /// explicit path has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read(path),
            None => match default_path() {
                Some(path) if path.is_file() => Self::read(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Applies environment overrides looked up through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(XFORM_URL_ENV) {
            self.xform_url = Some(value);
        }
        if let Some(value) = lookup(FORM_URL_ENV) {
            self.form_url = Some(value);
        }
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if overrides.xform_url.is_some() {
            self.xform_url = overrides.xform_url;
        }
        if overrides.form_url.is_some() {
            self.form_url = overrides.form_url;
        }
        if overrides.lang.is_some() {
            self.lang = overrides.lang;
        }
        self
    }

    pub fn resolve(self) -> Result<SessionConfig, ConfigError> {
        let xform_url = self.xform_url.ok_or(ConfigError::MissingXformUrl)?;
        let xform_url = parse_url("xform_url", xform_url)?;
        let form_url = self.form_url.ok_or(ConfigError::MissingFormUrl)?;
        let error_report_url = self
            .error_report_url
            .map(|value| parse_url("error_report_url", value))
            .transpose()?;

        let mut config = SessionConfig::new(xform_url, form_url);
        config.lang = self.lang;
        config.session_data = self.session_data.unwrap_or(Value::Null);
        config.domain = self.domain;
        config.username = self.username;
        config.restore_as = self.restore_as;
        config.timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        config.error_report_url = error_report_url;
        Ok(config)
    }
}

fn parse_url(field: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value,
        source,
    })
}
