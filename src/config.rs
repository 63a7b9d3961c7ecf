//! Crate configuration.
//!
//! Priority: env var > TOML (`faultline.toml`) > built-in default — the same
//! layering the CLI flags sit on top of via `clap`'s `env` support.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_BASE_URL: &str = "http://localhost:3000/";
const DEFAULT_APP_ID: &str = "placeholder";
const DEFAULT_BUNDLE_DIR: &str = "dist/public";
pub const DEFAULT_PORT: u16 = 9000;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_app_id() -> String {
    DEFAULT_APP_ID.to_string()
}

fn default_bundle_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BUNDLE_DIR)
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".faultline")
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Everything the reporter and the bundle server need to run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Backend base URL; `auth/app` and `logs` are appended to it
    /// (default: http://localhost:3000/).
    pub base_url: String,
    /// Application id presented in the auth handshake (default: "placeholder").
    pub app_id: String,
    /// User-agent string used for report enrichment. None = no descriptor
    /// source; enrichment then fails with the capability error and the
    /// error is dropped.
    pub user_agent: Option<String>,
    /// Directory holding the persistent error cache (default: ./.faultline).
    pub data_dir: PathBuf,
    /// Directory the bundle server serves (default: dist/public).
    pub bundle_dir: PathBuf,
    /// Bundle server port (default: 9000).
    pub port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: default_app_id(),
            user_agent: None,
            data_dir: default_data_dir(),
            bundle_dir: default_bundle_dir(),
            port: default_port(),
        }
    }
}

impl TelemetryConfig {
    /// Load `faultline.toml` from the data dir if present, then apply env
    /// overrides. A malformed file is logged and ignored rather than fatal.
    pub fn load(data_dir: Option<PathBuf>) -> Self {
        let mut config = Self {
            data_dir: data_dir.unwrap_or_else(default_data_dir),
            ..Self::default()
        };

        let path = config.data_dir.join("faultline.toml");
        if let Ok(text) = std::fs::read_to_string(&path) {
            match toml::from_str::<TelemetryConfig>(&text) {
                Ok(mut from_file) => {
                    from_file.data_dir = config.data_dir.clone();
                    config = from_file;
                }
                Err(e) => warn!(path = %path.display(), err = %e, "config file ignored"),
            }
        }

        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("FAULTLINE_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(id) = std::env::var("FAULTLINE_APP_ID") {
            self.app_id = id;
        }
        if let Ok(ua) = std::env::var("FAULTLINE_USER_AGENT") {
            self.user_agent = Some(ua);
        }
        if let Ok(port) = std::env::var("FAULTLINE_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => warn!(value = %port, "FAULTLINE_PORT is not a port number — ignored"),
            }
        }
    }

    /// `<base>/auth/app`
    pub fn auth_url(&self) -> String {
        format!("{}auth/app", self.base_with_slash())
    }

    /// `<base>/logs`
    pub fn logs_url(&self) -> String {
        format!("{}logs", self.base_with_slash())
    }

    /// Path of the persistent cache file.
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache.json")
    }

    fn base_with_slash(&self) -> String {
        if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        }
    }
}
