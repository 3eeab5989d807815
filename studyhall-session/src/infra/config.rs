use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::domains::session::errors::{SessionError, SessionResult};

pub const SERVER_URL_ENV: &str = "STUDYHALL_SERVER_URL";
pub const DATA_DIR_ENV: &str = "STUDYHALL_DATA_DIR";
const CONFIG_FILE: &str = "session.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "studyhall", "studyhall")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub server_url: String,
    /// Where the encrypted store keeps its files. Platform data dir if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// Upper bound on the best-effort remote logout.
    pub logout_timeout_ms: u64,
    /// How long startup waits for the background user refresh.
    pub startup_refresh_grace_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000/api".to_string(),
            data_dir: None,
            request_timeout_secs: 30,
            logout_timeout_ms: 2_000,
            startup_refresh_grace_ms: 10_000,
        }
    }
}

impl SessionConfig {
    /// Defaults, then `<config dir>/studyhall/session.json`, then environment.
    pub fn load() -> Self {
        let mut config = match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Read a config file, falling back to defaults when it is missing or
    /// unreadable.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                debug!(
                    "[SessionConfig] No config at {}: {}",
                    path.display(),
                    e
                );
                return Self::default();
            }
        };

        match serde_json::from_str::<SessionConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "[SessionConfig] Ignoring invalid config {}: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server_url) = lookup(SERVER_URL_ENV)
            && !server_url.trim().is_empty()
        {
            self.server_url = server_url;
        }
        if let Some(data_dir) = lookup(DATA_DIR_ENV)
            && !data_dir.trim().is_empty()
        {
            self.data_dir = Some(PathBuf::from(data_dir));
        }
    }

    pub fn save(&self) -> SessionResult<()> {
        let path = Self::config_path().ok_or_else(|| {
            SessionError::Config("Unable to determine config directory".into())
        })?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> SessionResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SessionError::Config(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SessionError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Directory for the encrypted secure store.
    pub fn data_dir(&self) -> SessionResult<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| {
                SessionError::Config("Unable to determine data directory".into())
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn logout_timeout(&self) -> Duration {
        Duration::from_millis(self.logout_timeout_ms)
    }

    pub fn startup_refresh_grace(&self) -> Duration {
        Duration::from_millis(self.startup_refresh_grace_ms)
    }
}
