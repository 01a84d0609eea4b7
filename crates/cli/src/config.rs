// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client settings.
//!
//! Settings are read from a TOML file located from `--config`, else
//! `$FMTD_CONFIG`, else `<config dir>/fmtd/config.toml`. Every key is
//! optional and a missing file yields the defaults.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fmtd_ipc::Method;
use serde::{Deserialize, Deserializer};

use crate::env;
use crate::error::{Error, Result};

const CONFIG_DIR_NAME: &str = "fmtd";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_PORT: u16 = 9870;
pub const DEFAULT_MAX_SIZE: usize = 10240;

/// Client settings loaded from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Localhost port the daemon listens on.
    pub port: u16,
    pub timeouts: Timeouts,
    /// Basename globs that mark a buffer as ignored without asking the daemon.
    pub file_exclude_patterns: Vec<String>,
    /// Basename glob to parser. The first matching key (in sorted order) wins.
    pub overrides: BTreeMap<String, String>,
    /// Buffers of this many chars or more are not formatted. Negative means
    /// the default.
    pub max_size: i64,
    pub format_on_save: FormatOnSave,
    /// Save again after a format triggered from the pre-save hook.
    pub save_on_format: bool,
    /// Send the caret offset along with format requests.
    pub cursor: bool,
    pub status_level: StatusLevel,
    /// Append logs here instead of stderr.
    pub log_file: Option<PathBuf>,
    pub daemon: DaemonConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            port: DEFAULT_PORT,
            timeouts: Timeouts::default(),
            file_exclude_patterns: Vec::new(),
            overrides: BTreeMap::new(),
            max_size: DEFAULT_MAX_SIZE as i64,
            format_on_save: FormatOnSave::default(),
            save_on_format: false,
            cursor: false,
            status_level: StatusLevel::default(),
            log_file: None,
            daemon: DaemonConfig::default(),
        }
    }
}

/// Per-method socket timeouts in milliseconds. Absent or non-positive values
/// mean the call may block indefinitely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub file_info_ms: Option<i64>,
    pub format_ms: Option<i64>,
    /// `ping`, `clearConfigCache` and `quit`.
    pub control_ms: Option<i64>,
}

impl Timeouts {
    /// Timeout applied to a call of `method`.
    pub fn for_method(&self, method: Method) -> Option<Duration> {
        let ms = match method {
            Method::GetFileInfo => self.file_info_ms,
            Method::Format => self.format_ms,
            Method::Ping | Method::ClearConfigCache | Method::Quit => self.control_ms,
        };
        ms.and_then(|ms| u64::try_from(ms).ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// `format_on_save`: `false`, `true` or `"explicit"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatOnSave {
    #[default]
    Off,
    On,
    /// Only when a prettierrc is found for the file.
    Explicit,
}

impl<'de> Deserialize<'de> for FormatOnSave {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Mode(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(FormatOnSave::On),
            Raw::Flag(false) => Ok(FormatOnSave::Off),
            Raw::Mode(mode) if mode == "explicit" => Ok(FormatOnSave::Explicit),
            Raw::Mode(other) => Err(serde::de::Error::custom(format!(
                "invalid format_on_save '{}': expected true, false or \"explicit\"",
                other
            ))),
        }
    }
}

/// How chatty user notifications are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    /// Errors only.
    #[default]
    Quiet,
    /// Also report readiness and per-format results.
    Verbose,
}

/// How to launch the daemon.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub program: String,
    /// Entry point passed as the first argument, e.g. the daemon's script.
    pub script: Option<PathBuf>,
    /// Extra arguments placed before the port.
    pub args: Vec<String>,
    pub handshake_timeout_ms: u64,
    /// Initial delay between spawn attempts. Doubles after each failure.
    pub respawn_delay_ms: u64,
    pub max_spawn_attempts: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            program: "node".to_string(),
            script: None,
            args: Vec::new(),
            handshake_timeout_ms: 10_000,
            respawn_delay_ms: 3_000,
            max_spawn_attempts: 5,
        }
    }
}

impl DaemonConfig {
    /// Arguments for a daemon that should listen on `port` and watch
    /// `parent_pid`.
    pub fn spawn_args(&self, port: u16, parent_pid: u32) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(script) = &self.script {
            args.push(script.clone().into_os_string());
        }
        args.extend(self.args.iter().map(OsString::from));
        args.push(port.to_string().into());
        args.push(parent_pid.to_string().into());
        args
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn respawn_delay(&self) -> Duration {
        Duration::from_millis(self.respawn_delay_ms)
    }
}

impl Settings {
    /// Load settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse settings from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("failed to parse config: {}", e)))
    }

    /// Resolve the config file and load it, falling back to defaults when no
    /// file exists. Environment overrides are applied last.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut settings = match explicit.map(Path::to_path_buf).or_else(env::config_path) {
            Some(path) => Self::load(&path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::load(&path)?,
                None => Self::default(),
            },
        };
        settings.apply_env();
        Ok(settings)
    }

    /// Apply `FMTD_PORT` and `FMTD_DAEMON_SCRIPT`.
    pub fn apply_env(&mut self) {
        if let Some(port) = env::port() {
            self.port = port;
        }
        if self.daemon.script.is_none() {
            self.daemon.script = env::daemon_script();
        }
    }

    /// Effective size threshold in chars.
    pub fn size_threshold(&self) -> usize {
        usize::try_from(self.max_size)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_SIZE)
    }

    pub fn is_verbose(&self) -> bool {
        self.status_level == StatusLevel::Verbose
    }
}

/// `<config dir>/fmtd/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
