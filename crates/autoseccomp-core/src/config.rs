//! Settings from `config.toml` and `AUTOSECCOMP_*` environment variables.
//!
//! Lookup order for the file: an explicit path, then
//! `$XDG_CONFIG_HOME/autoseccomp/config.toml`,
//! `$HOME/.config/autoseccomp/config.toml`, `/etc/autoseccomp/config.toml`.
//! The first file that exists is used. Environment variables are applied on top.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProfileError, Result};

pub const ENV_VALIDATE_CMD: &str = "AUTOSECCOMP_VALIDATE_CMD";
pub const ENV_TRACER: &str = "AUTOSECCOMP_TRACER";
pub const ENV_RUNTIME: &str = "AUTOSECCOMP_RUNTIME";
pub const ENV_IMAGE: &str = "AUTOSECCOMP_IMAGE";
pub const ENV_AUTHOR: &str = "AUTOSECCOMP_AUTHOR";
pub const ENV_BANNER: &str = "AUTOSECCOMP_BANNER";

/// Trace capture settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TraceSettings {
    /// Tracer executable.
    pub tracer: String,
    /// Flags passed before `-o <log>`; follow children, quiet attach/exit noise.
    pub flags: Vec<String>,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            tracer: "strace".to_string(),
            flags: vec!["-f".to_string(), "-qq".to_string()],
        }
    }
}

/// Validation run settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidateSettings {
    /// Container runtime executable.
    pub runtime: String,
    /// Minimal image the workload is re-run in.
    pub image: String,
    /// Shell command run instead of the traced command.
    pub command: Option<String>,
    /// 0 waits indefinitely.
    pub timeout_secs: u64,
}

impl Default for ValidateSettings {
    fn default() -> Self {
        Self {
            runtime: "docker".to_string(),
            image: "busybox".to_string(),
            command: None,
            timeout_secs: 0,
        }
    }
}

/// Version header printed by `trace-run` and `doctor`. Never affects the profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    pub author: Option<String>,
    pub banner: bool,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            author: None,
            banner: true,
        }
    }
}

/// All settings, with defaults for anything unspecified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub trace: TraceSettings,
    pub validate: ValidateSettings,
    pub ui: UiSettings,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| ProfileError::Config {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Read settings from a file that must exist and parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ProfileError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text, path)
    }

    /// Load settings for this process.
    ///
    /// An explicit path must exist and parse. Discovered files that fail to
    /// parse are skipped with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = utf8_env(std::env::vars_os());
        let mut settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => Self::discover(&default_candidates(&env)),
        };
        settings.apply_env(&env);
        Ok(settings)
    }

    /// First candidate that exists and parses, else defaults.
    pub fn discover(candidates: &[PathBuf]) -> Self {
        for path in candidates {
            if !path.is_file() {
                continue;
            }
            match Self::from_file(path) {
                Ok(settings) => {
                    debug!(path = %path.display(), "loaded settings");
                    return settings;
                }
                Err(e) => warn!(error = %e, "ignoring unreadable settings file"),
            }
        }
        Self::default()
    }

    /// Overlay `AUTOSECCOMP_*` variables. Empty values are ignored.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) {
        let get = |key: &str| {
            env.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if let Some(cmd) = get(ENV_VALIDATE_CMD) {
            self.validate.command = Some(cmd);
        }
        if let Some(tracer) = get(ENV_TRACER) {
            self.trace.tracer = tracer;
        }
        if let Some(runtime) = get(ENV_RUNTIME) {
            self.validate.runtime = runtime;
        }
        if let Some(image) = get(ENV_IMAGE) {
            self.validate.image = image;
        }
        if let Some(author) = get(ENV_AUTHOR) {
            self.ui.author = Some(author);
        }
        if let Some(banner) = get(ENV_BANNER) {
            self.ui.banner = !matches!(
                banner.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
    }
}

/// Environment pairs whose key and value are both valid UTF-8; others are dropped.
pub fn utf8_env<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// Config file locations derived from the given environment, highest priority first.
pub fn default_candidates(env: &HashMap<String, String>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let home = env.get("HOME").filter(|h| !h.is_empty()).map(PathBuf::from);

    if let Some(xdg) = env.get("XDG_CONFIG_HOME").filter(|x| !x.is_empty()) {
        candidates.push(PathBuf::from(xdg).join("autoseccomp").join("config.toml"));
    }
    if let Some(home) = &home {
        let path = home.join(".config").join("autoseccomp").join("config.toml");
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    }
    candidates.push(PathBuf::from("/etc/autoseccomp/config.toml"));
    candidates
}
