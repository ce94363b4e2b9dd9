//! Configuration for the uploader.
//!
//! Loaded from a TOML file (`al-uploader.toml` by default). The `[[scripts]]`
//! entries are the save map: which source entry points get compiled and which
//! remote save slot each one is written to. The map is edited directly in the
//! file; CLI flags only select the config path, log level and watch mode.

use crate::error::{Result, UploaderError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub build: BuildConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// The save map: one entry per script to compile and upload.
    pub scripts: Vec<ScriptEntry>,

    /// Canonicalized directory the config file was loaded from; all relative
    /// paths in the config are resolved against it.
    #[serde(skip)]
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Source tree watched for changes
    #[serde(default = "default_src_dir")]
    pub src_dir: PathBuf,

    /// Directory the compiler emits bundles into
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    /// Compiler invocation; `{entry}`, `{output}` and `{name}` are
    /// substituted per script entry
    pub command: Vec<String>,

    /// Output filename template inside `dist_dir`
    #[serde(default = "default_filename")]
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Game API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// File holding the auth token, relative to the config file
    #[serde(default = "default_secret_file")]
    pub secret_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Source poll interval in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Directory/file name patterns skipped while scanning sources
    #[serde(default = "default_excludes")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// One save-map entry: a source file compiled under `name` and saved to the
/// numbered remote slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub entry: PathBuf,
    pub name: String,
    pub slot: u32,
}

// Default values
fn default_src_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_filename() -> String {
    "{name}.js".to_string()
}

fn default_base_url() -> String {
    "https://adventure.land".to_string()
}

fn default_secret_file() -> PathBuf {
    PathBuf::from(".secret")
}

fn default_interval_ms() -> u64 {
    500
}

fn default_excludes() -> Vec<String> {
    vec![
        ".git".to_string(),
        "node_modules".to_string(),
        ".DS_Store".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            secret_file: default_secret_file(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            exclude: default_excludes(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| UploaderError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let mut config: Config = toml::from_str(&content)?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        // The compiler child runs with the root as its working directory, so
        // the root must be absolute or paths rendered from it would resolve
        // against the root a second time.
        config.root = root.canonicalize().map_err(|e| {
            UploaderError::Config(format!("cannot resolve {}: {}", root.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scripts.is_empty() {
            return Err(UploaderError::Config(
                "no [[scripts]] entries configured".to_string(),
            ));
        }
        if self.build.command.is_empty() {
            return Err(UploaderError::Config(
                "build.command must name a compiler to run".to_string(),
            ));
        }
        // Bundle identity is the name; duplicates would alias fingerprint and
        // in-flight table entries.
        let mut seen = HashSet::new();
        for script in &self.scripts {
            if !seen.insert(script.name.as_str()) {
                return Err(UploaderError::Config(format!(
                    "duplicate script name '{}'",
                    script.name
                )));
            }
        }
        if self.scripts.len() > 1 && !self.build.filename.contains("{name}") {
            return Err(UploaderError::Config(
                "build.filename must contain {name} when more than one script is configured"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join(&self.build.src_dir)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.root.join(&self.build.dist_dir)
    }

    pub fn entry_path(&self, script: &ScriptEntry) -> PathBuf {
        self.root.join(&script.entry)
    }

    /// Direct save-map lookup by bundle name.
    pub fn script_for(&self, name: &str) -> Option<&ScriptEntry> {
        self.scripts.iter().find(|s| s.name == name)
    }

    /// Read the auth token from the secret file. Absence is a fatal startup
    /// error; the token is trimmed because a trailing newline would make the
    /// cookie header value invalid.
    pub fn load_secret(&self) -> Result<String> {
        let path = self.root.join(&self.api.secret_file);
        if !path.exists() {
            return Err(UploaderError::Secret(format!(
                "you need to create {} with your auth token",
                path.display()
            )));
        }
        let raw = std::fs::read_to_string(&path)?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(UploaderError::Secret(format!(
                "{} is empty",
                path.display()
            )));
        }
        Ok(token.to_string())
    }
}
