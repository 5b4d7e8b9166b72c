//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration lives in a small TOML file per module; the
//! database and its reference data live in the root folder. Root folder
//! resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `CICERO_ROOT_FOLDER` environment variable
//! 3. `root_folder` key of the module's TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: it is logged and the
//! compiled defaults apply.

use crate::types::{CountryCode, InstitutionKind, Language, ProtocolKind};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CICERO_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "cicero.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Defaults for extraction requests that don't name every field
    #[serde(default)]
    pub extraction: ExtractionDefaults,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Extraction request defaults
///
/// Country and institution are optional: when unset, the extraction
/// service derives them from the protocol's institution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionDefaults {
    #[serde(default)]
    pub country: Option<CountryCode>,

    #[serde(default)]
    pub institution: Option<InstitutionKind>,

    #[serde(default = "default_language")]
    pub language: Language,

    /// Falls back to the protocol's own kind when unset
    #[serde(default)]
    pub protocol_kind: Option<ProtocolKind>,

    /// Treat a protocol without any speaker marker as success (empty list)
    #[serde(default = "default_allow_empty")]
    pub allow_empty: bool,

    /// Concurrent protocol runs for batch extraction
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            country: None,
            institution: None,
            language: default_language(),
            protocol_kind: None,
            allow_empty: default_allow_empty(),
            workers: default_workers(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language() -> Language {
    Language::German
}

fn default_allow_empty() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\cicero
        dirs::data_local_dir()
            .map(|d| d.join("cicero"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cicero"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/cicero
        dirs::data_dir()
            .map(|d| d.join("cicero"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cicero"))
    } else {
        // ~/.local/share/cicero
        dirs::data_local_dir()
            .map(|d| d.join("cicero"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/cicero"))
    }
}

/// Resolves the root folder for one module
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Set the command-line override (highest priority)
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!("Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(root) = self.load_toml().and_then(|config| config.root_folder) {
            debug!("Root folder from config file: {}", root.display());
            return root;
        }

        CompiledDefaults::for_current_platform().root_folder
    }

    /// Load the module's TOML config, or `None` when absent or invalid
    pub fn load_toml(&self) -> Option<TomlConfig> {
        let path = self.config_file_path()?;
        match load_toml_config(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// First existing config file: user config dir, then `/etc/cicero`
    pub fn config_file_path(&self) -> Option<PathBuf> {
        let file_name = format!("{}.toml", self.module_name);

        let user_config = dirs::config_dir().map(|d| d.join("cicero").join(&file_name));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }

        if cfg!(unix) {
            let system_config = PathBuf::from("/etc/cicero").join(&file_name);
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }
}

/// Prepares the resolved root folder
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents) if needed; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder).map_err(|e| {
            Error::Config(format!(
                "Cannot create root folder {}: {}",
                self.root_folder.display(),
                e
            ))
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Write a TOML config file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Cannot serialize config: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;

    Ok(())
}
