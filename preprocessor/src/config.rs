//! `metapp.toml` parsing
//!
//! ```toml
//! [meta]
//! exe = "build/meta_evaluator"
//! timeout-secs = 30
//!
//! [output]
//! dir = "generated"
//! include-line = "#include <meta.hpp>"
//! reflection = true
//! entry-extensions = ["cpp", "cc"]
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INCLUDE_LINE: &str = "#include <meta.hpp>";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const CONFIG_FILE_NAME: &str = "metapp.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub meta: MetaConfig,
    pub output: OutputConfig,
}

/// `[meta]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MetaConfig {
    /// Compiled meta evaluator; meta-classes stay plain text without one
    pub exe: Option<PathBuf>,
    /// Seconds to wait for each evaluator reply line
    pub timeout_secs: u64,
}

impl Default for MetaConfig {
    fn default() -> Self {
        MetaConfig {
            exe: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl MetaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Output root; relative input paths are mirrored below it
    pub dir: Option<PathBuf>,
    /// Line prepended to every transformed file
    pub include_line: String,
    /// Generate `reflect::Reflect` specializations
    pub reflection: bool,
    /// Extensions of entry-point sources, which receive the dispatch `main`
    pub entry_extensions: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: None,
            include_line: DEFAULT_INCLUDE_LINE.to_string(),
            reflection: false,
            entry_extensions: ["cpp", "cc", "cxx", "c++"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl OutputConfig {
    pub fn is_entry_point(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.entry_extensions
                    .iter()
                    .any(|entry| entry.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl TransformConfig {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// `metapp.toml` in `dir` if present, defaults otherwise
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}
