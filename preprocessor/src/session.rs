//! Batch transformation over source trees
//!
//! A session owns the evaluator connection and the batch-wide set of
//! discovered generators. Files are transformed independently: a failure is
//! recorded in the report and the batch moves on.

use diagnostics::{ErrorFormatter, SourceMap};
use indexmap::IndexSet;
use log::{error, info, warn};
use serde_json::json;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::TransformConfig;
use crate::error::TransformError;
use crate::evaluator::{Evaluator, MetaClient};
use crate::transform::{transform_source, TransformOptions, TransformOutput};

pub const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx"];
pub const SOURCE_EXTENSIONS: &[&str] = &["cpp", "cc", "cxx", "c++"];

fn extension_in(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// A discovered input and its path relative to the input root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub relative: PathBuf,
}

impl SourceFile {
    pub fn is_header(&self) -> bool {
        extension_in(&self.path, HEADER_EXTENSIONS)
    }
}

/// C++ sources and headers under `inputs`, headers first
///
/// Files named directly are taken whatever their extension; directories are
/// walked for known extensions.
pub fn discover_sources(inputs: &[PathBuf]) -> Vec<SourceFile> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            let relative = input
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| input.clone());
            files.push(SourceFile {
                path: input.clone(),
                relative,
            });
            continue;
        }
        for entry in WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if !entry.file_type().is_file()
                || !(extension_in(path, HEADER_EXTENSIONS) || extension_in(path, SOURCE_EXTENSIONS))
            {
                continue;
            }
            let relative = path.strip_prefix(input).unwrap_or(path).to_path_buf();
            files.push(SourceFile {
                path: path.to_path_buf(),
                relative,
            });
        }
    }
    files.sort_by_key(|file| !file.is_header());
    files
}

#[derive(Debug)]
pub enum FileStatus {
    Transformed {
        output: PathBuf,
        generators: Vec<String>,
    },
    Failed {
        error: TransformError,
        /// Source text when it could be read, for located diagnostics
        source: Option<String>,
    },
}

#[derive(Debug)]
pub struct FileReport {
    pub input: PathBuf,
    pub status: FileStatus,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FileStatus::Transformed { .. })
    }

    /// Diagnostic text for a failed file, located when possible
    pub fn render_failure(&self, formatter: &ErrorFormatter) -> Option<String> {
        let (error, source) = match &self.status {
            FileStatus::Failed { error, source } => (error, source),
            FileStatus::Transformed { .. } => return None,
        };
        let located = source.as_ref().and_then(|source| {
            let mut source_map = SourceMap::new();
            let file_id = source_map.add_file(self.input.display().to_string(), source.clone());
            error
                .to_diagnostic(&source_map, file_id)
                .map(|diagnostic| formatter.format_diagnostic(&diagnostic, &source_map))
        });
        Some(located.unwrap_or_else(|| format!("{}: {}", self.input.display(), error)))
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn render_failures(&self, formatter: &ErrorFormatter) -> String {
        self.files
            .iter()
            .filter_map(|f| f.render_failure(formatter))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_json(&self) -> serde_json::Value {
        let files: Vec<serde_json::Value> = self
            .files
            .iter()
            .map(|file| match &file.status {
                FileStatus::Transformed { output, generators } => json!({
                    "input": file.input.display().to_string(),
                    "status": "ok",
                    "output": output.display().to_string(),
                    "generators": generators,
                }),
                FileStatus::Failed { error, .. } => json!({
                    "input": file.input.display().to_string(),
                    "status": "failed",
                    "error": error.to_string(),
                }),
            })
            .collect();
        json!({
            "succeeded": self.succeeded(),
            "failed": self.failed(),
            "files": files,
        })
    }
}

pub struct Session {
    config: TransformConfig,
    evaluator: Option<Box<dyn Evaluator>>,
    /// Generators discovered so far in the batch
    generators: IndexSet<String>,
    /// Relative paths of headers that define generators
    generator_headers: IndexSet<PathBuf>,
}

/// Path of `target` as written in an `#include` of a file in `from_dir`
///
/// Both paths are relative to the same root.
fn include_path(from_dir: &Path, target: &Path) -> String {
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = target.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut segments: Vec<String> = vec!["..".to_string(); from.len() - common];
    segments.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    segments.join("/")
}

impl Session {
    /// Start the configured evaluator, if any
    pub fn new(config: TransformConfig) -> Result<Self, TransformError> {
        let evaluator: Option<Box<dyn Evaluator>> = match &config.meta.exe {
            Some(exe) => {
                let client = MetaClient::spawn(exe, config.meta.timeout())
                    .map_err(TransformError::Evaluator)?;
                info!(
                    "meta evaluator {} offers {} generator(s)",
                    exe.display(),
                    client.generators().len()
                );
                Some(Box::new(client))
            }
            None => {
                warn!("no meta evaluator configured, meta-classes are left as written");
                None
            }
        };
        Ok(Self::with_evaluator(config, evaluator))
    }

    pub fn with_evaluator(config: TransformConfig, evaluator: Option<Box<dyn Evaluator>>) -> Self {
        Session {
            config,
            evaluator,
            generators: IndexSet::new(),
            generator_headers: IndexSet::new(),
        }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Generator names the evaluator offers
    pub fn known_generators(&self) -> Vec<String> {
        self.evaluator
            .as_ref()
            .map(|e| e.generators().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Generators defined by the files transformed so far
    pub fn discovered_generators(&self) -> &IndexSet<String> {
        &self.generators
    }

    /// Transform `source` as if read from `path`
    pub fn transform_source(
        &mut self,
        path: &Path,
        source: &str,
    ) -> Result<TransformOutput, TransformError> {
        let mut options = TransformOptions::from_config(&self.config.output, path);
        let from_dir = path.parent().unwrap_or(Path::new(""));
        options.generator_headers = self
            .generator_headers
            .iter()
            .filter(|header| header.as_path() != path)
            .map(|header| include_path(from_dir, header))
            .collect();
        let evaluator: Option<&mut dyn Evaluator> = match self.evaluator.as_mut() {
            Some(evaluator) => Some(evaluator.as_mut()),
            None => None,
        };
        let result = transform_source(source, evaluator, &options, &mut self.generators);
        if let Err(TransformError::Protocol { .. }) = &result {
            self.restart_evaluator();
        }
        result
    }

    /// Replace an evaluator abandoned after a failed exchange
    fn restart_evaluator(&mut self) {
        let exe = match &self.config.meta.exe {
            Some(exe) => exe.clone(),
            None => return,
        };
        self.evaluator = None;
        match MetaClient::spawn(&exe, self.config.meta.timeout()) {
            Ok(client) => {
                warn!("restarted meta evaluator {}", exe.display());
                self.evaluator = Some(Box::new(client));
            }
            Err(e) => error!("cannot restart meta evaluator {}: {}", exe.display(), e),
        }
    }

    fn transform_into(
        &mut self,
        file: &SourceFile,
        source: &str,
        out_dir: &Path,
    ) -> Result<FileStatus, TransformError> {
        let output = self.transform_source(&file.relative, source)?;
        if file.is_header() && !output.discovered.is_empty() {
            self.generator_headers.insert(file.relative.clone());
        }
        let target = out_dir.join(&file.relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| TransformError::io(parent, e))?;
        }
        fs::write(&target, &output.text).map_err(|e| TransformError::io(&target, e))?;
        info!("{} -> {}", file.path.display(), target.display());
        Ok(FileStatus::Transformed {
            output: target,
            generators: output.discovered.into_iter().collect(),
        })
    }

    pub fn transform_file(&mut self, file: &SourceFile, out_dir: &Path) -> FileReport {
        let status = match fs::read_to_string(&file.path) {
            Ok(source) => match self.transform_into(file, &source, out_dir) {
                Ok(status) => status,
                Err(error) => FileStatus::Failed {
                    error,
                    source: Some(source),
                },
            },
            Err(e) => FileStatus::Failed {
                error: TransformError::io(&file.path, e),
                source: None,
            },
        };
        if let FileStatus::Failed { error, .. } = &status {
            error!("{}: {}", file.path.display(), error);
        }
        FileReport {
            input: file.path.clone(),
            status,
        }
    }

    pub fn run(&mut self, files: &[SourceFile], out_dir: &Path) -> BatchReport {
        let mut report = BatchReport::default();
        for file in files {
            report.files.push(self.transform_file(file, out_dir));
        }
        info!(
            "{} file(s) transformed, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }
}
