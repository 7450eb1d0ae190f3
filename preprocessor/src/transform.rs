//! Whole-file transformation
//!
//! A file is fed to the [`Expander`] line by line. The output is the include
//! line, the reflection prelude when reflection is on, the expanded body, and
//! for entry-point sources the generator dispatch, preceded by includes of the
//! generator headers the source does not include itself.

use indexmap::IndexSet;
use log::{debug, info};
use parser::{drive, FeedEnd, Namespace, ParseFailure};
use std::path::Path;

use crate::config::OutputConfig;
use crate::dispatch::generate_dispatch;
use crate::error::TransformError;
use crate::evaluator::Evaluator;
use crate::expansion::Expander;
use crate::reflection;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    pub include_line: String,
    pub reflection: bool,
    /// Append the generator dispatch `main`
    pub entry_point: bool,
    /// Include paths of headers defining generators, for the dispatch
    pub generator_headers: Vec<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self::from_config(&OutputConfig::default(), Path::new(""))
    }
}

impl TransformOptions {
    pub fn from_config(output: &OutputConfig, path: &Path) -> Self {
        TransformOptions {
            include_line: output.include_line.clone(),
            reflection: output.reflection,
            entry_point: output.is_entry_point(path),
            generator_headers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub text: String,
    pub includes: Vec<String>,
    /// Generators defined in this file
    pub discovered: IndexSet<String>,
    pub global: Namespace,
}

/// Generator headers the file does not already include
fn missing_includes<'a>(headers: &'a [String], includes: &[String]) -> Vec<&'a str> {
    headers
        .iter()
        .filter(|header| {
            !includes
                .iter()
                .any(|include| Path::new(header.as_str()).ends_with(include.as_str()))
        })
        .map(String::as_str)
        .collect()
}

/// Transform one source text
///
/// `generators` is the batch-wide set of discovered generators; this file's
/// generators are added to it before the dispatch is built.
pub fn transform_source(
    source: &str,
    evaluator: Option<&mut dyn Evaluator>,
    options: &TransformOptions,
    generators: &mut IndexSet<String>,
) -> Result<TransformOutput, TransformError> {
    let mut expander = Expander::new(evaluator, options.reflection, source.len());
    let end = drive(source, |window| expander.step(window))?;
    let expanded = match end {
        FeedEnd::Complete { trailing } => expander.finish(trailing)?,
        FeedEnd::Stalled { offset, residual } => {
            let scope = expander.current_kind();
            return Err(ParseFailure::structural(offset, residual, scope).into());
        }
    };
    generators.extend(expanded.discovered.iter().cloned());

    let mut text = String::with_capacity(source.len() + options.include_line.len() + 1);
    text.push_str(&options.include_line);
    text.push('\n');
    if options.reflection {
        text.push_str(reflection::PRELUDE);
        text.push('\n');
        text.push_str(&reflection::rewrite_reflexpr(&expanded.body));
    } else {
        text.push_str(&expanded.body);
    }
    if options.entry_point {
        if generators.is_empty() {
            debug!("no generators discovered, dispatch skipped");
        } else {
            info!("dispatch for {} generator(s)", generators.len());
            if !text.ends_with('\n') {
                text.push('\n');
            }
            for header in missing_includes(&options.generator_headers, &expanded.includes) {
                debug!("dispatch needs {}", header);
                text.push_str(&format!("#include \"{}\"\n", header));
            }
            text.push_str(&generate_dispatch(generators));
        }
    }

    Ok(TransformOutput {
        text,
        includes: expanded.includes,
        discovered: expanded.discovered,
        global: expanded.global,
    })
}
