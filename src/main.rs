//! metapp - meta-class and reflection preprocessor for C++
//!
//! # Usage
//!
//! ```bash
//! # Transform a source tree, expanding meta-classes with a compiled evaluator
//! metapp transform src/ -o generated/ --meta-exe build/meta_evaluator
//!
//! # Also generate reflection specializations
//! metapp transform src/ -o generated/ --reflect
//!
//! # Parse a file and print its scope summary
//! metapp check src/shapes.hpp
//!
//! # List the generators an evaluator offers
//! metapp generators --meta-exe build/meta_evaluator
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use diagnostics::{ErrorFormatter, SourceMap};
use log::{debug, info};
use parser::Namespace;
use preprocessor::config::DEFAULT_TIMEOUT_SECS;
use preprocessor::{discover_sources, logging, Evaluator, MetaClient, Session, TransformConfig};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "metapp")]
#[command(version = "0.1.0")]
#[command(about = "Meta-class and reflection preprocessor for C++", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform C++ sources and headers
    Transform {
        /// Files or directories to transform
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output directory (defaults to `generated`)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Compiled meta evaluator
        #[arg(long)]
        meta_exe: Option<PathBuf>,

        /// Generate reflection specializations
        #[arg(long)]
        reflect: bool,

        /// Configuration file (defaults to ./metapp.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the batch report as JSON
        #[arg(long)]
        json: bool,

        /// Increase log verbosity (-v, -vv, -vvv)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    },

    /// Parse a file and print its scope summary
    Check {
        /// Path to the C++ source file
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List the generators a meta evaluator offers
    Generators {
        /// Compiled meta evaluator
        #[arg(long)]
        meta_exe: PathBuf,

        /// Seconds to wait for each reply line
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform {
            paths,
            output,
            meta_exe,
            reflect,
            config,
            json,
            verbose,
        } => {
            logging::init(verbose);
            transform(paths, output, meta_exe, reflect, config, json)
        }
        Commands::Check { file, format } => {
            logging::init(0);
            check_file(&file, format)
        }
        Commands::Generators { meta_exe, timeout } => {
            logging::init(0);
            list_generators(&meta_exe, timeout)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<TransformConfig, String> {
    let config = match path {
        Some(path) => TransformConfig::load(&path),
        None => TransformConfig::discover(Path::new(".")),
    };
    config.map_err(|e| e.to_string())
}

fn transform(
    paths: Vec<PathBuf>,
    output: Option<PathBuf>,
    meta_exe: Option<PathBuf>,
    reflect: bool,
    config: Option<PathBuf>,
    json: bool,
) -> Result<(), String> {
    let mut config = load_config(config)?;
    if let Some(exe) = meta_exe {
        config.meta.exe = Some(exe);
    }
    if reflect {
        config.output.reflection = true;
    }
    let out_dir = output
        .or_else(|| config.output.dir.clone())
        .unwrap_or_else(|| PathBuf::from("generated"));

    let files = discover_sources(&paths);
    if files.is_empty() {
        return Err("no C++ sources found".to_string());
    }
    info!("{} input file(s), output to {}", files.len(), out_dir.display());

    let mut session = Session::new(config).map_err(|e| e.to_string())?;
    let report = session.run(&files, &out_dir);

    if json {
        println!("{}", report.to_json());
    } else {
        for file in &report.files {
            if file.is_success() {
                println!("✓ {}", file.input.display());
            }
        }
        if !report.is_success() {
            eprintln!("{}", report.render_failures(&ErrorFormatter::with_colors()));
        }
        println!(
            "{} transformed, {} failed",
            report.succeeded(),
            report.failed()
        );
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(format!("{} file(s) failed", report.failed()))
    }
}

/// Namespace, class, function and enum counts over the whole tree
fn count_scopes(namespace: &Namespace) -> (usize, usize, usize, usize) {
    namespace.namespaces.iter().map(count_scopes).fold(
        (
            namespace.namespaces.len(),
            namespace.classes.len(),
            namespace.functions.len(),
            namespace.enums.len(),
        ),
        |acc, child| (acc.0 + child.0, acc.1 + child.1, acc.2 + child.2, acc.3 + child.3),
    )
}

fn check_file(file: &Path, format: OutputFormat) -> Result<(), String> {
    let source = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;

    let global = match parser::parse_source(&source) {
        Ok(global) => global,
        Err(failure) => {
            let mut source_map = SourceMap::new();
            let file_id = source_map.add_file(file.display().to_string(), source.clone());
            let diagnostic = failure.to_diagnostic(&source_map, file_id);
            eprintln!(
                "{}",
                ErrorFormatter::with_colors().format_diagnostic(&diagnostic, &source_map)
            );
            return Err(format!("{} does not parse", file.display()));
        }
    };
    debug!("{:#?}", global);

    let (namespaces, classes, functions, enums) = count_scopes(&global);
    match format {
        OutputFormat::Text => {
            println!("✓ {}: OK", file.display());
            println!("  Namespaces: {}", namespaces);
            println!("  Classes:    {}", classes);
            println!("  Functions:  {}", functions);
            println!("  Variables:  {}", global.variables.len());
            println!("  Enums:      {}", enums);
        }
        OutputFormat::Json => {
            let summary = json!({
                "status": "ok",
                "namespaces": namespaces,
                "classes": classes,
                "functions": functions,
                "variables": global.variables.len(),
                "enums": enums,
            });
            println!("{}", summary);
        }
    }
    Ok(())
}

fn list_generators(exe: &Path, timeout: u64) -> Result<(), String> {
    let mut client =
        MetaClient::spawn(exe, Duration::from_secs(timeout)).map_err(|e| e.to_string())?;
    for name in client.generators() {
        println!("{}", name);
    }
    client.shutdown().map_err(|e| e.to_string())
}
