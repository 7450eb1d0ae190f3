//! Logging setup for metapp
//!
//! `RUST_LOG` wins when set; otherwise the level follows the number of `-v`
//! flags given to the CLI.
//!
//! ```bash
//! metapp transform src -o out -vv
//! RUST_LOG=preprocessor::evaluator=debug metapp transform src -o out
//! ```
//!
//! Levels:
//! - `error!` a file could not be transformed
//! - `warn!` degraded modes, such as running without an evaluator
//! - `info!` one line per transformed file
//! - `debug!` scope pushes and pops, meta functions, evaluator round trips
//! - `trace!` every window handed to the scope rules

use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Map the CLI's `-v` count onto a level filter
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize logging once for the process; later calls are no-ops.
pub fn init(verbose: u8) {
    let fallback = level_for_verbosity(verbose);
    INIT.call_once(|| {
        Builder::from_env(Env::default().default_filter_or(fallback.as_str()))
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{:5}] {}: {}",
                    record.level(),
                    record.module_path().unwrap_or("metapp"),
                    record.args()
                )
            })
            .init();
    });
}

/// Logging for tests; output is captured by the harness.
pub fn init_test() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::Warn)
        .is_test(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Warn);
        assert_eq!(level_for_verbosity(1), LevelFilter::Info);
        assert_eq!(level_for_verbosity(2), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(9), LevelFilter::Trace);
    }
}
