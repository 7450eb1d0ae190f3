//! metapp preprocessor
//!
//! Rewrites C++ sources that use meta-classes and reflection into plain C++:
//! meta-class instances are expanded by an external evaluator process,
//! generator functions are collected into a dispatch entry point, and
//! reflection specializations are generated for classes and enumerations.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod evaluator;
pub mod expansion;
pub mod logging;
pub mod reflection;
pub mod session;
pub mod transform;

pub use config::{ConfigError, MetaConfig, OutputConfig, TransformConfig};
pub use error::TransformError;
pub use evaluator::{Evaluator, MetaClient, ProcessTransport, ProtocolError, StreamTransport, Transport};
pub use expansion::{ExpansionState, Expander};
pub use session::{discover_sources, BatchReport, FileReport, FileStatus, Session, SourceFile};
pub use transform::{transform_source, TransformOptions, TransformOutput};
