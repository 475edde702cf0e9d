//! Shared types, error model, diagnostics, and configuration for docsetter.
//!
//! This crate is the foundation depended on by all other docsetter crates.
//! It provides:
//! - [`DocsetError`], the unified error type
//! - Domain types ([`IndexRecord`], [`ErrorPolicy`])
//! - The [`DiagnosticSink`] the core components report through
//! - Configuration ([`AppConfig`], [`TreeConfig`], config loading)

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DocsetConfig, HtmlConfig, NavigationConfig, TreeConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use diagnostics::{DiagnosticSink, SilentDiagnostics, TracingDiagnostics};
pub use error::{DocsetError, Result};
pub use types::{DEFAULT_SUFFIX, ErrorPolicy, GUIDE_TYPE, IndexRecord};
