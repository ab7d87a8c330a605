//! Shared types, error model, and configuration for the content-list tools.
//!
//! This crate is the foundation depended on by all other content-list crates.
//! It provides:
//! - [`ContentListError`] — the unified error type
//! - Domain types ([`HeadingRecord`], [`OutlineNode`], [`OutlinePrefs`], [`PrefKey`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, OutlineConfig, SecurityConfig, StoreConfig, config_dir, config_file_path,
    expand_home, init_config, load_config, load_config_from, resolve_secret,
};
pub use error::{ContentListError, Result};
pub use types::{HeadingRecord, OutlineNode, OutlinePrefs, PrefKey, SnapshotKind};
