//! Shared types, error model, and configuration for nbmend.
//!
//! This crate is the foundation depended on by all other nbmend crates.
//! It provides:
//! - [`NbmendError`], the unified error type
//! - Shared vocabulary ([`BlockKind`], [`Role`])
//! - Configuration ([`AppConfig`], config loading) and repair profiles ([`RepairProfile`])

pub mod config;
pub mod error;
pub mod profile;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CategoryConfig, CoverageConfig, ValidationConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{NbmendError, Result};
pub use profile::{
    AssemblyConfig, RepairProfile, RoleClaims, RuleSpec, SectionSpec, builtin_profile,
    builtin_profile_named, builtin_profile_names, load_profile, parse_profile,
};
pub use types::{BlockKind, PLACEHOLDER_ROLE, Role, UNCLASSIFIED_ROLE};
