//! Application configuration for nbmend.
//!
//! User config lives at `~/.nbmend/nbmend.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{NbmendError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "nbmend.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".nbmend";

// ---------------------------------------------------------------------------
// Config structs (matching nbmend.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Structural validation settings.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Coverage gate and category table.
    #[serde(default)]
    pub coverage: CoverageConfig,
}

/// `[validation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Lowest acceptable `nbformat` value.
    #[serde(default = "default_min_format_version")]
    pub min_format_version: u64,

    /// Keys that must be present in the document metadata.
    #[serde(default = "default_required_metadata")]
    pub required_metadata: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_format_version: default_min_format_version(),
            required_metadata: default_required_metadata(),
        }
    }
}

fn default_min_format_version() -> u64 {
    4
}
fn default_required_metadata() -> Vec<String> {
    vec!["kernelspec".into(), "language_info".into()]
}

/// `[coverage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Minimum categorized percentage for the gate to pass.
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Catch-all category for items matching no keyword.
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,

    /// File extensions (without the dot) included in directory scans.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Categories in evaluation order; the first keyword hit wins.
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryConfig>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            fallback_category: default_fallback_category(),
            extensions: default_extensions(),
            categories: default_categories(),
        }
    }
}

fn default_threshold() -> f64 {
    80.0
}
fn default_fallback_category() -> String {
    "general_utilities".into()
}
fn default_extensions() -> Vec<String> {
    ["md", "py", "ipynb", "txt"].into_iter().map(String::from).collect()
}

/// `[[coverage.categories]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Category identifier reported in coverage output.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Substrings tested against the lowercased item path.
    pub keywords: Vec<String>,
}

impl CategoryConfig {
    fn new(name: &str, description: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
        }
    }
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig::new(
            "developer_onboarding",
            "Learning materials and educational content",
            &["course", "tutorial", "fundamentals", "getting_started", "readme", "guide"],
        ),
        CategoryConfig::new(
            "integration_tools",
            "Tools for integrating with external systems",
            &["tool_use", "api", "sdk", "client", "integration", "third_party"],
        ),
        CategoryConfig::new(
            "production_patterns",
            "Production-ready patterns and best practices",
            &["real_world", "evaluation", "classification", "rag", "patterns"],
        ),
        CategoryConfig::new(
            "multimodal_capabilities",
            "Vision and document processing features",
            &["multimodal", "vision", "image", "document", "pdf", "transcribe"],
        ),
        CategoryConfig::new(
            "automation_workflows",
            "Tools for automating complex business processes",
            &["workflow", "agent", "customer_service", "batch", "automation"],
        ),
        CategoryConfig::new(
            "quality_assurance",
            "Testing, evaluation, and quality measurement tools",
            &["evaluation", "test", "prompt_evaluations", "building_evals", "quality"],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.nbmend/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| NbmendError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.nbmend/nbmend.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| NbmendError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| NbmendError::config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| NbmendError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| NbmendError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| NbmendError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations that would make coverage numbers meaningless.
fn validate_config(config: &AppConfig) -> Result<()> {
    let coverage = &config.coverage;
    if !(0.0..=100.0).contains(&coverage.threshold) {
        return Err(NbmendError::config(format!(
            "coverage threshold {} must be between 0 and 100",
            coverage.threshold
        )));
    }
    if coverage
        .categories
        .iter()
        .any(|c| c.name == coverage.fallback_category)
    {
        return Err(NbmendError::config(format!(
            "category '{}' is also the fallback category",
            coverage.fallback_category
        )));
    }
    Ok(())
}
