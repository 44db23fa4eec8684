//! Keyword categorization of file paths and the coverage gate built on it.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use nbmend_shared::{CategoryConfig, CoverageConfig, NbmendError, Result};

/// A category and its keywords, lowercased.
#[derive(Debug, Clone)]
struct Category {
    name: String,
    keywords: Vec<String>,
}

/// Ordered `category -> keywords` table with a catch-all fallback.
///
/// Categories are tried in declaration order; the first one with a keyword
/// contained in the lowercased path wins.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    categories: Vec<Category>,
    fallback: String,
}

impl CategoryTable {
    pub fn new(categories: &[CategoryConfig], fallback: impl Into<String>) -> Self {
        let categories = categories
            .iter()
            .map(|c| Category {
                name: c.name.clone(),
                keywords: c.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();

        Self {
            categories,
            fallback: fallback.into(),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn categorize(&self, path: &str) -> &str {
        let path = path.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.keywords.iter().any(|k| path.contains(k.as_str())))
            .map_or(self.fallback.as_str(), |c| c.name.as_str())
    }
}

/// A named batch of item paths, e.g. one scanned root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemGroup {
    pub name: String,
    pub items: Vec<String>,
}

/// Result of [`CoverageReporter::report`].
#[derive(Debug, Clone, Serialize)]
pub struct CoverageReport {
    pub total: usize,
    pub categorized: usize,
    /// Exact percentage; rounding is left to display.
    pub coverage_percent: f64,
    pub meets_threshold: bool,
    pub threshold: f64,
    /// Item count per category, fallback included.
    pub by_category: BTreeMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

/// Computes the share of items that land outside the fallback category.
#[derive(Debug, Clone)]
pub struct CoverageReporter {
    table: CategoryTable,
    threshold: f64,
}

impl CoverageReporter {
    pub fn new(table: CategoryTable, threshold: f64) -> Self {
        Self { table, threshold }
    }

    pub fn from_config(config: &CoverageConfig) -> Self {
        Self::new(
            CategoryTable::new(&config.categories, config.fallback_category.clone()),
            config.threshold,
        )
    }

    pub fn table(&self) -> &CategoryTable {
        &self.table
    }

    #[instrument(skip_all, fields(groups = groups.len(), threshold = self.threshold))]
    pub fn report(&self, groups: &[ItemGroup]) -> CoverageReport {
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();

        for group in groups {
            for item in &group.items {
                *by_category
                    .entry(self.table.categorize(item).to_string())
                    .or_default() += 1;
            }
            debug!(group = %group.name, items = group.items.len(), "categorized group");
        }

        let total: usize = by_category.values().sum();
        let fallback = by_category.get(self.table.fallback()).copied().unwrap_or(0);
        let categorized = total - fallback;
        let coverage_percent = coverage_percent(categorized, total);

        info!(total, categorized, coverage_percent, "coverage computed");

        CoverageReport {
            total,
            categorized,
            coverage_percent,
            meets_threshold: coverage_percent >= self.threshold,
            threshold: self.threshold,
            by_category,
            generated_at: Utc::now(),
        }
    }
}

/// `categorized / total * 100`, or zero for an empty batch.
pub fn coverage_percent(categorized: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    categorized as f64 / total as f64 * 100.0
}

/// Collect every file under `root` with one of `extensions`, as a group of
/// `/`-separated paths relative to `root`.
pub fn scan_directory(root: &Path, extensions: &[String]) -> Result<ItemGroup> {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let entries = glob::glob(&format!("{escaped}/**/*"))
        .map_err(|e| NbmendError::config(format!("invalid scan root {}: {e}", root.display())))?;

    let mut items = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            NbmendError::io(path, e.into_error())
        })?;
        if !path.is_file() {
            continue;
        }
        let wanted = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.iter().any(|want| want == ext));
        if !wanted {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            items.push(parts.join("/"));
        }
    }
    items.sort();

    debug!(root = %root.display(), items = items.len(), "scanned directory");
    Ok(ItemGroup {
        name: root.display().to_string(),
        items,
    })
}
