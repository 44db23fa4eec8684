//! Structural integrity checks for notebook documents.
//!
//! The validator never mutates the document and never stops early: every
//! check runs, in a fixed order, and contributes zero or more issues.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use nbmend_notebook::{Block, Document};
use nbmend_shared::ValidationConfig;

/// What a [`ValidationIssue`] is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    MissingFormatVersion,
    /// `nbformat` is present but not a non-negative integer.
    InvalidFormatVersion,
    OutdatedFormatVersion { found: u64, minimum: u64 },
    /// `metadata` is absent or not an object.
    MissingMetadata,
    MissingMetadataKey { key: String },
    MissingCells,
    UnexecutedCells { count: usize },
    CellsWithoutOutput { count: usize },
    CellsWithErrors { count: usize },
}

/// One defect found by [`DocumentValidator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    #[serde(flatten)]
    pub kind: IssueKind,
    pub message: String,
    /// Index of the first offending block, for block-level checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_index: Option<usize>,
}

impl ValidationIssue {
    fn document(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            block_index: None,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block_index {
            Some(index) => write!(f, "{} (first at cell {index})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Ordered list of issues for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when no check found anything.
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Checks documents against a [`ValidationConfig`].
#[derive(Debug, Clone, Default)]
pub struct DocumentValidator {
    config: ValidationConfig,
}

impl DocumentValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    #[instrument(skip_all, fields(blocks = document.len()))]
    pub fn validate(&self, document: &Document) -> ValidationReport {
        let mut issues = Vec::new();

        self.check_format_version(document, &mut issues);
        self.check_metadata(document, &mut issues);
        check_cells_present(document, &mut issues);

        let blocks = document.blocks();
        count_issue(
            blocks,
            |b| b.is_executable() && b.execution_marker().is_none(),
            |count| IssueKind::UnexecutedCells { count },
            |count| format!("{count} unexecuted code cells"),
            &mut issues,
        );
        count_issue(
            blocks,
            |b| b.is_executable() && b.outputs().is_empty(),
            |count| IssueKind::CellsWithoutOutput { count },
            |count| format!("{count} code cells without outputs"),
            &mut issues,
        );
        count_issue(
            blocks,
            |b| b.is_executable() && b.has_error_output(),
            |count| IssueKind::CellsWithErrors { count },
            |count| format!("{count} cells with error outputs"),
            &mut issues,
        );

        debug!(issues = issues.len(), "validated document");
        ValidationReport { issues }
    }

    fn check_format_version(&self, document: &Document, issues: &mut Vec<ValidationIssue>) {
        match document.format_version() {
            None => issues.push(ValidationIssue::document(
                IssueKind::MissingFormatVersion,
                "Missing nbformat",
            )),
            Some(value) => match value.as_u64() {
                None => issues.push(ValidationIssue::document(
                    IssueKind::InvalidFormatVersion,
                    format!("Invalid nbformat: {value}"),
                )),
                Some(found) if found < self.config.min_format_version => {
                    issues.push(ValidationIssue::document(
                        IssueKind::OutdatedFormatVersion {
                            found,
                            minimum: self.config.min_format_version,
                        },
                        format!("Old notebook format: {found}"),
                    ))
                }
                Some(_) => {}
            },
        }
    }

    fn check_metadata(&self, document: &Document, issues: &mut Vec<ValidationIssue>) {
        let Some(Value::Object(metadata)) = document.metadata() else {
            issues.push(ValidationIssue::document(
                IssueKind::MissingMetadata,
                "Missing metadata",
            ));
            return;
        };

        for key in &self.config.required_metadata {
            if !metadata.contains_key(key) {
                issues.push(ValidationIssue::document(
                    IssueKind::MissingMetadataKey { key: key.clone() },
                    format!("Missing {key}"),
                ));
            }
        }
    }
}

fn check_cells_present(document: &Document, issues: &mut Vec<ValidationIssue>) {
    if !document.has_cells() {
        issues.push(ValidationIssue::document(
            IssueKind::MissingCells,
            "No cells found",
        ));
    }
}

/// Push one issue carrying the number of blocks matching `offends`.
fn count_issue(
    blocks: &[Block],
    offends: impl Fn(&Block) -> bool,
    kind: impl FnOnce(usize) -> IssueKind,
    message: impl FnOnce(usize) -> String,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut offenders = blocks.iter().filter(|&b| offends(b));
    let Some(first) = offenders.next() else {
        return;
    };
    let count = 1 + offenders.count();

    issues.push(ValidationIssue {
        kind: kind(count),
        message: message(count),
        block_index: Some(first.original_index()),
    });
}
