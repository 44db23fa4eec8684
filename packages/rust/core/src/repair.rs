//! File-level pipelines: repair one notebook, validate many.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, instrument, warn};

use nbmend_notebook::{self as notebook, Document};
use nbmend_shared::Result;

use crate::assembler::{Advisory, DroppedBlock, assemble};
use crate::plan::RepairPlan;
use crate::validator::{DocumentValidator, ValidationReport};

/// Progress callback trait for file pipelines.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each file is processed.
    fn file_checked(&self, path: &Path, current: usize, total: usize);
    /// Called when a batch completes.
    fn done(&self, processed: usize, failing: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_checked(&self, _path: &Path, _current: usize, _total: usize) {}
    fn done(&self, _processed: usize, _failing: usize) {}
}

/// Where to read from and write to.
#[derive(Debug, Clone)]
pub struct RepairOptions {
    pub input: PathBuf,
    /// Defaults to overwriting `input`.
    pub output: Option<PathBuf>,
    /// Compute everything, write nothing.
    pub dry_run: bool,
}

impl RepairOptions {
    pub fn in_place(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            dry_run: false,
        }
    }

    fn output_path(&self) -> &Path {
        self.output.as_deref().unwrap_or(&self.input)
    }
}

/// Result of [`repair_file`].
#[derive(Debug)]
pub struct RepairOutcome {
    pub output: PathBuf,
    pub document: Document,
    pub synthesized_count: usize,
    pub advisories: Vec<Advisory>,
    pub dropped: Vec<DroppedBlock>,
    /// Validation of the repaired document.
    pub validation: ValidationReport,
    /// Whether the repaired bytes differ from the input bytes.
    pub changed: bool,
    /// Whether the output file was written.
    pub written: bool,
    /// SHA-256 of the repaired bytes.
    pub fingerprint: String,
    pub elapsed: std::time::Duration,
}

/// Load, reassemble, validate and write one notebook.
///
/// A structural problem in the input aborts before anything is written. An
/// in-place repair that would not change a byte skips the write.
#[instrument(skip_all, fields(input = %options.input.display(), profile = %plan.name))]
pub fn repair_file(
    options: &RepairOptions,
    plan: &RepairPlan,
    validator: &DocumentValidator,
    progress: &dyn ProgressReporter,
) -> Result<RepairOutcome> {
    let start = Instant::now();

    progress.phase("Loading");
    let loaded = notebook::load(&options.input)?;

    progress.phase("Reassembling");
    let assembly = assemble(&loaded.document, &plan.schema, &plan.classifier, &plan.options);
    for advisory in &assembly.advisories {
        warn!(%advisory, "assembly advisory");
    }

    progress.phase("Validating");
    let validation = validator.validate(&assembly.document);

    let bytes = notebook::to_bytes(&assembly.document)?;
    let fingerprint = notebook::fingerprint(&bytes);
    let changed = fingerprint != loaded.fingerprint;

    let output = options.output_path().to_path_buf();
    let needs_write = changed || output != options.input;
    let written = needs_write && !options.dry_run;
    if written {
        progress.phase("Writing");
        notebook::write_atomic(&output, &bytes)?;
    }

    let elapsed = start.elapsed();
    info!(
        output = %output.display(),
        blocks = assembly.document.len(),
        synthesized = assembly.synthesized_count,
        dropped = assembly.dropped.len(),
        issues = validation.len(),
        changed,
        written,
        elapsed_ms = elapsed.as_millis() as u64,
        "repair complete"
    );

    Ok(RepairOutcome {
        output,
        document: assembly.document,
        synthesized_count: assembly.synthesized_count,
        advisories: assembly.advisories,
        dropped: assembly.dropped,
        validation,
        changed,
        written,
        fingerprint,
        elapsed,
    })
}

/// Validation result for one file of a batch.
#[derive(Debug)]
pub struct FileValidation {
    pub path: PathBuf,
    /// `Err` when the file could not be loaded at all.
    pub result: Result<ValidationReport>,
}

impl FileValidation {
    pub fn is_valid(&self) -> bool {
        matches!(&self.result, Ok(report) if report.is_valid())
    }
}

/// Validate each file independently; one unreadable file does not stop the rest.
#[instrument(skip_all, fields(files = paths.len()))]
pub fn validate_all(
    paths: &[PathBuf],
    validator: &DocumentValidator,
    progress: &dyn ProgressReporter,
) -> Vec<FileValidation> {
    progress.phase("Validating");

    let total = paths.len();
    let results: Vec<FileValidation> = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let result = notebook::load(path).map(|loaded| validator.validate(&loaded.document));
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "could not load notebook");
            }
            progress.file_checked(path, i + 1, total);
            FileValidation {
                path: path.clone(),
                result,
            }
        })
        .collect();

    let failing = results.iter().filter(|r| !r.is_valid()).count();
    info!(total, failing, "batch validation complete");
    progress.done(total, failing);

    results
}
