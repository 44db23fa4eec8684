//! Block classification, section reassembly, validation and coverage for nbmend.
//!
//! The engine is synchronous and stateless: every entry point is a function
//! of its explicit inputs, so callers may run distinct documents in parallel.

pub mod assembler;
pub mod classifier;
pub mod coverage;
pub mod plan;
pub mod repair;
pub mod validator;

pub use assembler::{
    Advisory, Assembly, AssemblyOptions, DroppedBlock, Section, SectionSchema, assemble,
};
pub use classifier::{BlockClassifier, ClassificationRule, Predicate};
pub use coverage::{
    CategoryTable, CoverageReport, CoverageReporter, ItemGroup, coverage_percent, scan_directory,
};
pub use plan::RepairPlan;
pub use repair::{
    FileValidation, ProgressReporter, RepairOptions, RepairOutcome, SilentProgress, repair_file,
    validate_all,
};
pub use validator::{DocumentValidator, IssueKind, ValidationIssue, ValidationReport};
