//! Schema-driven section reassembly.
//!
//! Takes a classified document and rebuilds its block sequence in canonical
//! section order, synthesizing any section header the source lacks.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use nbmend_notebook::{Block, Document};
use nbmend_shared::{AssemblyConfig, Result, Role, RoleClaims, SectionSpec};

use crate::classifier::BlockClassifier;

/// Rank given to content roles a `secondary_order` does not mention.
const UNRANKED: u32 = u32::MAX;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// One canonical section: a header role followed by its content roles.
#[derive(Debug, Clone)]
pub struct Section {
    pub header_role: Role,
    /// Markdown used for a synthesized header.
    pub default_title: String,
    pub content_roles: Vec<Role>,
    pub secondary_order: Option<HashMap<Role, u32>>,
}

impl Section {
    pub fn new(header_role: Role, default_title: impl Into<String>, content_roles: Vec<Role>) -> Self {
        Self {
            header_role,
            default_title: default_title.into(),
            content_roles,
            secondary_order: None,
        }
    }

    /// Rank content roles explicitly instead of by source position.
    pub fn with_secondary_order(mut self, order: HashMap<Role, u32>) -> Self {
        self.secondary_order = Some(order);
        self
    }

    pub fn from_spec(spec: &SectionSpec) -> Self {
        Self {
            header_role: Role::parse(&spec.header_role),
            default_title: spec.default_title.clone(),
            content_roles: spec.content_roles.iter().map(|r| Role::parse(r)).collect(),
            secondary_order: spec.secondary_order.as_ref().map(|order| {
                order
                    .iter()
                    .map(|(role, rank)| (Role::parse(role), *rank))
                    .collect()
            }),
        }
    }

    fn rank(&self, role: &Role) -> u32 {
        self.secondary_order
            .as_ref()
            .and_then(|order| order.get(role).copied())
            .unwrap_or(UNRANKED)
    }
}

/// Ordered list of canonical sections.
///
/// Every role is placed by at most one slot of one section, so a block can
/// never be emitted twice.
#[derive(Debug, Clone, Default)]
pub struct SectionSchema {
    sections: Vec<Section>,
}

impl SectionSchema {
    /// Build a schema, rejecting sentinel roles and roles placed twice.
    pub fn new(sections: Vec<Section>) -> Result<Self> {
        let mut claims = RoleClaims::default();
        for section in &sections {
            let header = section.header_role.as_str();
            claims.claim(header, header)?;
            for role in &section.content_roles {
                claims.claim(role.as_str(), header)?;
            }
        }
        Ok(Self { sections })
    }

    pub fn from_specs(specs: &[SectionSpec]) -> Result<Self> {
        Self::new(specs.iter().map(Section::from_spec).collect())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Every role some section places (headers and content).
    pub fn placed_roles(&self) -> HashSet<&Role> {
        self.sections
            .iter()
            .flat_map(|s| std::iter::once(&s.header_role).chain(s.content_roles.iter()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Switches controlling assembly behavior.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions {
    pub synthesize_missing_headers: bool,
    pub report_missing_content: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            synthesize_missing_headers: true,
            report_missing_content: true,
        }
    }
}

impl From<&AssemblyConfig> for AssemblyOptions {
    fn from(config: &AssemblyConfig) -> Self {
        Self {
            synthesize_missing_headers: config.synthesize_missing_headers,
            report_missing_content: config.report_missing_content,
        }
    }
}

/// A non-fatal observation made while assembling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// A content role the section expects has no block in the source.
    MissingContent { section: Role, role: Role },
    /// The section header is absent and synthesis is disabled.
    MissingSection { section: Role },
    /// More than one block carries the section's header role.
    DuplicateHeader { section: Role, original_index: usize },
    /// A block's role is not placed by any section; the block was dropped.
    UnplacedBlock { role: Role, original_index: usize },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingContent { section, role } => {
                write!(f, "section '{section}' has no '{role}' content")
            }
            Self::MissingSection { section } => {
                write!(f, "section '{section}' has no header (synthesis disabled)")
            }
            Self::DuplicateHeader {
                section,
                original_index,
            } => write!(
                f,
                "block {original_index} repeats the '{section}' header; kept after the first"
            ),
            Self::UnplacedBlock {
                role,
                original_index,
            } => write!(f, "block {original_index} has role '{role}', which no section places"),
        }
    }
}

/// A source block left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedBlock {
    pub original_index: usize,
    pub role: Role,
}

/// Output of [`assemble`].
#[derive(Debug, Clone)]
pub struct Assembly {
    /// The reassembled document, re-indexed by output position.
    pub document: Document,
    pub synthesized_count: usize,
    pub advisories: Vec<Advisory>,
    pub dropped: Vec<DroppedBlock>,
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Rebuild `document` in the order given by `schema`.
///
/// Each block is classified exactly once. Placeholder and unclassified blocks
/// are dropped; every other block is emitted exactly once, inside the section
/// that owns its role.
#[instrument(skip_all, fields(blocks = document.len(), sections = schema.sections().len()))]
pub fn assemble(
    document: &Document,
    schema: &SectionSchema,
    classifier: &BlockClassifier,
    options: &AssemblyOptions,
) -> Assembly {
    let blocks = document.blocks();
    let roles = classifier.classify_all(blocks);

    let mut advisories = Vec::new();
    let mut dropped = Vec::new();

    let placed = schema.placed_roles();
    for (block, role) in blocks.iter().zip(&roles) {
        if role.is_dropped() {
            dropped.push(DroppedBlock {
                original_index: block.original_index(),
                role: role.clone(),
            });
        } else if !placed.contains(role) {
            warn!(role = %role, index = block.original_index(), "role not placed by any section");
            advisories.push(Advisory::UnplacedBlock {
                role: role.clone(),
                original_index: block.original_index(),
            });
            dropped.push(DroppedBlock {
                original_index: block.original_index(),
                role: role.clone(),
            });
        }
    }

    let mut out: Vec<Block> = Vec::with_capacity(blocks.len());
    let mut synthesized_count = 0;

    for section in schema.sections() {
        let headers: Vec<&Block> = blocks
            .iter()
            .zip(&roles)
            .filter(|(_, role)| **role == section.header_role)
            .map(|(block, _)| block)
            .collect();

        match headers.split_first() {
            Some((first, duplicates)) => {
                out.push((*first).clone());
                for duplicate in duplicates {
                    advisories.push(Advisory::DuplicateHeader {
                        section: section.header_role.clone(),
                        original_index: duplicate.original_index(),
                    });
                    out.push((*duplicate).clone());
                }
            }
            None if options.synthesize_missing_headers => {
                debug!(section = %section.header_role, "synthesizing missing header");
                out.push(document.synthesize_block(&section.default_title));
                synthesized_count += 1;
            }
            None => {
                advisories.push(Advisory::MissingSection {
                    section: section.header_role.clone(),
                });
            }
        }

        let mut content: Vec<(u32, &Block)> = blocks
            .iter()
            .zip(&roles)
            .filter(|(_, role)| section.content_roles.contains(role))
            .map(|(block, role)| (section.rank(role), block))
            .collect();
        content.sort_by_key(|(rank, block)| (*rank, block.original_index()));

        if options.report_missing_content {
            for role in &section.content_roles {
                if !roles.contains(role) {
                    advisories.push(Advisory::MissingContent {
                        section: section.header_role.clone(),
                        role: role.clone(),
                    });
                }
            }
        }

        out.extend(content.into_iter().map(|(_, block)| block.clone()));
    }

    info!(
        input = blocks.len(),
        output = out.len(),
        synthesized = synthesized_count,
        dropped = dropped.len(),
        advisories = advisories.len(),
        "assembled document"
    );

    Assembly {
        document: document.with_blocks(out),
        synthesized_count,
        advisories,
        dropped,
    }
}
