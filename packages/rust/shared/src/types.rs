//! Core vocabulary shared by the notebook model, profiles and the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name reserved for the sentinel role of unfilled template blocks.
pub const PLACEHOLDER_ROLE: &str = "placeholder";

/// Name reserved for blocks that no rule matched.
pub const UNCLASSIFIED_ROLE: &str = "unclassified";

// ---------------------------------------------------------------------------
// BlockKind
// ---------------------------------------------------------------------------

/// Whether a block is prose or something that can be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Markdown (and raw) cells.
    Narrative,
    /// Code cells.
    Executable,
}

impl BlockKind {
    /// Map an on-disk `cell_type` to a kind. `raw` cells are treated as prose.
    pub fn from_cell_type(cell_type: &str) -> Option<Self> {
        match cell_type {
            "markdown" | "raw" => Some(Self::Narrative),
            "code" => Some(Self::Executable),
            _ => None,
        }
    }

    /// Short label used in logs and CLI output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Narrative => "narrative",
            Self::Executable => "executable",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Semantic category assigned to a block by the classifier.
///
/// Roles are configuration-defined tags, plus two sentinels that are never
/// emitted by the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// A role named in a repair profile (section header or content slot).
    Tag(String),
    /// Unfilled boilerplate, deliberately dropped.
    Placeholder,
    /// No rule matched.
    Unclassified,
}

impl Role {
    /// Build a role from its configured name, recognising the sentinels.
    pub fn parse(name: &str) -> Self {
        match name {
            PLACEHOLDER_ROLE => Self::Placeholder,
            UNCLASSIFIED_ROLE => Self::Unclassified,
            other => Self::Tag(other.to_string()),
        }
    }

    /// The configured name of this role.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tag(name) => name,
            Self::Placeholder => PLACEHOLDER_ROLE,
            Self::Unclassified => UNCLASSIFIED_ROLE,
        }
    }

    /// Blocks with this role never reach the reassembled document.
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Placeholder | Self::Unclassified)
    }

    /// Whether `name` is one of the reserved sentinel names.
    pub fn is_reserved_name(name: &str) -> bool {
        name == PLACEHOLDER_ROLE || name == UNCLASSIFIED_ROLE
    }
}

impl From<String> for Role {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_recognises_sentinels() {
        assert_eq!(Role::parse("placeholder"), Role::Placeholder);
        assert_eq!(Role::parse("unclassified"), Role::Unclassified);
        assert_eq!(Role::parse("q2.1-code"), Role::Tag("q2.1-code".into()));
        assert!(Role::Placeholder.is_dropped());
        assert!(!Role::parse("title").is_dropped());
    }

    #[test]
    fn role_serializes_as_plain_string() {
        let json = serde_json::to_string(&Role::parse("section-5")).expect("serialize");
        assert_eq!(json, "\"section-5\"");
        let parsed: Role = serde_json::from_str("\"placeholder\"").expect("deserialize");
        assert_eq!(parsed, Role::Placeholder);
    }

    #[test]
    fn block_kind_from_cell_type() {
        assert_eq!(BlockKind::from_cell_type("code"), Some(BlockKind::Executable));
        assert_eq!(BlockKind::from_cell_type("markdown"), Some(BlockKind::Narrative));
        assert_eq!(BlockKind::from_cell_type("raw"), Some(BlockKind::Narrative));
        assert_eq!(BlockKind::from_cell_type("heading"), None);
    }
}
