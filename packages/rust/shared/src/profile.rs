//! Repair profiles: the rule table and section schema that drive reassembly.
//!
//! A profile is static TOML configuration. Adding a new role means appending a
//! `[[rules]]` entry and listing the role in a `[[sections]]` entry; nothing in
//! the engine changes.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NbmendError, Result};
use crate::types::{BlockKind, Role};

/// Profiles shipped with the binary, by name. The first is the default.
const BUILTIN_PROFILES: &[(&str, &str)] = &[
    ("deep-dive-analysis", include_str!("../profiles/deep-dive.toml")),
    (
        "deep-dive-structure",
        include_str!("../profiles/deep-dive-structure.toml"),
    ),
];

/// Top-level repair profile, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairProfile {
    /// Display name of the layout this profile restores.
    #[serde(default)]
    pub name: String,

    /// Assembly behavior switches.
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// Classification rules, evaluated by ascending precedence.
    #[serde(default)]
    pub rules: Vec<RuleSpec>,

    /// Canonical sections in output order.
    #[serde(default)]
    pub sections: Vec<SectionSpec>,
}

/// `[assembly]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Create a header from `default_title` when the source lacks one.
    #[serde(default = "default_true")]
    pub synthesize_missing_headers: bool,

    /// Emit an advisory for each content role absent from the source.
    #[serde(default = "default_true")]
    pub report_missing_content: bool,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            synthesize_missing_headers: true,
            report_missing_content: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[[rules]]` entry.
///
/// All present conditions must hold; a rule without any text condition never
/// matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Role assigned when the rule matches.
    pub role: Role,
    /// Lower values are evaluated first.
    pub precedence: i32,
    /// Restrict the rule to one block kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BlockKind>,
    /// At least one of these substrings must occur.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any: Vec<String>,
    /// Every one of these substrings must occur.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<String>,
    /// Regular expression that must match somewhere in the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// `[[sections]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    /// Role of the block that opens this section.
    pub header_role: String,
    /// Markdown used when the header has to be synthesized.
    pub default_title: String,
    /// Roles whose blocks belong to this section.
    #[serde(default)]
    pub content_roles: Vec<String>,
    /// Optional rank per content role; overrides source order between roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_order: Option<BTreeMap<String, u32>>,
}

impl RepairProfile {
    /// Check the profile for inconsistencies that would break reassembly.
    ///
    /// Every rule role must be owned by exactly one section slot, otherwise
    /// blocks would be classified but never placed.
    pub fn validate(&self) -> Result<()> {
        if self.sections.is_empty() {
            return Err(NbmendError::config("profile defines no sections"));
        }

        let mut claims = RoleClaims::default();
        for section in &self.sections {
            let header = section.header_role.as_str();
            claims.claim(header, header)?;

            for role in &section.content_roles {
                claims.claim(role, header)?;
            }

            if let Some(order) = &section.secondary_order {
                for role in order.keys() {
                    if !section.content_roles.contains(role) {
                        return Err(NbmendError::config(format!(
                            "section '{header}': secondary_order names '{role}', \
                             which is not one of its content roles"
                        )));
                    }
                }
            }
        }

        for rule in &self.rules {
            match &rule.role {
                Role::Unclassified => {
                    return Err(NbmendError::config(
                        "rules may not assign the reserved role 'unclassified'",
                    ));
                }
                Role::Placeholder => {}
                Role::Tag(name) => {
                    if !claims.is_claimed(name) {
                        return Err(NbmendError::config(format!(
                            "rule role '{name}' is not placed by any section"
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Tracks which section places each role, so that no role is placed twice.
#[derive(Debug, Default)]
pub struct RoleClaims<'a> {
    owners: HashMap<&'a str, &'a str>,
}

impl<'a> RoleClaims<'a> {
    /// Record that `role` is placed by section `owner`.
    ///
    /// Rejects empty and reserved role names, and a role some other slot
    /// already placed.
    pub fn claim(&mut self, role: &'a str, owner: &'a str) -> Result<()> {
        if role.trim().is_empty() {
            return Err(NbmendError::config(format!(
                "section '{owner}' has an empty role name"
            )));
        }
        if Role::is_reserved_name(role) {
            return Err(NbmendError::config(format!(
                "section '{owner}' uses reserved role '{role}'"
            )));
        }
        if let Some(previous) = self.owners.insert(role, owner) {
            return Err(NbmendError::config(format!(
                "role '{role}' is placed by both section '{previous}' and section '{owner}'"
            )));
        }
        Ok(())
    }

    pub fn is_claimed(&self, role: &str) -> bool {
        self.owners.contains_key(role)
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse and validate a profile from TOML text.
pub fn parse_profile(content: &str) -> Result<RepairProfile> {
    let profile: RepairProfile = toml::from_str(content)
        .map_err(|e| NbmendError::config(format!("invalid repair profile: {e}")))?;
    profile.validate()?;
    Ok(profile)
}

/// Load and validate a profile from a TOML file.
pub fn load_profile(path: &Path) -> Result<RepairProfile> {
    let content = std::fs::read_to_string(path).map_err(|e| NbmendError::io(path, e))?;
    let profile = parse_profile(&content)
        .map_err(|e| NbmendError::config(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), rules = profile.rules.len(), "loaded repair profile");
    Ok(profile)
}

/// The default profile embedded in the binary.
pub fn builtin_profile() -> Result<RepairProfile> {
    parse_profile(BUILTIN_PROFILES[0].1)
}

/// Names of the embedded profiles, default first.
pub fn builtin_profile_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_PROFILES.iter().map(|(name, _)| *name)
}

/// An embedded profile by name.
pub fn builtin_profile_named(name: &str) -> Result<RepairProfile> {
    let (_, content) = BUILTIN_PROFILES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .ok_or_else(|| {
            let known: Vec<&str> = builtin_profile_names().collect();
            NbmendError::config(format!(
                "unknown built-in profile '{name}' (available: {})",
                known.join(", ")
            ))
        })?;
    parse_profile(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r##"
name = "minimal"

[[rules]]
role = "intro"
precedence = 10
kind = "narrative"
any = ["# Intro"]

[[rules]]
role = "placeholder"
precedence = 5
all = ["TODO: fill in"]

[[rules]]
role = "setup"
precedence = 20
kind = "executable"
any = ["import "]

[[sections]]
header_role = "intro"
default_title = "# Intro"
content_roles = ["setup"]
"##;

    #[test]
    fn builtin_profile_is_valid() {
        let profile = builtin_profile().expect("builtin profile");
        assert!(!profile.rules.is_empty());
        assert_eq!(profile.sections.first().map(|s| s.header_role.as_str()), Some("title"));
        assert!(profile.assembly.synthesize_missing_headers);
    }

    #[test]
    fn every_builtin_profile_parses_under_its_name() {
        for name in builtin_profile_names() {
            let profile = builtin_profile_named(name).expect(name);
            assert_eq!(profile.name, name);
        }
        let err = builtin_profile_named("nope").unwrap_err();
        assert!(err.to_string().contains("deep-dive-structure"));
    }

    #[test]
    fn parse_minimal_profile() {
        let profile = parse_profile(MINIMAL).expect("parse");
        assert_eq!(profile.rules.len(), 3);
        assert_eq!(profile.rules[1].role, Role::Placeholder);
        assert_eq!(profile.rules[2].kind, Some(BlockKind::Executable));
        assert_eq!(profile.sections[0].content_roles, vec!["setup"]);
    }

    #[test]
    fn rejects_rule_role_without_section() {
        let toml_str = MINIMAL.replace("role = \"setup\"", "role = \"stray\"");
        let err = parse_profile(&toml_str).unwrap_err();
        assert!(err.to_string().contains("'stray' is not placed"));
    }

    #[test]
    fn rejects_role_owned_twice() {
        let toml_str = format!(
            "{MINIMAL}\n[[sections]]\nheader_role = \"outro\"\ndefault_title = \"# Outro\"\ncontent_roles = [\"setup\"]\n"
        );
        let err = parse_profile(&toml_str).unwrap_err();
        assert!(err.to_string().contains("placed by both"));
    }

    #[test]
    fn rejects_header_reused_as_content() {
        let toml_str = format!(
            "{MINIMAL}\n[[sections]]\nheader_role = \"outro\"\ndefault_title = \"# Outro\"\ncontent_roles = [\"intro\"]\n"
        );
        let err = parse_profile(&toml_str).unwrap_err();
        assert!(err
            .to_string()
            .contains("role 'intro' is placed by both section 'intro' and section 'outro'"));
    }

    #[test]
    fn rejects_unclassified_rule_role() {
        let toml_str = MINIMAL.replace("role = \"placeholder\"", "role = \"unclassified\"");
        let err = parse_profile(&toml_str).unwrap_err();
        assert!(err.to_string().contains("reserved role"));
    }

    #[test]
    fn rejects_secondary_order_outside_content_roles() {
        let toml_str = format!("{MINIMAL}secondary_order = {{ other = 1 }}\n");
        let err = parse_profile(&toml_str).unwrap_err();
        assert!(err.to_string().contains("secondary_order names 'other'"));
    }
}
