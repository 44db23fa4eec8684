//! Block classification by an ordered, data-driven rule table.
//!
//! Rules are sorted once by ascending precedence (declaration order breaks
//! ties) and the first matching rule decides the role. Classification looks
//! only at a block's kind and content, never at its position or neighbours.

use regex::Regex;
use tracing::debug;

use nbmend_notebook::Block;
use nbmend_shared::{BlockKind, NbmendError, Result, Role, RuleSpec};

/// The test part of a classification rule.
#[derive(Debug, Clone)]
pub struct Predicate {
    kind: Option<BlockKind>,
    any: Vec<String>,
    all: Vec<String>,
    pattern: Option<Regex>,
}

impl Predicate {
    /// A predicate matching content that contains any of `needles`.
    pub fn contains_any<I, S>(needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: None,
            any: needles.into_iter().map(Into::into).collect(),
            all: Vec::new(),
            pattern: None,
        }
    }

    /// Additionally require every one of `needles`.
    pub fn and_all<I, S>(mut self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.all.extend(needles.into_iter().map(Into::into));
        self
    }

    /// Restrict the predicate to one block kind.
    pub fn of_kind(mut self, kind: BlockKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Additionally require a regex match.
    pub fn matching(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Evaluate against a block's kind and content.
    pub fn matches(&self, kind: BlockKind, content: &str) -> bool {
        if self.kind.is_some_and(|k| k != kind) {
            return false;
        }
        if self.any.is_empty() && self.all.is_empty() && self.pattern.is_none() {
            return false;
        }
        if !self.any.is_empty() && !self.any.iter().any(|s| content.contains(s.as_str())) {
            return false;
        }
        if !self.all.iter().all(|s| content.contains(s.as_str())) {
            return false;
        }
        self.pattern.as_ref().is_none_or(|re| re.is_match(content))
    }
}

/// One entry of the rule table.
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub predicate: Predicate,
    pub role: Role,
    pub precedence: i32,
}

impl ClassificationRule {
    pub fn new(predicate: Predicate, role: Role, precedence: i32) -> Self {
        Self {
            predicate,
            role,
            precedence,
        }
    }

    /// Compile a rule from its profile form.
    pub fn from_spec(spec: &RuleSpec) -> Result<Self> {
        let pattern = spec
            .pattern
            .as_deref()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    NbmendError::config(format!("rule for role '{}': invalid pattern: {e}", spec.role))
                })
            })
            .transpose()?;

        if spec.any.is_empty() && spec.all.is_empty() && pattern.is_none() {
            return Err(NbmendError::config(format!(
                "rule for role '{}' has no any/all/pattern condition and can never match",
                spec.role
            )));
        }

        Ok(Self {
            predicate: Predicate {
                kind: spec.kind,
                any: spec.any.clone(),
                all: spec.all.clone(),
                pattern,
            },
            role: spec.role.clone(),
            precedence: spec.precedence,
        })
    }
}

/// Assigns a [`Role`] to a block using the first matching rule.
#[derive(Debug, Clone)]
pub struct BlockClassifier {
    rules: Vec<ClassificationRule>,
}

impl BlockClassifier {
    /// Build a classifier; rules are ordered by precedence, stable on ties.
    pub fn new(mut rules: Vec<ClassificationRule>) -> Self {
        rules.sort_by_key(|rule| rule.precedence);
        Self { rules }
    }

    /// Compile every rule of a profile.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        let rules = specs
            .iter()
            .map(ClassificationRule::from_spec)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn classify(&self, block: &Block) -> Role {
        self.classify_content(block.kind(), block.content())
    }

    pub fn classify_content(&self, kind: BlockKind, content: &str) -> Role {
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(kind, content))
            .map(|rule| rule.role.clone())
            .unwrap_or(Role::Unclassified)
    }

    /// Classify every block of a sequence, in order.
    pub fn classify_all(&self, blocks: &[Block]) -> Vec<Role> {
        let roles: Vec<Role> = blocks.iter().map(|block| self.classify(block)).collect();

        let unclassified = roles.iter().filter(|r| **r == Role::Unclassified).count();
        let placeholders = roles.iter().filter(|r| **r == Role::Placeholder).count();
        debug!(
            blocks = blocks.len(),
            unclassified, placeholders, "classified blocks"
        );

        roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str) -> Role {
        Role::parse(name)
    }

    fn question_rules() -> Vec<ClassificationRule> {
        vec![
            ClassificationRule::new(Predicate::contains_any(["Question 2"]), role("q2"), 50),
            ClassificationRule::new(
                Predicate::contains_any(["Question 2.1"]).of_kind(BlockKind::Executable),
                role("q2.1-code"),
                10,
            ),
            ClassificationRule::new(
                Predicate::contains_any(["Code to analyze"]).of_kind(BlockKind::Executable),
                Role::Placeholder,
                5,
            ),
        ]
    }

    #[test]
    fn specific_rule_wins_when_evaluated_first() {
        let classifier = BlockClassifier::new(question_rules());
        let content = "# Question 2: patterns\n# Question 2.1: onboarding";

        assert_eq!(
            classifier.classify_content(BlockKind::Executable, content),
            role("q2.1-code")
        );
        // The specific rule is limited to code; prose falls through to the general one.
        assert_eq!(
            classifier.classify_content(BlockKind::Narrative, content),
            role("q2")
        );
    }

    #[test]
    fn placeholder_is_distinct_from_unclassified() {
        let classifier = BlockClassifier::new(question_rules());

        assert_eq!(
            classifier.classify_content(BlockKind::Executable, "# Code to analyze Question 2.1"),
            Role::Placeholder
        );
        assert_eq!(
            classifier.classify_content(BlockKind::Narrative, "Unrelated prose"),
            Role::Unclassified
        );
    }

    #[test]
    fn equal_precedence_keeps_declaration_order() {
        let classifier = BlockClassifier::new(vec![
            ClassificationRule::new(Predicate::contains_any(["x"]), role("first"), 1),
            ClassificationRule::new(Predicate::contains_any(["x"]), role("second"), 1),
        ]);
        assert_eq!(classifier.classify_content(BlockKind::Narrative, "x"), role("first"));
    }

    #[test]
    fn all_and_pattern_conditions_combine() {
        let predicate = Predicate::contains_any(Vec::<String>::new())
            .and_all(["Question 3.1"])
            .matching(Regex::new("(?i)challenge").unwrap());

        assert!(predicate.matches(BlockKind::Executable, "Question 3.1: CHALLENGE map"));
        assert!(!predicate.matches(BlockKind::Executable, "Question 3.1: progression"));
        assert!(!predicate.matches(BlockKind::Executable, "challenge without marker"));
    }

    #[test]
    fn empty_predicate_never_matches() {
        let predicate = Predicate::contains_any(Vec::<String>::new());
        assert!(!predicate.matches(BlockKind::Narrative, "anything"));
    }

    #[test]
    fn from_spec_rejects_bad_pattern() {
        let spec = RuleSpec {
            role: role("q"),
            precedence: 1,
            kind: None,
            any: vec![],
            all: vec![],
            pattern: Some("(unclosed".into()),
        };
        let err = ClassificationRule::from_spec(&spec).unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn from_spec_rejects_rule_without_conditions() {
        let spec = RuleSpec {
            role: role("q"),
            precedence: 1,
            kind: Some(BlockKind::Narrative),
            any: vec![],
            all: vec![],
            pattern: None,
        };
        assert!(ClassificationRule::from_spec(&spec).is_err());
    }
}
