//! Compiled repair profiles.

use tracing::debug;

use nbmend_shared::{
    BlockKind, NbmendError, RepairProfile, Result, builtin_profile, builtin_profile_named,
};

use crate::assembler::{AssemblyOptions, SectionSchema};
use crate::classifier::BlockClassifier;

/// Everything [`crate::assemble`] needs, built once from a [`RepairProfile`].
#[derive(Debug, Clone)]
pub struct RepairPlan {
    pub name: String,
    pub classifier: BlockClassifier,
    pub schema: SectionSchema,
    pub options: AssemblyOptions,
}

impl RepairPlan {
    /// Compile a profile, rejecting any that could not reassemble stably.
    ///
    /// A synthesized header must classify back to its own header role,
    /// otherwise a second repair would drop or misplace it.
    pub fn compile(profile: &RepairProfile) -> Result<Self> {
        profile.validate()?;

        let classifier = BlockClassifier::from_specs(&profile.rules)?;
        let schema = SectionSchema::from_specs(&profile.sections)?;

        for section in schema.sections() {
            let role = classifier.classify_content(BlockKind::Narrative, &section.default_title);
            if role != section.header_role {
                return Err(NbmendError::config(format!(
                    "default_title of section '{}' classifies as '{role}'",
                    section.header_role
                )));
            }
        }

        debug!(
            profile = %profile.name,
            rules = classifier.rules().len(),
            sections = schema.sections().len(),
            "compiled repair plan"
        );

        Ok(Self {
            name: profile.name.clone(),
            classifier,
            schema,
            options: AssemblyOptions::from(&profile.assembly),
        })
    }

    /// The plan for the profile embedded in the binary.
    pub fn builtin() -> Result<Self> {
        Self::compile(&builtin_profile()?)
    }

    /// The plan for a built-in profile chosen by name.
    pub fn builtin_named(name: &str) -> Result<Self> {
        Self::compile(&builtin_profile_named(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::assemble;
    use nbmend_notebook::Document;
    use nbmend_shared::{builtin_profile_names, parse_profile};
    use serde_json::{Value, json};

    fn md(text: &str) -> Value {
        json!({ "cell_type": "markdown", "metadata": {}, "source": text })
    }

    fn code(text: &str) -> Value {
        json!({
            "cell_type": "code",
            "execution_count": null,
            "metadata": {},
            "outputs": [],
            "source": text
        })
    }

    #[test]
    fn builtin_plan_compiles() {
        let plan = RepairPlan::builtin().expect("builtin plan");
        assert!(!plan.schema.sections().is_empty());
        assert!(plan.options.synthesize_missing_headers);
    }

    #[test]
    fn every_builtin_plan_compiles() {
        for name in builtin_profile_names() {
            let plan = RepairPlan::builtin_named(name).expect("builtin plan");
            assert_eq!(plan.name, name);
        }
        assert!(RepairPlan::builtin_named("nope").is_err());
    }

    #[test]
    fn structure_profile_restores_prompt_then_code_order() {
        let plan = RepairPlan::builtin_named("deep-dive-structure").expect("plan");
        let source = Document::from_json(json!({
            "cells": [
                code("# Question 2.4: What production patterns emerge?\npatterns = {}"),
                code("# Question 2.2: What are the 6 core user requirement categories?\ncore = 6"),
                md("## 2. Exploring the Core Patterns"),
                md("### Question 2.4: What production patterns exist?"),
                code("# Question 2.1: What specific onboarding challenges appear?\nchallenges = []"),
                md("### Question 2.2: What are the 6 core user requirement categories?"),
                md("# Scenario 1 Deep Dive Analysis - Iteration 1"),
                code("# Code to analyze"),
                code("# Question 2.3: What type of education dominates?\nedu = {}"),
                md("## 1. Understanding Our Measurements"),
                code("# Question 1.1: calculate these percentages\nshare = 0.46"),
                md("### Question 1.1: What share of issues are onboarding?"),
            ],
            "metadata": {},
            "nbformat": 4,
            "nbformat_minor": 5
        }))
        .expect("document");

        let result = assemble(&source, &plan.schema, &plan.classifier, &plan.options);
        let roles: Vec<String> = result
            .document
            .blocks()
            .iter()
            .map(|block| plan.classifier.classify(block).to_string())
            .collect();

        assert_eq!(
            roles,
            vec![
                "title",
                "section-1",
                "q1.1-prompt",
                "q1.1-code",
                "section-2",
                "q2.1-prompt",
                "q2.1-code",
                "q2.2-prompt",
                "q2.2-code",
                "q2.3-prompt",
                "q2.3-code",
                "q2.4-prompt",
                "q2.4-code",
                "section-3",
                "section-4",
                "section-5",
                "executive-summary",
            ]
        );

        let q21 = &result.document.blocks()[5];
        assert!(q21.is_synthesized());
        assert!(q21.content().starts_with("### Question 2.1: What specific onboarding"));
        assert_eq!(result.synthesized_count, 6);
        assert_eq!(result.dropped.len(), 1);
    }

    #[test]
    fn rejects_title_that_does_not_classify_as_header() {
        let profile = parse_profile(
            r##"
[[rules]]
role = "intro"
precedence = 1
kind = "narrative"
any = ["# Introduction"]

[[sections]]
header_role = "intro"
default_title = "# Intro"
"##,
        )
        .expect("profile parses");

        let err = RepairPlan::compile(&profile).unwrap_err();
        assert!(err.to_string().contains("classifies as 'unclassified'"));
    }

    #[test]
    fn assembly_switches_carry_over() {
        let profile = parse_profile(
            r##"
[assembly]
synthesize_missing_headers = false

[[rules]]
role = "intro"
precedence = 1
any = ["# Intro"]

[[sections]]
header_role = "intro"
default_title = "# Intro"
"##,
        )
        .expect("profile parses");

        let plan = RepairPlan::compile(&profile).expect("compile");
        assert!(!plan.options.synthesize_missing_headers);
        assert!(plan.options.report_missing_content);
    }
}
