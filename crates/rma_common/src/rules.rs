//! Workflow rules v0.6.0 - SLA tables and assignment rules
//!
//! Rules are an immutable snapshot: the daemon loads them once (built-in
//! defaults, overridden by a TOML file when configured) and passes the
//! snapshot by reference into every evaluation. Nothing here mutates.
//!
//! Rules file: /etc/rma/rules.toml (path comes from the daemon config)

use crate::case::{CasePriority, RmaStage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// SLA Table
// ============================================================================

/// Allowed hours in one stage, per priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSla {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub critical: u32,
}

impl StageSla {
    pub const fn new(low: u32, medium: u32, high: u32, critical: u32) -> Self {
        Self { low, medium, high, critical }
    }

    pub fn hours(&self, priority: CasePriority) -> u32 {
        match priority {
            CasePriority::Low => self.low,
            CasePriority::Medium => self.medium,
            CasePriority::High => self.high,
            CasePriority::Critical => self.critical,
        }
    }
}

fn builtin_sla(stage: RmaStage) -> StageSla {
    match stage {
        RmaStage::UnderReview => StageSla::new(72, 48, 24, 8),
        RmaStage::SentToCds => StageSla::new(120, 72, 48, 24),
        RmaStage::CdsApproved => StageSla::new(72, 48, 24, 12),
        RmaStage::ReplacementShipped => StageSla::new(168, 120, 72, 48),
        RmaStage::ReplacementReceived => StageSla::new(120, 72, 48, 24),
        RmaStage::FaultyPartReturned => StageSla::new(168, 120, 72, 48),
        RmaStage::CdsConfirmedReturn => StageSla::new(72, 48, 24, 12),
        // Terminal stages have no clock
        RmaStage::Completed | RmaStage::Rejected => StageSla::new(0, 0, 0, 0),
    }
}

fn default_sla_table() -> BTreeMap<RmaStage, StageSla> {
    RmaStage::all()
        .iter()
        .filter(|s| !s.is_terminal())
        .map(|s| (*s, builtin_sla(*s)))
        .collect()
}

// ============================================================================
// Assignment Rules
// ============================================================================

/// One ownership rule. None fields are wildcards; the most specific
/// matching rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub assignee: String,
    /// Senior pool used when an escalated (High/Critical) case re-resolves
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_assignee: Option<String>,
}

impl AssignmentRule {
    fn matches(&self, product_category: &str, region: &str) -> bool {
        let product_ok = self
            .product_category
            .as_deref()
            .map(|p| p.eq_ignore_ascii_case(product_category))
            .unwrap_or(true);
        let region_ok = self
            .region
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(region))
            .unwrap_or(true);
        product_ok && region_ok
    }

    /// product+region beats product-only beats region-only beats catch-all
    fn specificity(&self) -> u8 {
        match (&self.product_category, &self.region) {
            (Some(_), Some(_)) => 3,
            (Some(_), None) => 2,
            (None, Some(_)) => 1,
            (None, None) => 0,
        }
    }
}

// ============================================================================
// Rules Snapshot
// ============================================================================

/// Immutable workflow rules snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRules {
    /// Hours allowed per stage and priority; stages missing from the file
    /// keep their built-in values
    #[serde(default = "default_sla_table")]
    pub sla: BTreeMap<RmaStage, StageSla>,

    /// Ownership rules, most specific match wins, declaration order breaks
    /// ties
    #[serde(default)]
    pub assignment: Vec<AssignmentRule>,

    /// Fallback owner when no rule matches; None leaves the case unassigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_assignee: Option<String>,
}

impl Default for WorkflowRules {
    fn default() -> Self {
        Self {
            sla: default_sla_table(),
            assignment: Vec::new(),
            default_assignee: None,
        }
    }
}

impl WorkflowRules {
    /// Load rules from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read rules file: {}", path.display()))?;
        let rules: WorkflowRules = toml::from_str(&raw)
            .with_context(|| format!("failed to parse rules file: {}", path.display()))?;
        Ok(rules)
    }

    /// SLA hours for a stage/priority pair. Terminal stages have no clock
    /// and report zero.
    pub fn sla_hours(&self, stage: RmaStage, priority: CasePriority) -> u32 {
        self.sla
            .get(&stage)
            .copied()
            .unwrap_or_else(|| builtin_sla(stage))
            .hours(priority)
    }

    /// Resolve an owner for a case. Precedence: product+region rule, then
    /// product-only, then region-only, then the default fallback. High and
    /// Critical cases take a rule's escalation pool when one is defined.
    pub fn resolve_assignee(
        &self,
        product_category: &str,
        region: &str,
        priority: CasePriority,
    ) -> Option<String> {
        let mut best: Option<&AssignmentRule> = None;
        for rule in &self.assignment {
            if !rule.matches(product_category, region) {
                continue;
            }
            // Strict > keeps the first declared rule on equal specificity
            if best.map(|b| rule.specificity() > b.specificity()).unwrap_or(true) {
                best = Some(rule);
            }
        }
        let best = best?;

        if priority >= CasePriority::High {
            if let Some(senior) = &best.escalation_assignee {
                return Some(senior.clone());
            }
        }
        Some(best.assignee.clone())
    }

    /// Resolve with the default fallback applied
    pub fn resolve_or_default(
        &self,
        product_category: &str,
        region: &str,
        priority: CasePriority,
    ) -> Option<String> {
        self.resolve_assignee(product_category, region, priority)
            .or_else(|| self.default_assignee.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn rules_with(assignment: Vec<AssignmentRule>) -> WorkflowRules {
        WorkflowRules {
            assignment,
            default_assignee: Some("rma-desk".to_string()),
            ..WorkflowRules::default()
        }
    }

    fn rule(
        product: Option<&str>,
        region: Option<&str>,
        assignee: &str,
        senior: Option<&str>,
    ) -> AssignmentRule {
        AssignmentRule {
            product_category: product.map(String::from),
            region: region.map(String::from),
            assignee: assignee.to_string(),
            escalation_assignee: senior.map(String::from),
        }
    }

    #[test]
    fn test_builtin_sla_matches_medium_review_window() {
        let rules = WorkflowRules::default();
        assert_eq!(rules.sla_hours(RmaStage::UnderReview, CasePriority::Medium), 48);
        assert_eq!(rules.sla_hours(RmaStage::UnderReview, CasePriority::High), 24);
    }

    #[test]
    fn test_terminal_stages_have_no_clock() {
        let rules = WorkflowRules::default();
        assert_eq!(rules.sla_hours(RmaStage::Completed, CasePriority::Critical), 0);
        assert_eq!(rules.sla_hours(RmaStage::Rejected, CasePriority::Low), 0);
    }

    #[test]
    fn test_precedence_product_and_region_first() {
        let rules = rules_with(vec![
            rule(None, Some("emea"), "emea-pool", None),
            rule(Some("projector"), None, "projector-pool", None),
            rule(Some("projector"), Some("emea"), "emea-av", None),
        ]);
        assert_eq!(
            rules.resolve_or_default("projector", "emea", CasePriority::Medium),
            Some("emea-av".to_string())
        );
    }

    #[test]
    fn test_precedence_product_over_region() {
        let rules = rules_with(vec![
            rule(None, Some("emea"), "emea-pool", None),
            rule(Some("projector"), None, "projector-pool", None),
        ]);
        assert_eq!(
            rules.resolve_or_default("projector", "emea", CasePriority::Medium),
            Some("projector-pool".to_string())
        );
    }

    #[test]
    fn test_region_rule_when_product_unknown() {
        let rules = rules_with(vec![
            rule(Some("projector"), None, "projector-pool", None),
            rule(None, Some("apac"), "apac-pool", None),
        ]);
        assert_eq!(
            rules.resolve_or_default("lamp", "apac", CasePriority::Low),
            Some("apac-pool".to_string())
        );
    }

    #[test]
    fn test_default_fallback_when_nothing_matches() {
        let rules = rules_with(vec![rule(Some("projector"), None, "projector-pool", None)]);
        assert_eq!(
            rules.resolve_or_default("lamp", "emea", CasePriority::Medium),
            Some("rma-desk".to_string())
        );
    }

    #[test]
    fn test_unassigned_without_default() {
        let rules = WorkflowRules::default();
        assert_eq!(rules.resolve_or_default("lamp", "emea", CasePriority::Medium), None);
    }

    #[test]
    fn test_senior_pool_on_high_priority() {
        let rules = rules_with(vec![rule(
            Some("projector"),
            Some("emea"),
            "emea-av",
            Some("emea-senior"),
        )]);
        assert_eq!(
            rules.resolve_or_default("projector", "emea", CasePriority::Medium),
            Some("emea-av".to_string())
        );
        assert_eq!(
            rules.resolve_or_default("projector", "emea", CasePriority::High),
            Some("emea-senior".to_string())
        );
        assert_eq!(
            rules.resolve_or_default("projector", "emea", CasePriority::Critical),
            Some("emea-senior".to_string())
        );
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let rules = rules_with(vec![rule(Some("Projector"), Some("EMEA"), "emea-av", None)]);
        assert_eq!(
            rules.resolve_or_default("projector", "emea", CasePriority::Medium),
            Some("emea-av".to_string())
        );
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let rules = rules_with(vec![
            rule(Some("projector"), Some("emea"), "first", None),
            rule(Some("projector"), Some("emea"), "second", None),
        ]);
        assert_eq!(
            rules.resolve_or_default("projector", "emea", CasePriority::Medium),
            Some("first".to_string())
        );
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
default_assignee = "rma-desk"

[sla.under_review]
low = 96
medium = 50
high = 20
critical = 6

[[assignment]]
product_category = "projector"
region = "emea"
assignee = "emea-av"
escalation_assignee = "emea-senior"
"#
        )
        .unwrap();

        let rules = WorkflowRules::load(file.path()).unwrap();
        assert_eq!(rules.sla_hours(RmaStage::UnderReview, CasePriority::Medium), 50);
        // Stages absent from the file keep built-in values
        assert_eq!(rules.sla_hours(RmaStage::SentToCds, CasePriority::Medium), 72);
        assert_eq!(rules.default_assignee.as_deref(), Some("rma-desk"));
        assert_eq!(
            rules.resolve_or_default("projector", "emea", CasePriority::Critical),
            Some("emea-senior".to_string())
        );
    }
}
