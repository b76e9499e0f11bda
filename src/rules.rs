// 🏷️ BIC Override Rules - Rules as Data
// Country-specific corrections applied to a bank entry after a successful lookup

use crate::entry::{normalize_bic, BankEntry};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// Predicate over the fetched entry's bank code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BankCodeCondition {
    /// `value` sits at `start` (0-indexed) and the code is at least `min_len` long
    SliceEquals {
        start: usize,
        value: String,
        #[serde(default)]
        min_len: usize,
    },

    /// Code starts with `value`
    Prefix { value: String },

    /// Code equals `value`
    Exact { value: String },
}

impl BankCodeCondition {
    pub fn matches(&self, bank_code: &str) -> bool {
        match self {
            BankCodeCondition::SliceEquals { start, value, min_len } => {
                let Some(end) = start.checked_add(value.len()) else {
                    return false;
                };
                bank_code.len() >= *min_len && bank_code.get(*start..end) == Some(value.as_str())
            }
            BankCodeCondition::Prefix { value } => bank_code.starts_with(value.as_str()),
            BankCodeCondition::Exact { value } => bank_code == value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BicOverrideRule {
    /// Rule ID for tracking
    pub id: String,

    /// Country the rule applies to (ISO 3166-1 alpha-2)
    pub country_code: String,

    pub condition: BankCodeCondition,

    /// Replacement BIC
    pub bic: String,

    pub description: Option<String>,
}

impl BicOverrideRule {
    pub fn matches(&self, entry: &BankEntry) -> bool {
        entry.country_code == self.country_code && self.condition.matches(&entry.bank_code)
    }

    /// Commerzbank publishes branch BICs under its "xxx400xx" sort codes, but
    /// payments route through the head office.
    pub fn commerzbank() -> Self {
        BicOverrideRule {
            id: "de-commerzbank-400".to_string(),
            country_code: "DE".to_string(),
            condition: BankCodeCondition::SliceEquals {
                start: 3,
                value: "400".to_string(),
                min_len: 7,
            },
            bic: "COBADEFFXXX".to_string(),
            description: Some("Commerzbank sort codes route to the head office BIC".to_string()),
        }
    }
}

// ============================================================================
// RULE SET
// ============================================================================

/// Ordered override rules. The first matching rule in registration order
/// wins; at most one rule is applied per entry.
#[derive(Debug, Clone, Default)]
pub struct BicOverrides {
    rules: Vec<BicOverrideRule>,
}

impl BicOverrides {
    /// Create an empty rule set
    pub fn new() -> Self {
        BicOverrides { rules: Vec::new() }
    }

    /// The rules shipped with the resolver
    pub fn standard() -> Self {
        BicOverrides::from_rules(vec![BicOverrideRule::commerzbank()])
    }

    /// Load rules from a JSON array, keeping file order
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read override rules file: {:?}", path.as_ref()))?;

        let rules: Vec<BicOverrideRule> = serde_json::from_str(&content)
            .context("Failed to parse override rules JSON")?;

        Ok(BicOverrides::from_rules(rules))
    }

    pub fn from_rules(rules: Vec<BicOverrideRule>) -> Self {
        let rules = rules.into_iter().map(normalize).collect();
        BicOverrides { rules }
    }

    /// Append a rule; it ranks below every rule already registered
    pub fn add_rule(&mut self, rule: BicOverrideRule) {
        self.rules.push(normalize(rule));
    }

    /// First matching rule, if any
    pub fn find_match(&self, entry: &BankEntry) -> Option<&BicOverrideRule> {
        self.rules.iter().find(|rule| rule.matches(entry))
    }

    /// Rewrite the entry's BIC with the first matching rule.
    /// Returns the rule that fired.
    pub fn apply(&self, entry: &mut BankEntry) -> Option<&BicOverrideRule> {
        let rule = self.find_match(entry)?;
        entry.bic = rule.bic.clone();
        Some(rule)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[BicOverrideRule] {
        &self.rules
    }
}

/// Country codes compare uppercase, BICs in registry form
fn normalize(mut rule: BicOverrideRule) -> BicOverrideRule {
    rule.country_code = rule.country_code.to_ascii_uppercase();
    rule.bic = normalize_bic(&rule.bic);
    rule
}

// ============================================================================
// TESTS
// ============================================================================
