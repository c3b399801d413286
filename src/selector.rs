//! Selector matching: which cron jobs a monitor covers (spec §3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Operators for label-expression matching.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum ExpressionOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A single `matchExpressions` entry.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct LabelExpression {
    pub key: String,
    pub operator: ExpressionOperator,
    #[serde(default)]
    pub values: Vec<String>,
}

impl LabelExpression {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self.operator {
            ExpressionOperator::Exists => labels.contains_key(&self.key),
            ExpressionOperator::DoesNotExist => !labels.contains_key(&self.key),
            ExpressionOperator::In => labels
                .get(&self.key)
                .is_some_and(|v| self.values.iter().any(|want| want == v)),
            ExpressionOperator::NotIn => !labels
                .get(&self.key)
                .is_some_and(|v| self.values.iter().any(|want| want == v)),
        }
    }
}

/// Triple `(matchNames, matchLabels, matchExpressions)` (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema, PartialEq, Eq)]
pub struct Selector {
    #[serde(default, rename = "matchNames")]
    pub match_names: Vec<String>,

    #[serde(default, rename = "matchLabels")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(default, rename = "matchExpressions")]
    pub match_expressions: Vec<LabelExpression>,
}

impl Selector {
    /// A cron job matches iff (names empty or name listed) AND (all labels
    /// match) AND (all expressions satisfied).
    pub fn matches(&self, name: &str, labels: &BTreeMap<String, String>) -> bool {
        if !self.match_names.is_empty() && !self.match_names.iter().any(|n| n == name) {
            return false;
        }

        for (key, value) in &self.match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }

        self.match_expressions.iter().all(|expr| expr.matches(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_selector_matches_everything() {
        let selector = Selector::default();
        assert!(selector.matches("anything", &labels(&[])));
    }

    #[test]
    fn match_names_restricts_to_listed_names() {
        let selector = Selector {
            match_names: vec!["backup".into(), "cleanup".into()],
            ..Default::default()
        };
        assert!(selector.matches("backup", &labels(&[])));
        assert!(!selector.matches("other", &labels(&[])));
    }

    #[test]
    fn match_labels_requires_exact_value() {
        let selector = Selector {
            match_labels: [("team".to_string(), "platform".to_string())].into(),
            ..Default::default()
        };
        assert!(selector.matches("x", &labels(&[("team", "platform")])));
        assert!(!selector.matches("x", &labels(&[("team", "other")])));
        assert!(!selector.matches("x", &labels(&[])));
    }

    #[test]
    fn in_operator() {
        let selector = Selector {
            match_expressions: vec![LabelExpression {
                key: "tier".into(),
                operator: ExpressionOperator::In,
                values: vec!["critical".into(), "high".into()],
            }],
            ..Default::default()
        };
        assert!(selector.matches("x", &labels(&[("tier", "critical")])));
        assert!(!selector.matches("x", &labels(&[("tier", "low")])));
    }

    #[test]
    fn exists_and_does_not_exist() {
        let exists = Selector {
            match_expressions: vec![LabelExpression {
                key: "canary".into(),
                operator: ExpressionOperator::Exists,
                values: vec![],
            }],
            ..Default::default()
        };
        assert!(exists.matches("x", &labels(&[("canary", "true")])));
        assert!(!exists.matches("x", &labels(&[])));

        let does_not_exist = Selector {
            match_expressions: vec![LabelExpression {
                key: "canary".into(),
                operator: ExpressionOperator::DoesNotExist,
                values: vec![],
            }],
            ..Default::default()
        };
        assert!(does_not_exist.matches("x", &labels(&[])));
        assert!(!does_not_exist.matches("x", &labels(&[("canary", "true")])));
    }

    #[test]
    fn all_conditions_must_hold() {
        let selector = Selector {
            match_names: vec!["backup".into()],
            match_labels: [("team".to_string(), "platform".to_string())].into(),
            match_expressions: vec![LabelExpression {
                key: "tier".into(),
                operator: ExpressionOperator::NotIn,
                values: vec!["low".into()],
            }],
        };
        assert!(selector.matches(
            "backup",
            &labels(&[("team", "platform"), ("tier", "high")])
        ));
        assert!(!selector.matches(
            "backup",
            &labels(&[("team", "platform"), ("tier", "low")])
        ));
        assert!(!selector.matches(
            "other",
            &labels(&[("team", "platform"), ("tier", "high")])
        ));
    }
}
