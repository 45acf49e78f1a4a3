//! Label selectors
//!
//! An unset selector selects everything. An empty selector also selects
//! everything. Requirements are AND-ed.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Selector over object labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// Set-based requirement on a single label key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: SelectorOperator,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

impl LabelSelector {
    /// Selector requiring each of the given labels
    pub fn with_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            match_labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            match_expressions: Vec::new(),
        }
    }

    /// Reject requirements that can never be evaluated
    pub fn validate(&self) -> Result<()> {
        for (key, _) in &self.match_labels {
            if key.is_empty() {
                return Err(CoreError::InvalidSelector("empty label key".into()));
            }
        }

        for req in &self.match_expressions {
            if req.key.is_empty() {
                return Err(CoreError::InvalidSelector("empty label key".into()));
            }

            match req.operator {
                SelectorOperator::In | SelectorOperator::NotIn if req.values.is_empty() => {
                    return Err(CoreError::InvalidSelector(format!(
                        "operator {:?} on '{}' requires values",
                        req.operator, req.key
                    )));
                }
                SelectorOperator::Exists | SelectorOperator::DoesNotExist
                    if !req.values.is_empty() =>
                {
                    return Err(CoreError::InvalidSelector(format!(
                        "operator {:?} on '{}' takes no values",
                        req.operator, req.key
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Whether the labels satisfy every requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let labels_match = self
            .match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v));

        labels_match
            && self.match_expressions.iter().all(|req| {
                let value = labels.get(&req.key);
                match req.operator {
                    SelectorOperator::In => value.map(|v| req.values.contains(v)).unwrap_or(false),
                    SelectorOperator::NotIn => value.map(|v| !req.values.contains(v)).unwrap_or(true),
                    SelectorOperator::Exists => value.is_some(),
                    SelectorOperator::DoesNotExist => value.is_none(),
                }
            })
    }
}

/// Evaluate an optional selector, treating `None` as "select everything"
pub fn selects(selector: Option<&LabelSelector>, labels: &BTreeMap<String, String>) -> bool {
    selector.map(|s| s.matches(labels)).unwrap_or(true)
}
