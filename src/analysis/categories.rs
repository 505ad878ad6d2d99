use std::{borrow::Cow, collections::HashMap, sync::Arc};

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::time::serialize_seconds;

use super::{durations::WindowDuration, error::AnalysisError};

/// Category reported when no rule matches.
pub const UNCATEGORIZED: &str = "uncategorized";

/// A single user rule: when `pattern` matches the subject, it belongs to `category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub pattern: String,
    pub category: String,
}

impl CategoryRule {
    pub fn new(pattern: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    regex: Regex,
    category: Arc<str>,
}

/// Ordered, validated list of [CategoryRule]. The order is exactly the configured one and is
/// what gives first-match-wins its meaning, so it's never sorted or deduplicated.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CategoryRule>,
    compiled: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compiles every pattern. The first invalid one fails the whole set.
    pub fn new(rules: Vec<CategoryRule>) -> Result<Self, AnalysisError> {
        let compiled = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                Regex::new(&rule.pattern)
                    .map(|regex| CompiledRule {
                        regex,
                        category: rule.category.as_str().into(),
                    })
                    .map_err(|source| AnalysisError::Configuration {
                        index,
                        pattern: rule.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules, compiled })
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Returns the category of the first rule matching anywhere in `subject`, or [UNCATEGORIZED].
pub fn categorize<'a>(subject: &str, rules: &'a RuleSet) -> &'a str {
    rules
        .compiled
        .iter()
        .find(|rule| rule.regex.is_match(subject))
        .map(|rule| rule.category.as_ref())
        .unwrap_or(UNCATEGORIZED)
}

/// The string rules are matched against: the app name, followed by the window title when there
/// is one.
pub fn subject<'a>(app: &'a str, window_title: Option<&str>) -> Cow<'a, str> {
    match window_title.filter(|title| !title.is_empty()) {
        Some(title) => Cow::Owned(format!("{app} — {title}")),
        None => Cow::Borrowed(app),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryDuration {
    pub category: Arc<str>,
    #[serde(rename = "duration_seconds", serialize_with = "serialize_seconds")]
    pub duration: Duration,
}

/// Folds window durations into categories, longest first.
pub fn categorize_durations(windows: &[WindowDuration], rules: &RuleSet) -> Vec<CategoryDuration> {
    let mut positions = HashMap::<&str, usize>::new();
    let mut categories: Vec<CategoryDuration> = vec![];

    for window in windows {
        let category = categorize(
            &subject(&window.app, window.window_title.as_deref()),
            rules,
        );
        match positions.get(category) {
            Some(&position) => categories[position].duration += window.duration,
            None => {
                positions.insert(category, categories.len());
                categories.push(CategoryDuration {
                    category: category.into(),
                    duration: window.duration,
                });
            }
        }
    }

    categories.sort_by(|a, b| b.duration.cmp(&a.duration));
    categories
}

/// Time spent in any of the `focus` categories.
pub fn focus_duration(categories: &[CategoryDuration], focus: &[String]) -> Duration {
    categories
        .iter()
        .filter(|v| focus.iter().any(|f| f.as_str() == v.category.as_ref()))
        .fold(Duration::zero(), |total, v| total + v.duration)
}
