//! Deciding which changes to report and which of them fail a check.

use crate::comparator::{Change, ChangeCode, Severity, compare};
use dbus_api::Node;
use serde::Serialize;
use std::collections::BTreeSet;

/// Entry in a warning list that stands for every category.
pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Unknown warning category or code ‘{0}’.")]
    Unknown(String),
}

fn is_known(entry: &str) -> bool {
    entry.parse::<Severity>().is_ok() || entry.parse::<ChangeCode>().is_ok()
}

/// Parse a comma-separated list of categories and change codes.
///
/// Whitespace around entries is ignored, `all` expands to every category and
/// unknown entries are rejected.
pub fn parse_list(text: &str) -> Result<BTreeSet<String>, FilterError> {
    let mut out = BTreeSet::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if entry == ALL {
            out.extend(Severity::ALL.iter().map(|s| s.as_str().to_string()));
        } else if is_known(entry) {
            out.insert(entry.to_string());
        } else {
            return Err(FilterError::Unknown(entry.to_string()));
        }
    }
    Ok(out)
}

fn all_categories() -> BTreeSet<String> {
    Severity::ALL.iter().map(|s| s.as_str().to_string()).collect()
}

/// Which changes get reported.
///
/// Entries are categories (`info`, `forwards-compatibility`,
/// `backwards-compatibility`) or individual change codes. A change is
/// reported if its category is enabled and neither its category nor its code
/// is disabled, or if its code is explicitly enabled and not disabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningFilter {
    pub enabled: BTreeSet<String>,
    pub disabled: BTreeSet<String>,
}

impl Default for WarningFilter {
    /// Everything enabled.
    fn default() -> Self {
        Self {
            enabled: all_categories(),
            disabled: BTreeSet::new(),
        }
    }
}

impl WarningFilter {
    /// Build a filter from comma-separated lists.
    pub fn parse(enabled: &str, disabled: &str) -> Result<Self, FilterError> {
        Ok(Self {
            enabled: parse_list(enabled)?,
            disabled: parse_list(disabled)?,
        })
    }

    pub fn is_enabled(&self, change: &Change) -> bool {
        let category = change.severity.as_str();
        let code = change.code.to_string();
        let category_on = self.enabled.contains(category)
            && !self.disabled.contains(category)
            && !self.disabled.contains(&code);
        let code_on = self.enabled.contains(&code) && !self.disabled.contains(&code);
        category_on || code_on
    }
}

/// Reporting filter plus the categories and codes that fail a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckPolicy {
    pub filter: WarningFilter,
    pub fatal: BTreeSet<String>,
}

impl Default for CheckPolicy {
    /// Report everything, fail on backwards-incompatible changes.
    fn default() -> Self {
        Self {
            filter: WarningFilter::default(),
            fatal: BTreeSet::from([Severity::BackwardsCompatibility.as_str().to_string()]),
        }
    }
}

impl CheckPolicy {
    pub fn is_fatal(&self, change: &Change) -> bool {
        self.fatal.contains(change.severity.as_str()) || self.fatal.contains(&change.code.to_string())
    }

    /// Filter `changes` and decide whether they pass.
    pub fn judge(&self, changes: Vec<Change>) -> CheckOutcome {
        let changes: Vec<Change> = changes
            .into_iter()
            .filter(|c| self.filter.is_enabled(c))
            .collect();
        let passed = !changes.iter().any(|c| self.is_fatal(c));
        CheckOutcome { passed, changes }
    }
}

/// Result of checking one old/new pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub passed: bool,
    /// Reported changes only.
    pub changes: Vec<Change>,
}

/// Compare `old` with `new` and judge the result under `policy`.
pub fn check(old: &Node, new: &Node, policy: &CheckPolicy) -> CheckOutcome {
    policy.judge(compare(old, new))
}
