use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::frequency::{parse_amount, parse_signed};

/// The single mutable mapping from field key to its stored string value.
///
/// Keys are kept ordered so snapshots and reports are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormRecord {
    fields: BTreeMap<String, String>,
}

impl FormRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Stored value read as a non-negative amount; missing keys read as zero.
    pub fn amount(&self, key: &str) -> f64 {
        self.get(key).map_or(0.0, parse_amount)
    }

    /// Stored value read as a signed figure; missing keys read as zero.
    pub fn signed(&self, key: &str) -> f64 {
        self.get(key).map_or(0.0, parse_signed)
    }

    pub fn text(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Inserts `value` unless the stored value is already identical.
    /// Returns the change when a write happened.
    pub(crate) fn write(&mut self, key: &str, value: String) -> Option<FieldChange> {
        let previous = self.fields.get(key);
        if previous.map(String::as_str) == Some(value.as_str()) {
            return None;
        }
        let previous = self.fields.insert(key.to_string(), value.clone());
        Some(FieldChange {
            key: key.to_string(),
            previous,
            value,
        })
    }

    /// Applies a batch computed against one consistent view of the record.
    /// Entries equal to the stored value are skipped.
    pub(crate) fn apply_batch(&mut self, batch: Vec<(String, String)>) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        for (key, value) in batch {
            if let Some(change) = self.write(&key, value) {
                changes.push(change);
            }
        }
        changes
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.fields
    }
}

impl From<BTreeMap<String, String>> for FormRecord {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub key: String,
    pub previous: Option<String>,
    pub value: String,
}

/// Dependency layer of a derived field. A field only reads fields of a lower layer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    Annualized,
    Aggregate,
    CrossSection,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Annualized, Layer::Aggregate, Layer::CrossSection];
}

/// An entity group whose rows share a key prefix.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Group {
    Debt,
    Equity,
    Physical,
    Insurance,
    Liability,
}

impl Group {
    pub const ALL: [Group; 5] = [
        Group::Debt,
        Group::Equity,
        Group::Physical,
        Group::Insurance,
        Group::Liability,
    ];

    pub const INVESTMENTS: [Group; 4] =
        [Group::Debt, Group::Equity, Group::Physical, Group::Insurance];

    pub fn prefix(self) -> &'static str {
        match self {
            Group::Debt => "debt",
            Group::Equity => "equity",
            Group::Physical => "physical",
            Group::Insurance => "insurance",
            Group::Liability => "liability",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Group::Debt => "Debt Investments",
            Group::Equity => "Equity Investments",
            Group::Physical => "Physical Assets",
            Group::Insurance => "Insurance Policies",
            Group::Liability => "Liabilities",
        }
    }

    pub fn is_investment(self) -> bool {
        !matches!(self, Group::Liability)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for Group {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .into_iter()
            .find(|g| g.prefix().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FormError::UnknownGroup(s.to_string()))
    }
}

/// One instrument inside a group, e.g. `debt_fd` or `liability_home`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub group: Group,
    pub slug: String,
    pub label: String,
}

impl Row {
    pub fn stem(&self) -> String {
        format!("{}_{}", self.group.prefix(), self.slug)
    }

    pub fn key(&self, attribute: &str) -> String {
        format!("{}_{}_{}", self.group.prefix(), self.slug, attribute)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Goal {
    pub name: String,
    pub category: String,
    pub amount: String,
    pub years: String,
    pub priority: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalField {
    Name,
    Category,
    Amount,
    Years,
    Priority,
}

impl FromStr for GoalField {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(GoalField::Name),
            "category" => Ok(GoalField::Category),
            "amount" => Ok(GoalField::Amount),
            "years" => Ok(GoalField::Years),
            "priority" => Ok(GoalField::Priority),
            _ => Err(FormError::UnknownGoalField(s.to_string())),
        }
    }
}

impl Goal {
    pub fn set(&mut self, field: GoalField, value: String) {
        match field {
            GoalField::Name => self.name = value,
            GoalField::Category => self.category = value,
            GoalField::Amount => self.amount = value,
            GoalField::Years => self.years = value,
            GoalField::Priority => self.priority = value,
        }
    }

    pub fn target_amount(&self) -> f64 {
        parse_amount(&self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalSummary {
    pub total_goals: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub total_target_amount: f64,
}

impl GoalSummary {
    pub fn from_goals(goals: &[Goal]) -> Self {
        let priority_count = |wanted: &str| {
            goals
                .iter()
                .filter(|g| g.priority.trim().eq_ignore_ascii_case(wanted))
                .count()
        };
        Self {
            total_goals: goals.len(),
            high_priority: priority_count("High"),
            medium_priority: priority_count("Medium"),
            total_target_amount: goals.iter().map(Goal::target_amount).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("field key must not be empty")]
    EmptyKey,

    #[error("`{0}` is a derived field and cannot be edited")]
    ReadOnlyField(String),

    #[error("no goal at index {0}")]
    UnknownGoal(usize),

    #[error("unknown goal field `{0}`")]
    UnknownGoalField(String),

    #[error("unknown entity group `{0}`")]
    UnknownGroup(String),

    #[error("row slug `{0}` must be non-empty lowercase ASCII letters or digits")]
    InvalidRowSlug(String),

    #[error("row `{slug}` already exists in group {group}")]
    DuplicateRow { group: Group, slug: String },

    #[error("row `{slug}` does not exist in group {group}")]
    UnknownRow { group: Group, slug: String },

    #[error("recalculation did not settle within {passes} passes")]
    NotConverged { passes: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_skips_identical_values() {
        let mut record = FormRecord::new();
        assert!(record.write("salary", "50000".to_string()).is_some());
        assert!(record.write("salary", "50000".to_string()).is_none());

        let change = record
            .write("salary", "60000".to_string())
            .expect("changed value is written");
        assert_eq!(change.previous.as_deref(), Some("50000"));
        assert_eq!(change.value, "60000");
    }

    #[test]
    fn apply_batch_reports_only_real_changes() {
        let mut record: FormRecord = [("a", "1"), ("b", "2")].into_iter().collect();
        let changes = record.apply_batch(vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "3".to_string()),
            ("c".to_string(), "0".to_string()),
        ]);
        let keys: Vec<_> = changes.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(record.text("b"), "3");
    }

    #[test]
    fn remove_returns_the_stored_value() {
        let mut record: FormRecord = [("old", "1")].into_iter().collect();
        assert_eq!(record.remove("old").as_deref(), Some("1"));
        assert_eq!(record.remove("old"), None);
        assert!(record.is_empty());
    }

    #[test]
    fn group_parses_case_insensitively() {
        assert_eq!("Debt".parse::<Group>(), Ok(Group::Debt));
        assert_eq!(" liability ".parse::<Group>(), Ok(Group::Liability));
        assert!(matches!(
            "crypto".parse::<Group>(),
            Err(FormError::UnknownGroup(_))
        ));
    }

    #[test]
    fn goal_summary_counts_priorities_and_target() {
        let goals = vec![
            Goal {
                name: "House".into(),
                amount: "5000000".into(),
                priority: "High".into(),
                ..Goal::default()
            },
            Goal {
                name: "Car".into(),
                amount: "800000".into(),
                priority: "medium".into(),
                ..Goal::default()
            },
            Goal {
                name: "Trip".into(),
                amount: "n/a".into(),
                priority: "Low".into(),
                ..Goal::default()
            },
        ];
        let summary = GoalSummary::from_goals(&goals);
        assert_eq!(summary.total_goals, 3);
        assert_eq!(summary.high_priority, 1);
        assert_eq!(summary.medium_priority, 1);
        assert_eq!(summary.total_target_amount, 5_800_000.0);
    }
}
