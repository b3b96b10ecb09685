//! Compatibility with records written under older field-naming conventions.
//!
//! The typed catalog is the source of truth for every row it knows about. The
//! pattern rules here only exist so that open-ended or legacy-named keys still
//! reach the right totals.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::types::FormRecord;

/// Known spellings of the "current value" suffix, in order of preference.
pub const CURRENT_SPELLINGS: [&str; 6] = [
    "_current",
    "Current",
    "_currentValue",
    "CurrentValue",
    "_current_value",
    "AssetsValue",
];

/// Outstanding-liability keys of the older camelCase layout.
pub const LEGACY_LIABILITY_KEYS: [&str; 9] = [
    "vehicleLoanOutstanding",
    "personalLoanOutstanding",
    "consumerLoanOutstanding",
    "homeLoanOutstanding",
    "creditCardOutstanding",
    "otherLoanOutstanding",
    "creditCardDue",
    "creditCard",
    "otherLoan",
];

/// Totals the older layout pushed into the record under names that are no
/// longer derived. They are dropped on import so they cannot go stale.
const LEGACY_TOTAL_KEYS: [&str; 4] = [
    "liabilitiesTotal",
    "totalIncome",
    "totalExpenses",
    "totalInvestmentValue",
];

const LEGACY_POLICIES: [&str; 3] = ["endowment", "moneyback", "ulip"];

pub static CANONICAL_LIABILITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^liability_[a-z0-9]+_amount$").expect("canonical liability pattern is valid")
});

pub static LEGACY_LIABILITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(outstanding|outstandingamount|due)$")
        .expect("legacy liability pattern is valid")
});

/// Splits `key` into its entity stem and the rank of the matching spelling.
/// The longest matching spelling wins; an empty stem is not a match.
pub fn match_suffix<'a>(key: &'a str, spellings: &[&str]) -> Option<(&'a str, usize)> {
    spellings
        .iter()
        .enumerate()
        .filter(|(_, spelling)| key.len() > spelling.len() && key.ends_with(*spelling))
        .max_by_key(|(_, spelling)| spelling.len())
        .map(|(rank, spelling)| (&key[..key.len() - spelling.len()], rank))
}

/// The first spelling of `stem` + suffix present in the record.
pub fn resolve_spelling(record: &FormRecord, stem: &str, spellings: &[&str]) -> Option<String> {
    spellings
        .iter()
        .map(|spelling| format!("{stem}{spelling}"))
        .find(|key| record.contains(key))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Migration {
    pub from: String,
    pub to: Option<String>,
}

/// Rewrites legacy keys into the canonical layout in place.
///
/// Insurance policy keys (`endowmentInvestment`, `ulipFreq`, ...) move onto
/// their canonical key when that key is missing or blank, so the policies are
/// annualized like every other row. A legacy key whose canonical key already
/// holds a value is dropped. Either way the legacy key is gone afterwards, so a
/// policy never reaches a total under two names. Stale legacy totals are dropped.
pub fn migrate(record: &mut FormRecord) -> Vec<Migration> {
    let mut migrations = Vec::new();

    for policy in LEGACY_POLICIES {
        for (legacy_suffix, attribute) in [
            ("Investment", "value"),
            ("Freq", "freq"),
            ("Current", "current"),
        ] {
            let from = format!("{policy}{legacy_suffix}");
            let Some(value) = record.remove(&from) else {
                continue;
            };
            let to = format!("insurance_{policy}_{attribute}");
            if record.text(&to).trim().is_empty() {
                record.write(&to, value);
                migrations.push(Migration {
                    from,
                    to: Some(to),
                });
            } else {
                migrations.push(Migration { from, to: None });
            }
        }

        let stale_annual = format!("{policy}Annual");
        if record.remove(&stale_annual).is_some() {
            migrations.push(Migration {
                from: stale_annual,
                to: None,
            });
        }
    }

    for key in LEGACY_TOTAL_KEYS {
        if record.remove(key).is_some() {
            migrations.push(Migration {
                from: key.to_string(),
                to: None,
            });
        }
    }

    if !migrations.is_empty() {
        debug!(count = migrations.len(), "migrated legacy form keys");
    }
    migrations
}
