use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::Serialize;

use super::catalog::{
    COVERAGE_KEYS, Catalog, MONTHLY_EXPENSE_KEYS, TOTAL_COVERAGE, TOTAL_CURRENT_ASSETS,
    TOTAL_LIABILITIES, TOTAL_MONTHLY_EXPENSES, TOTAL_MONTHLY_EXPENSES_ANNUALIZED,
    TOTAL_YEARLY_EXPENSES, YEARLY_EXPENSE_KEYS, annual_total_key, current_total_key,
};
use super::frequency::format_amount;
use super::legacy::{
    CANONICAL_LIABILITY, CURRENT_SPELLINGS, LEGACY_LIABILITY, LEGACY_LIABILITY_KEYS,
    match_suffix, resolve_spelling,
};
use super::types::{FormRecord, Group, Layer};

/// How the members of a total are addressed.
#[derive(Debug, Clone, Copy)]
pub enum Membership<'a> {
    /// A fixed list of keys.
    Keys(&'a [&'a str]),
    /// Every key ending in one of the spellings, one key per entity stem.
    Suffix(&'a [&'a str]),
    /// Every key matching the pattern.
    Pattern(&'a Regex),
}

/// Resolves the member keys of a total computed at `layer`.
///
/// Pattern and suffix scans skip derived keys at or above `layer`, which keeps
/// totals from ever reading themselves or anything above them.
pub fn members(
    record: &FormRecord,
    catalog: &Catalog,
    layer: Layer,
    membership: Membership<'_>,
) -> BTreeSet<String> {
    match membership {
        Membership::Keys(keys) => keys.iter().map(|k| k.to_string()).collect(),
        Membership::Suffix(spellings) => {
            let mut best: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
            for key in record.keys().filter(|k| catalog.readable_at(k, layer)) {
                let Some((stem, rank)) = match_suffix(key, spellings) else {
                    continue;
                };
                let preferred_present = best
                    .get(stem)
                    .is_some_and(|(existing, _)| *existing <= rank);
                if !preferred_present {
                    best.insert(stem, (rank, key));
                }
            }
            best.into_values().map(|(_, key)| key.to_string()).collect()
        }
        Membership::Pattern(pattern) => record
            .keys()
            .filter(|k| catalog.readable_at(k, layer) && pattern.is_match(k))
            .map(str::to_string)
            .collect(),
    }
}

/// Sum of the stored amounts of `keys`. A set cannot hold a key twice, so no
/// field is ever counted twice toward one total.
pub fn sum_keys(record: &FormRecord, keys: &BTreeSet<String>) -> f64 {
    keys.iter().map(|k| record.amount(k)).sum()
}

pub fn sum_members(
    record: &FormRecord,
    catalog: &Catalog,
    layer: Layer,
    membership: Membership<'_>,
) -> f64 {
    sum_keys(record, &members(record, catalog, layer, membership))
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LiabilityConvention {
    Canonical,
    Legacy,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiabilityTotal {
    pub amount: f64,
    pub convention: LiabilityConvention,
    pub members: Vec<String>,
}

/// Total outstanding liabilities.
///
/// The canonical `liability_*_amount` fields are used when they sum to anything
/// but zero. Only then are the legacy spellings consulted, so one record never
/// contributes through both conventions.
pub fn liability_total(record: &FormRecord, catalog: &Catalog) -> LiabilityTotal {
    let mut canonical: BTreeSet<String> = catalog
        .rows(Group::Liability)
        .iter()
        .map(|row| row.key("amount"))
        .collect();
    canonical.extend(members(
        record,
        catalog,
        Layer::Aggregate,
        Membership::Pattern(&CANONICAL_LIABILITY),
    ));
    let canonical_sum = sum_keys(record, &canonical);
    if canonical_sum != 0.0 {
        return LiabilityTotal {
            amount: canonical_sum,
            convention: LiabilityConvention::Canonical,
            members: present(record, canonical),
        };
    }

    let mut legacy = members(
        record,
        catalog,
        Layer::Aggregate,
        Membership::Keys(&LEGACY_LIABILITY_KEYS),
    );
    legacy.extend(members(
        record,
        catalog,
        Layer::Aggregate,
        Membership::Pattern(&LEGACY_LIABILITY),
    ));
    let legacy_sum = sum_keys(record, &legacy);
    if legacy_sum != 0.0 {
        return LiabilityTotal {
            amount: legacy_sum,
            convention: LiabilityConvention::Legacy,
            members: present(record, legacy),
        };
    }

    LiabilityTotal {
        amount: 0.0,
        convention: LiabilityConvention::None,
        members: Vec::new(),
    }
}

fn present(record: &FormRecord, keys: BTreeSet<String>) -> Vec<String> {
    keys.into_iter().filter(|k| record.contains(k)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTotal {
    pub group: Group,
    pub annual: f64,
    pub current: f64,
}

/// Annual and current totals of one investment group, addressed through its rows.
pub fn group_total(record: &FormRecord, catalog: &Catalog, group: Group) -> GroupTotal {
    let rows = catalog.rows(group);
    let annual = rows.iter().map(|row| record.amount(&row.key("annual"))).sum();
    let current = rows
        .iter()
        .filter_map(|row| resolve_spelling(record, &row.stem(), &CURRENT_SPELLINGS))
        .map(|key| record.amount(&key))
        .sum();
    GroupTotal {
        group,
        annual,
        current,
    }
}

/// Every group-level total, computed from raw and annualized fields only.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregates {
    pub monthly_expenses: f64,
    pub yearly_expenses: f64,
    pub coverage: f64,
    pub groups: Vec<GroupTotal>,
    pub liabilities: LiabilityTotal,
    pub current_assets: f64,
}

impl Aggregates {
    pub fn compute(record: &FormRecord, catalog: &Catalog) -> Self {
        let layer = Layer::Aggregate;
        Self {
            monthly_expenses: sum_members(
                record,
                catalog,
                layer,
                Membership::Keys(&MONTHLY_EXPENSE_KEYS),
            ),
            yearly_expenses: sum_members(
                record,
                catalog,
                layer,
                Membership::Keys(&YEARLY_EXPENSE_KEYS),
            ),
            coverage: sum_members(record, catalog, layer, Membership::Keys(&COVERAGE_KEYS)),
            groups: Group::INVESTMENTS
                .into_iter()
                .map(|group| group_total(record, catalog, group))
                .collect(),
            liabilities: liability_total(record, catalog),
            current_assets: sum_members(
                record,
                catalog,
                layer,
                Membership::Suffix(&CURRENT_SPELLINGS),
            ),
        }
    }

    pub fn monthly_expenses_annualized(&self) -> f64 {
        self.monthly_expenses * 12.0
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            (
                TOTAL_MONTHLY_EXPENSES.to_string(),
                format_amount(self.monthly_expenses),
            ),
            (
                TOTAL_MONTHLY_EXPENSES_ANNUALIZED.to_string(),
                format_amount(self.monthly_expenses_annualized()),
            ),
            (
                TOTAL_YEARLY_EXPENSES.to_string(),
                format_amount(self.yearly_expenses),
            ),
            (TOTAL_COVERAGE.to_string(), format_amount(self.coverage)),
            (
                TOTAL_LIABILITIES.to_string(),
                format_amount(self.liabilities.amount),
            ),
            (
                TOTAL_CURRENT_ASSETS.to_string(),
                format_amount(self.current_assets),
            ),
        ];
        for total in &self.groups {
            entries.push((annual_total_key(total.group), format_amount(total.annual)));
            entries.push((current_total_key(total.group), format_amount(total.current)));
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const ANNUAL_SPELLINGS: [&str; 4] = ["_annual", "Annual", "_annualValue", "AnnualValue"];

    fn record_of(pairs: &[(&str, &str)]) -> FormRecord {
        pairs.iter().copied().collect()
    }

    #[test]
    fn explicit_membership_ignores_missing_and_junk_values() {
        let record = record_of(&[("grocery", "8000"), ("gas", "abc"), ("wifi", "")]);
        let catalog = Catalog::default();
        let total = sum_members(
            &record,
            &catalog,
            Layer::Aggregate,
            Membership::Keys(&MONTHLY_EXPENSE_KEYS),
        );
        assert_eq!(total, 8_000.0);
    }

    #[test]
    fn suffix_membership_takes_one_spelling_per_entity() {
        let record = record_of(&[
            ("debt_fd_current", "100000"),
            ("debt_fdCurrent", "999999"),
            ("goldCurrentValue", "50000"),
            ("physicalAssetsValue", "25000"),
            ("debtCurrentTotal", "100000"),
        ]);
        let catalog = Catalog::default();
        let keys = members(
            &record,
            &catalog,
            Layer::Aggregate,
            Membership::Suffix(&CURRENT_SPELLINGS),
        );
        let keys: Vec<_> = keys.iter().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["debt_fd_current", "goldCurrentValue", "physicalAssetsValue"]
        );
    }

    #[test]
    fn scans_only_read_fields_below_their_own_layer() {
        let record = record_of(&[("debt_fd_annual", "12000"), ("debt_custom_annual", "500")]);
        let catalog = Catalog::default();

        let at_aggregate = members(
            &record,
            &catalog,
            Layer::Aggregate,
            Membership::Suffix(&ANNUAL_SPELLINGS),
        );
        assert_eq!(at_aggregate.len(), 2);

        let at_annualized = members(
            &record,
            &catalog,
            Layer::Annualized,
            Membership::Suffix(&ANNUAL_SPELLINGS),
        );
        let keys: Vec<_> = at_annualized.iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["debt_custom_annual"]);
    }

    #[test]
    fn canonical_liabilities_win_over_legacy() {
        let record = record_of(&[
            ("liability_home_amount", "100000"),
            ("liability_vehicle_amount", "50000"),
            ("homeLoanOutstanding", "400000"),
            ("creditCardDue", "20000"),
        ]);
        let total = liability_total(&record, &Catalog::default());
        assert_eq!(total.amount, 150_000.0);
        assert_eq!(total.convention, LiabilityConvention::Canonical);
        assert_eq!(
            total.members,
            vec!["liability_home_amount", "liability_vehicle_amount"]
        );
    }

    #[test]
    fn legacy_liabilities_used_only_when_canonical_sum_is_zero() {
        let record = record_of(&[
            ("liability_home_amount", "0"),
            ("homeLoanOutstanding", "400000"),
            ("creditCardDue", "20000"),
            ("otherLoan", "5000"),
            ("homeLoan", "35000"),
        ]);
        let total = liability_total(&record, &Catalog::default());
        assert_eq!(total.convention, LiabilityConvention::Legacy);
        // creditCardDue is both listed and pattern-matched; counted once.
        // homeLoan is a monthly EMI, not an outstanding balance.
        assert_eq!(total.amount, 425_000.0);
    }

    #[test]
    fn open_ended_liability_rows_are_picked_up_by_pattern() {
        let record = record_of(&[
            ("liability_home_amount", "100"),
            ("liability_boat_amount", "40"),
        ]);
        let total = liability_total(&record, &Catalog::default());
        assert_eq!(total.amount, 140.0);
    }

    #[test]
    fn empty_record_has_no_liabilities() {
        let total = liability_total(&FormRecord::new(), &Catalog::default());
        assert_eq!(total.amount, 0.0);
        assert_eq!(total.convention, LiabilityConvention::None);
        assert!(total.members.is_empty());
    }

    #[test]
    fn group_total_resolves_current_spellings_per_row() {
        let record = record_of(&[
            ("equity_shares_annual", "24000"),
            ("equity_shares_current", "300000"),
            ("equity_sipCurrent", "50000"),
            ("equity_sip_annual", "60000"),
        ]);
        let total = group_total(&record, &Catalog::default(), Group::Equity);
        assert_eq!(total.annual, 84_000.0);
        assert_eq!(total.current, 350_000.0);
    }

    #[test]
    fn monthly_expenses_of_twenty_thousand_annualize_to_two_forty() {
        let record = record_of(&[
            ("grocery", "8000"),
            ("electricity", "3000"),
            ("fuel", "4000"),
            ("homeLoan", "5000"),
        ]);
        let aggregates = Aggregates::compute(&record, &Catalog::default());
        assert_eq!(aggregates.monthly_expenses, 20_000.0);
        assert_eq!(aggregates.monthly_expenses_annualized(), 240_000.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_monthly_total_is_literal_sum(
            values in proptest::collection::vec(0u32..200_000, 22)
        ) {
            let record: FormRecord = MONTHLY_EXPENSE_KEYS
                .iter()
                .zip(&values)
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let aggregates = Aggregates::compute(&record, &Catalog::default());
            let expected: f64 = values.iter().map(|v| *v as f64).sum();
            prop_assert_eq!(aggregates.monthly_expenses, expected);
        }

        #[test]
        fn prop_liabilities_never_mix_conventions(
            canonical in proptest::collection::vec(0u32..1_000_000, 6),
            legacy in proptest::collection::vec(0u32..1_000_000, 6),
        ) {
            let slugs = ["vehicle", "personal", "consumer", "home", "credit", "other"];
            let mut pairs = Vec::new();
            for (slug, v) in slugs.iter().zip(&canonical) {
                pairs.push((format!("liability_{slug}_amount"), v.to_string()));
            }
            for (key, v) in LEGACY_LIABILITY_KEYS.iter().zip(&legacy) {
                pairs.push((key.to_string(), v.to_string()));
            }
            let record: FormRecord = pairs.into_iter().collect();
            let total = liability_total(&record, &Catalog::default());

            let canonical_sum: f64 = canonical.iter().map(|v| *v as f64).sum();
            let legacy_sum: f64 = legacy.iter().map(|v| *v as f64).sum();
            if canonical_sum > 0.0 {
                prop_assert_eq!(total.amount, canonical_sum);
                prop_assert_eq!(total.convention, LiabilityConvention::Canonical);
            } else {
                prop_assert_eq!(total.amount, legacy_sum);
            }
            prop_assert!(total.amount == canonical_sum || total.amount == legacy_sum);
        }
    }
}
