use serde::Serialize;

use super::catalog::{
    INCOME_STREAMS, INVESTIBLE_SURPLUS, NET_WORTH, TOTAL_ANNUAL_EXPENSES, TOTAL_ANNUAL_INCOME,
    TOTAL_ANNUAL_INVESTMENT, TOTAL_CURRENT_ASSETS, TOTAL_CURRENT_INVESTMENT, TOTAL_LIABILITIES,
    TOTAL_MONTHLY_EXPENSES, TOTAL_YEARLY_EXPENSES, annual_total_key, current_total_key,
    income_annual_key,
};
use super::frequency::format_amount;
use super::types::{FormRecord, Group};

/// The already-settled lower-layer figures the cross-section totals read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrossSectionInputs {
    pub income_annual_amounts: Vec<f64>,
    pub monthly_expenses: f64,
    pub yearly_expenses: f64,
    pub liabilities: f64,
    pub current_assets: f64,
    pub group_annual_totals: Vec<f64>,
    pub group_current_totals: Vec<f64>,
}

impl CrossSectionInputs {
    pub fn read(record: &FormRecord) -> Self {
        Self {
            income_annual_amounts: INCOME_STREAMS
                .iter()
                .map(|(prefix, _)| record.amount(&income_annual_key(prefix)))
                .collect(),
            monthly_expenses: record.amount(TOTAL_MONTHLY_EXPENSES),
            yearly_expenses: record.amount(TOTAL_YEARLY_EXPENSES),
            liabilities: record.amount(TOTAL_LIABILITIES),
            current_assets: record.amount(TOTAL_CURRENT_ASSETS),
            group_annual_totals: Group::INVESTMENTS
                .iter()
                .map(|g| record.amount(&annual_total_key(*g)))
                .collect(),
            group_current_totals: Group::INVESTMENTS
                .iter()
                .map(|g| record.amount(&current_total_key(*g)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossSection {
    pub total_annual_income: f64,
    pub total_annual_expenses: f64,
    pub investible_surplus: f64,
    pub total_current_assets: f64,
    pub total_liabilities: f64,
    pub net_worth: f64,
    pub total_annual_investment: f64,
    pub total_current_investment: f64,
}

impl CrossSection {
    pub fn compute(inputs: &CrossSectionInputs) -> Self {
        let total_annual_income: f64 = inputs.income_annual_amounts.iter().sum();
        // liabilities are part of the annual outflow, not a separate deduction
        let total_annual_expenses =
            inputs.monthly_expenses * 12.0 + inputs.yearly_expenses + inputs.liabilities;

        Self {
            total_annual_income,
            total_annual_expenses,
            investible_surplus: total_annual_income - total_annual_expenses,
            total_current_assets: inputs.current_assets,
            total_liabilities: inputs.liabilities,
            net_worth: inputs.current_assets - inputs.liabilities,
            total_annual_investment: inputs.group_annual_totals.iter().sum(),
            total_current_investment: inputs.group_current_totals.iter().sum(),
        }
    }

    /// Record entries owned by this layer.
    pub fn entries(&self) -> Vec<(String, String)> {
        [
            (TOTAL_ANNUAL_INCOME, self.total_annual_income),
            (TOTAL_ANNUAL_EXPENSES, self.total_annual_expenses),
            (INVESTIBLE_SURPLUS, self.investible_surplus),
            (NET_WORTH, self.net_worth),
            (TOTAL_ANNUAL_INVESTMENT, self.total_annual_investment),
            (TOTAL_CURRENT_INVESTMENT, self.total_current_investment),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), format_amount(value)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert_eq, proptest};

    #[test]
    fn net_worth_is_assets_minus_liabilities() {
        let totals = CrossSection::compute(&CrossSectionInputs {
            current_assets: 500_000.0,
            liabilities: 150_000.0,
            ..CrossSectionInputs::default()
        });
        assert_eq!(totals.net_worth, 350_000.0);
    }

    #[test]
    fn net_worth_goes_negative_when_liabilities_exceed_assets() {
        let totals = CrossSection::compute(&CrossSectionInputs {
            current_assets: 100_000.0,
            liabilities: 250_000.0,
            ..CrossSectionInputs::default()
        });
        assert_eq!(totals.net_worth, -150_000.0);
        assert!(
            totals
                .entries()
                .contains(&(NET_WORTH.to_string(), "-150000".to_string()))
        );
    }

    #[test]
    fn surplus_is_income_minus_expenses_including_liabilities() {
        // 40,000 a month plus 50,000 a year plus 120,000 outstanding = 650,000
        let totals = CrossSection::compute(&CrossSectionInputs {
            income_annual_amounts: vec![600_000.0, 120_000.0, 50_000.0, 30_000.0],
            monthly_expenses: 40_000.0,
            yearly_expenses: 50_000.0,
            liabilities: 120_000.0,
            ..CrossSectionInputs::default()
        });
        assert_eq!(totals.total_annual_income, 800_000.0);
        assert_eq!(totals.total_annual_expenses, 650_000.0);
        assert_eq!(totals.investible_surplus, 150_000.0);
    }

    #[test]
    fn empty_record_yields_zero_totals() {
        let totals = CrossSection::compute(&CrossSectionInputs::read(&FormRecord::new()));
        assert_eq!(totals, CrossSection::default());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_net_worth_identity(assets in 0u64..50_000_000, liabilities in 0u64..50_000_000) {
            let totals = CrossSection::compute(&CrossSectionInputs {
                current_assets: assets as f64,
                liabilities: liabilities as f64,
                ..CrossSectionInputs::default()
            });
            prop_assert_eq!(
                totals.net_worth,
                totals.total_current_assets - totals.total_liabilities
            );
            prop_assert_eq!(totals.net_worth, assets as f64 - liabilities as f64);
        }
    }
}
