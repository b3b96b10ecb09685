use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use super::types::{FormError, FormRecord, Group, Layer, Row};

pub const PROFILE_KEYS: [&str; 18] = [
    "fullName",
    "dob",
    "contact",
    "email",
    "profession",
    "maritalStatus",
    "spouseName",
    "spouseDob",
    "child1Name",
    "child1Dob",
    "child2Name",
    "child2Dob",
    "child3Name",
    "child3Dob",
    "fatherName",
    "fatherDob",
    "motherName",
    "motherDob",
];

/// Income stream prefix and label. Keys: `p`, `pFreq`, `pAmt`.
pub const INCOME_STREAMS: [(&str, &str); 4] = [
    ("salary", "Salary/Business Income"),
    ("rent", "Rent Receivables"),
    ("invest", "Investment Income"),
    ("other", "Others"),
];

pub const MONTHLY_EXPENSE_KEYS: [&str; 22] = [
    "consumerLoan",
    "vehicleLoan",
    "personalLoan",
    "homeLoan",
    "grocery",
    "domesticHelp",
    "gas",
    "electricity",
    "wifi",
    "miscHouse",
    "rentPayable",
    "propertyMaint",
    "fuel",
    "hotel",
    "ott",
    "club",
    "entertainment",
    "miscDisc",
    "school",
    "extraCurricular",
    "miscEdu",
    "investExpense",
];

pub const YEARLY_EXPENSE_KEYS: [&str; 13] = [
    "medicalInsurance",
    "termInsurance",
    "bikeInsurance",
    "carInsurance",
    "criticalIllness",
    "accidentalPolicy",
    "propertyTax",
    "holiday",
    "misc",
    "schoolFees",
    "travelFees",
    "booksUniform",
    "yearlyInvestment",
];

pub const COVERAGE_KEYS: [&str; 2] = ["coverage_health_sum", "coverage_term_sum"];

/// Raw attributes of an investment row besides its derived `_annual`.
pub const INVESTMENT_ATTRIBUTES: [&str; 5] = ["value", "date", "freq", "years", "current"];
pub const LIABILITY_ATTRIBUTES: [&str; 2] = ["amount", "year"];

pub const TOTAL_MONTHLY_EXPENSES: &str = "totalMonthlyExpenses";
pub const TOTAL_MONTHLY_EXPENSES_ANNUALIZED: &str = "totalMonthlyExpensesAnnualized";
pub const TOTAL_YEARLY_EXPENSES: &str = "totalYearlyExpenses";
pub const TOTAL_COVERAGE: &str = "totalCoverage";
pub const TOTAL_LIABILITIES: &str = "totalLiabilities";
pub const TOTAL_CURRENT_ASSETS: &str = "totalCurrentAssets";
pub const TOTAL_ANNUAL_INCOME: &str = "totalAnnualIncome";
pub const TOTAL_ANNUAL_EXPENSES: &str = "totalAnnualExpenses";
pub const INVESTIBLE_SURPLUS: &str = "investibleSurplus";
pub const NET_WORTH: &str = "netWorth";
pub const TOTAL_ANNUAL_INVESTMENT: &str = "totalAnnualInvestment";
pub const TOTAL_CURRENT_INVESTMENT: &str = "totalCurrentInvestment";

const CROSS_SECTION_KEYS: [&str; 6] = [
    TOTAL_ANNUAL_INCOME,
    TOTAL_ANNUAL_EXPENSES,
    INVESTIBLE_SURPLUS,
    NET_WORTH,
    TOTAL_ANNUAL_INVESTMENT,
    TOTAL_CURRENT_INVESTMENT,
];

const DEFAULT_ROWS: [(Group, &str, &str); 25] = [
    (Group::Debt, "savings", "Savings / Liquid"),
    (Group::Debt, "fd", "FD"),
    (Group::Debt, "rd", "RD"),
    (Group::Debt, "scss", "SCSS"),
    (Group::Debt, "sukanya", "Sukanya Samruddhi"),
    (Group::Debt, "epf", "EPF"),
    (Group::Debt, "ppf", "PPF"),
    (Group::Debt, "postoffice", "Post Office Scheme"),
    (Group::Debt, "companyfd", "Company Fixed Deposit"),
    (Group::Debt, "debentures", "Debentures / Bonds"),
    (Group::Debt, "mutualfunds", "Debt Mutual Funds"),
    (Group::Equity, "shares", "Shares"),
    (Group::Equity, "mutual", "Mutual Funds"),
    (Group::Equity, "sip", "SIP"),
    (Group::Physical, "property", "Property"),
    (Group::Physical, "gold", "Gold"),
    (Group::Insurance, "endowment", "Endowment Policy"),
    (Group::Insurance, "moneyback", "Moneyback Policy"),
    (Group::Insurance, "ulip", "ULIP Policy"),
    (Group::Liability, "vehicle", "Total Outstanding Vehicle Loan"),
    (Group::Liability, "personal", "Total Outstanding Personal Loan"),
    (Group::Liability, "consumer", "Total Outstanding Consumer Loan"),
    (Group::Liability, "home", "Total Outstanding Home Loan"),
    (Group::Liability, "credit", "Total Outstanding Credit Card Due"),
    (Group::Liability, "other", "Total Outstanding (Others)"),
];

static ROW_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(debt|equity|physical|insurance|liability)_([a-z0-9]+)_([a-z]+)$")
        .expect("row key pattern is valid")
});

pub fn income_freq_key(prefix: &str) -> String {
    format!("{prefix}Freq")
}

pub fn income_annual_key(prefix: &str) -> String {
    format!("{prefix}Amt")
}

pub fn annual_total_key(group: Group) -> String {
    format!("{}AnnualTotal", group.prefix())
}

pub fn current_total_key(group: Group) -> String {
    format!("{}CurrentTotal", group.prefix())
}

/// The set of entity rows in a session and the derived-field registry they imply.
#[derive(Debug, Clone)]
pub struct Catalog {
    rows: BTreeMap<Group, Vec<Row>>,
    derived: HashMap<String, Layer>,
}

impl Default for Catalog {
    fn default() -> Self {
        let mut rows: BTreeMap<Group, Vec<Row>> = BTreeMap::new();
        for (group, slug, label) in DEFAULT_ROWS {
            rows.entry(group).or_default().push(Row {
                group,
                slug: slug.to_string(),
                label: label.to_string(),
            });
        }
        let mut catalog = Self {
            rows,
            derived: HashMap::new(),
        };
        catalog.rebuild_registry();
        catalog
    }
}

impl Catalog {
    pub fn rows(&self, group: Group) -> &[Row] {
        self.rows.get(&group).map_or(&[], Vec::as_slice)
    }

    pub fn all_rows(&self) -> &BTreeMap<Group, Vec<Row>> {
        &self.rows
    }

    pub fn find_row(&self, group: Group, slug: &str) -> Option<&Row> {
        self.rows(group).iter().find(|r| r.slug == slug)
    }

    /// Layer of `key` when it is a derived field.
    pub fn derived_layer(&self, key: &str) -> Option<Layer> {
        self.derived.get(key).copied()
    }

    pub fn is_derived(&self, key: &str) -> bool {
        self.derived.contains_key(key)
    }

    /// Whether a key may feed a computation at `layer`: raw keys always can,
    /// derived keys only from a strictly lower layer.
    pub fn readable_at(&self, key: &str, layer: Layer) -> bool {
        self.derived_layer(key).is_none_or(|own| own < layer)
    }

    pub fn add_row(
        &mut self,
        group: Group,
        slug: &str,
        label: Option<&str>,
    ) -> Result<Row, FormError> {
        validate_slug(slug)?;
        if self.find_row(group, slug).is_some() {
            return Err(FormError::DuplicateRow {
                group,
                slug: slug.to_string(),
            });
        }
        let row = Row {
            group,
            slug: slug.to_string(),
            label: label.map_or_else(|| slug.to_string(), str::to_string),
        };
        self.rows.entry(group).or_default().push(row.clone());
        self.rebuild_registry();
        Ok(row)
    }

    pub fn remove_row(&mut self, group: Group, slug: &str) -> Result<Row, FormError> {
        let rows = self.rows.entry(group).or_default();
        let Some(index) = rows.iter().position(|r| r.slug == slug) else {
            return Err(FormError::UnknownRow {
                group,
                slug: slug.to_string(),
            });
        };
        let row = rows.remove(index);
        self.rebuild_registry();
        Ok(row)
    }

    /// Registers rows for canonical row keys present in `record` but missing
    /// from the catalog, e.g. rows added in an earlier session.
    pub fn discover_rows(&mut self, record: &FormRecord) -> Vec<Row> {
        let mut found = Vec::new();
        for key in record.keys() {
            let Some(caps) = ROW_KEY.captures(key) else {
                continue;
            };
            let Ok(group) = caps[1].parse::<Group>() else {
                continue;
            };
            let attribute = &caps[3];
            let known_attribute = if group.is_investment() {
                attribute == "annual" || INVESTMENT_ATTRIBUTES.contains(&attribute)
            } else {
                LIABILITY_ATTRIBUTES.contains(&attribute)
            };
            let slug = &caps[2];
            if !known_attribute || self.find_row(group, slug).is_some() {
                continue;
            }
            let row = Row {
                group,
                slug: slug.to_string(),
                label: slug.to_string(),
            };
            self.rows.entry(group).or_default().push(row.clone());
            found.push(row);
        }
        if !found.is_empty() {
            self.rebuild_registry();
        }
        found
    }

    /// Every key the form starts with, raw inputs only.
    pub fn raw_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = PROFILE_KEYS.iter().map(|k| k.to_string()).collect();
        for (prefix, _) in INCOME_STREAMS {
            keys.push(prefix.to_string());
            keys.push(income_freq_key(prefix));
        }
        keys.extend(MONTHLY_EXPENSE_KEYS.iter().map(|k| k.to_string()));
        keys.extend(YEARLY_EXPENSE_KEYS.iter().map(|k| k.to_string()));
        keys.extend(COVERAGE_KEYS.iter().map(|k| k.to_string()));
        for row in self.rows.values().flatten() {
            keys.extend(row_raw_keys(row));
        }
        keys
    }

    /// Every key owned by `row`, raw and derived.
    pub fn row_keys(row: &Row) -> Vec<String> {
        let mut keys = row_raw_keys(row);
        if row.group.is_investment() {
            keys.push(row.key("annual"));
        }
        keys
    }

    fn rebuild_registry(&mut self) {
        let mut derived = HashMap::new();

        for (prefix, _) in INCOME_STREAMS {
            derived.insert(income_annual_key(prefix), Layer::Annualized);
        }
        for row in self.rows.values().flatten() {
            if row.group.is_investment() {
                derived.insert(row.key("annual"), Layer::Annualized);
            }
        }

        for key in [
            TOTAL_MONTHLY_EXPENSES,
            TOTAL_MONTHLY_EXPENSES_ANNUALIZED,
            TOTAL_YEARLY_EXPENSES,
            TOTAL_COVERAGE,
            TOTAL_LIABILITIES,
            TOTAL_CURRENT_ASSETS,
        ] {
            derived.insert(key.to_string(), Layer::Aggregate);
        }
        for group in Group::INVESTMENTS {
            derived.insert(annual_total_key(group), Layer::Aggregate);
            derived.insert(current_total_key(group), Layer::Aggregate);
        }

        for key in CROSS_SECTION_KEYS {
            derived.insert(key.to_string(), Layer::CrossSection);
        }

        self.derived = derived;
    }
}

fn row_raw_keys(row: &Row) -> Vec<String> {
    let attributes: &[&str] = if row.group.is_investment() {
        &INVESTMENT_ATTRIBUTES
    } else {
        &LIABILITY_ATTRIBUTES
    };
    attributes.iter().map(|a| row.key(a)).collect()
}

fn validate_slug(slug: &str) -> Result<(), FormError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(FormError::InvalidRowSlug(slug.to_string()))
    }
}
