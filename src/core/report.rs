use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::Serialize;

use super::catalog::{
    COVERAGE_KEYS, INCOME_STREAMS, INVESTIBLE_SURPLUS, NET_WORTH, TOTAL_ANNUAL_EXPENSES,
    TOTAL_ANNUAL_INCOME, TOTAL_COVERAGE, TOTAL_CURRENT_ASSETS, TOTAL_LIABILITIES,
    TOTAL_MONTHLY_EXPENSES, TOTAL_MONTHLY_EXPENSES_ANNUALIZED, TOTAL_YEARLY_EXPENSES,
    annual_total_key, current_total_key, income_annual_key, income_freq_key,
};
use super::engine::FormSnapshot;
use super::types::{FormRecord, Goal, GoalSummary, Group};

/// Family members whose age is reported: (label, name key, date-of-birth key).
const PEOPLE: [(&str, &str, &str); 7] = [
    ("Self", "fullName", "dob"),
    ("Spouse", "spouseName", "spouseDob"),
    ("Child 1", "child1Name", "child1Dob"),
    ("Child 2", "child2Name", "child2Dob"),
    ("Child 3", "child3Name", "child3Dob"),
    ("Father", "fatherName", "fatherDob"),
    ("Mother", "motherName", "motherDob"),
];

const PROFILE_LINES: [(&str, &str); 5] = [
    ("Name", "fullName"),
    ("Contact", "contact"),
    ("Email", "email"),
    ("Profession", "profession"),
    ("Marital Status", "maritalStatus"),
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileLine {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeLine {
    pub relation: String,
    pub name: String,
    pub age: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeLine {
    pub label: String,
    pub amount: f64,
    pub frequency: String,
    pub annual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    pub monthly: f64,
    pub monthly_annualized: f64,
    pub yearly: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentLine {
    pub label: String,
    pub value: f64,
    pub frequency: String,
    pub annual: f64,
    pub current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentGroup {
    pub group: Group,
    pub label: String,
    pub lines: Vec<InvestmentLine>,
    pub annual_total: f64,
    pub current_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiabilityLine {
    pub label: String,
    pub amount: f64,
    pub closure_year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    pub health: f64,
    pub term: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheet {
    pub total_annual_income: f64,
    pub monthly_expenses_annualized: f64,
    pub yearly_expenses: f64,
    pub liabilities: f64,
    pub total_annual_expenses: f64,
    pub investible_surplus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorth {
    pub current_assets: f64,
    pub liabilities: f64,
    pub net_worth: f64,
}

/// Printable summary of a settled form. Built from the snapshot alone, so every
/// figure is the derived value the form itself shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub as_of: NaiveDate,
    pub profile: Vec<ProfileLine>,
    pub ages: Vec<AgeLine>,
    pub income: Vec<IncomeLine>,
    pub expenses: ExpenseSummary,
    pub investments: Vec<InvestmentGroup>,
    pub liabilities: Vec<LiabilityLine>,
    pub coverage: Coverage,
    pub goals: Vec<Goal>,
    pub goal_summary: GoalSummary,
    pub balance_sheet: BalanceSheet,
    pub net_worth: NetWorth,
}

impl Report {
    pub fn from_snapshot(snapshot: &FormSnapshot, as_of: NaiveDate) -> Self {
        let record = &snapshot.record;

        let profile = PROFILE_LINES
            .iter()
            .filter(|(_, key)| !record.text(key).trim().is_empty())
            .map(|(label, key)| ProfileLine {
                label: label.to_string(),
                value: record.text(key).trim().to_string(),
            })
            .collect();

        let ages = PEOPLE
            .iter()
            .filter(|(_, name_key, dob_key)| {
                !record.text(name_key).trim().is_empty() || !record.text(dob_key).trim().is_empty()
            })
            .map(|(relation, name_key, dob_key)| AgeLine {
                relation: relation.to_string(),
                name: record.text(name_key).trim().to_string(),
                age: age_on(record.text(dob_key), as_of),
            })
            .collect();

        let income = INCOME_STREAMS
            .iter()
            .map(|(prefix, label)| IncomeLine {
                label: label.to_string(),
                amount: record.amount(prefix),
                frequency: record.text(&income_freq_key(prefix)).to_string(),
                annual: record.amount(&income_annual_key(prefix)),
            })
            .collect();

        let investments = Group::INVESTMENTS
            .into_iter()
            .map(|group| investment_group(snapshot, group))
            .collect();

        let liabilities = snapshot
            .rows
            .iter()
            .filter(|row| row.group == Group::Liability)
            .filter(|row| record.amount(&row.key("amount")) != 0.0)
            .map(|row| {
                let year = record.text(&row.key("year")).trim();
                LiabilityLine {
                    label: row.label.clone(),
                    amount: record.amount(&row.key("amount")),
                    closure_year: (!year.is_empty()).then(|| year.to_string()),
                }
            })
            .collect();

        Self {
            as_of,
            profile,
            ages,
            income,
            expenses: ExpenseSummary {
                monthly: record.amount(TOTAL_MONTHLY_EXPENSES),
                monthly_annualized: record.amount(TOTAL_MONTHLY_EXPENSES_ANNUALIZED),
                yearly: record.amount(TOTAL_YEARLY_EXPENSES),
            },
            investments,
            liabilities,
            coverage: Coverage {
                health: record.amount(COVERAGE_KEYS[0]),
                term: record.amount(COVERAGE_KEYS[1]),
                total: record.amount(TOTAL_COVERAGE),
            },
            goals: snapshot.goals.clone(),
            goal_summary: snapshot.goal_summary.clone(),
            balance_sheet: BalanceSheet {
                total_annual_income: record.amount(TOTAL_ANNUAL_INCOME),
                monthly_expenses_annualized: record.amount(TOTAL_MONTHLY_EXPENSES_ANNUALIZED),
                yearly_expenses: record.amount(TOTAL_YEARLY_EXPENSES),
                liabilities: record.amount(TOTAL_LIABILITIES),
                total_annual_expenses: record.amount(TOTAL_ANNUAL_EXPENSES),
                investible_surplus: record.signed(INVESTIBLE_SURPLUS),
            },
            net_worth: NetWorth {
                current_assets: record.amount(TOTAL_CURRENT_ASSETS),
                liabilities: record.amount(TOTAL_LIABILITIES),
                net_worth: record.signed(NET_WORTH),
            },
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "FINANCIAL NEEDS REPORT (as of {})", self.as_of);

        section(&mut out, "Profile");
        for line in &self.profile {
            let _ = writeln!(out, "  {:<20}{}", line.label, line.value);
        }
        for line in &self.ages {
            let age = line
                .age
                .map_or_else(|| "-".to_string(), |age| format!("{age} yrs"));
            let _ = writeln!(out, "  {:<20}{:<28}{age}", line.relation, line.name);
        }

        section(&mut out, "Income");
        for line in &self.income {
            money_line(&mut out, &line.label, line.annual);
        }
        money_line(&mut out, "Total annual income", self.balance_sheet.total_annual_income);

        section(&mut out, "Expenses");
        money_line(&mut out, "Monthly expenses", self.expenses.monthly);
        money_line(&mut out, "Monthly x 12", self.expenses.monthly_annualized);
        money_line(&mut out, "Yearly expenses", self.expenses.yearly);

        section(&mut out, "Investments");
        for group in &self.investments {
            let _ = writeln!(out, "  {}", group.label);
            for line in &group.lines {
                let _ = writeln!(
                    out,
                    "    {:<30}{:>16}{:>16}",
                    line.label,
                    format_inr(line.annual),
                    format_inr(line.current)
                );
            }
            let _ = writeln!(
                out,
                "    {:<30}{:>16}{:>16}",
                "Total",
                format_inr(group.annual_total),
                format_inr(group.current_total)
            );
        }

        section(&mut out, "Liabilities");
        for line in &self.liabilities {
            let closure = line
                .closure_year
                .as_deref()
                .map(|year| format!(" (closes {year})"))
                .unwrap_or_default();
            money_line(&mut out, &format!("{}{closure}", line.label), line.amount);
        }
        money_line(&mut out, "Total liabilities", self.net_worth.liabilities);

        section(&mut out, "Insurance Coverage");
        money_line(&mut out, "Health", self.coverage.health);
        money_line(&mut out, "Term", self.coverage.term);
        money_line(&mut out, "Total coverage", self.coverage.total);

        section(&mut out, "Goals");
        for goal in &self.goals {
            let _ = writeln!(
                out,
                "  {:<30}{:>16}  {} yrs  {}",
                goal.name,
                format_inr(goal.target_amount()),
                goal.years,
                goal.priority
            );
        }
        let summary = &self.goal_summary;
        let _ = writeln!(
            out,
            "  {} goals, {} high, {} medium, target {}",
            summary.total_goals,
            summary.high_priority,
            summary.medium_priority,
            format_inr(summary.total_target_amount)
        );

        section(&mut out, "Balance Sheet");
        let sheet = &self.balance_sheet;
        money_line(&mut out, "Annual income", sheet.total_annual_income);
        money_line(&mut out, "Monthly expenses x 12", sheet.monthly_expenses_annualized);
        money_line(&mut out, "Yearly expenses", sheet.yearly_expenses);
        money_line(&mut out, "Liabilities", sheet.liabilities);
        money_line(&mut out, "Total annual expenses", sheet.total_annual_expenses);
        money_line(&mut out, "Investible surplus", sheet.investible_surplus);

        section(&mut out, "Net Worth");
        money_line(&mut out, "Current assets", self.net_worth.current_assets);
        money_line(&mut out, "Liabilities", self.net_worth.liabilities);
        money_line(&mut out, "Net worth", self.net_worth.net_worth);

        out
    }
}

fn investment_group(snapshot: &FormSnapshot, group: Group) -> InvestmentGroup {
    let record = &snapshot.record;
    let lines = snapshot
        .rows
        .iter()
        .filter(|row| row.group == group)
        .map(|row| InvestmentLine {
            label: row.label.clone(),
            value: record.amount(&row.key("value")),
            frequency: record.text(&row.key("freq")).to_string(),
            annual: record.amount(&row.key("annual")),
            current: record.amount(&row.key("current")),
        })
        .filter(|line| line.value != 0.0 || line.current != 0.0)
        .collect();
    InvestmentGroup {
        group,
        label: group.label().to_string(),
        lines,
        annual_total: record.amount(&annual_total_key(group)),
        current_total: record.amount(&current_total_key(group)),
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}\n{}", "-".repeat(title.len()));
}

fn money_line(out: &mut String, label: &str, value: f64) {
    let _ = writeln!(out, "  {label:<46}{:>16}", format_inr(value));
}

/// Whole years between `dob` and `as_of`. Blank, unparseable and future dates
/// have no age.
pub fn age_on(dob: &str, as_of: NaiveDate) -> Option<u32> {
    let dob = dob.trim();
    let born = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(dob, format).ok())?;
    as_of.years_since(born)
}

/// Rupee amount with Indian digit grouping and no fractional digits,
/// e.g. `₹ 12,34,567`.
pub fn format_inr(value: f64) -> String {
    let rounded = if value.is_finite() { value.round() } else { 0.0 };
    let digits = (rounded.abs() as u64).to_string();
    let sign = if rounded < 0.0 { "-" } else { "" };

    if digits.len() <= 3 {
        return format!("₹ {sign}{digits}");
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);
    groups.reverse();
    format!("₹ {sign}{},{tail}", groups.join(","))
}

/// Net-worth figures of a settled record.
pub fn headline(record: &FormRecord) -> NetWorth {
    NetWorth {
        current_assets: record.amount(TOTAL_CURRENT_ASSETS),
        liabilities: record.amount(TOTAL_LIABILITIES),
        net_worth: record.signed(NET_WORTH),
    }
}
