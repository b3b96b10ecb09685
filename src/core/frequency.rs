use serde::Serialize;

/// Periodicity of a raw contribution or income amount.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Monthly,
    Quarterly,
    HalfYearly,
    Yearly,
    Single,
    /// Repeats every N months; N may be fractional.
    EveryMonths(f64),
}

impl Frequency {
    /// Parses a frequency tag. Matching ignores case, whitespace, `-` and `_`.
    /// Returns `None` for an empty or unrecognized tag.
    pub fn parse(tag: &str) -> Option<Self> {
        let normalized: String = tag
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "" => None,
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "halfyearly" | "semiannual" | "semiannually" => Some(Self::HalfYearly),
            // "Single Yearly" is the yearly premium option of the insurance section.
            "yearly" | "annual" | "annually" | "singleyearly" => Some(Self::Yearly),
            "single" | "onetime" | "lumpsum" => Some(Self::Single),
            _ => match tag.trim().parse::<f64>() {
                Ok(months) if months.is_finite() && months > 0.0 => {
                    Some(Self::EveryMonths(months))
                }
                _ => None,
            },
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            Self::Monthly => 12.0,
            Self::Quarterly => 4.0,
            Self::HalfYearly => 2.0,
            Self::Yearly => 1.0,
            Self::Single => 0.0,
            Self::EveryMonths(months) => 12.0 / months,
        }
    }
}

/// Multiplier for a raw tag; unknown or empty tags contribute nothing.
pub fn annualization_multiplier(tag: &str) -> f64 {
    Frequency::parse(tag).map_or(0.0, Frequency::multiplier)
}

/// Annual equivalent of `raw_amount` paid at `frequency`, rounded to a whole unit.
pub fn annualize(raw_amount: f64, frequency: &str) -> f64 {
    let amount = sanitize_amount(raw_amount);
    (amount * annualization_multiplier(frequency)).round()
}

/// Reads a stored field value as an amount. Blank, non-numeric, non-finite and
/// negative values all read as zero.
pub fn parse_amount(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .map(sanitize_amount)
        .unwrap_or(0.0)
}

/// Reads a stored derived figure, keeping its sign. Net figures can be negative.
pub fn parse_signed(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Canonical string form of a figure written into the record: whole numbers
/// without a fraction, everything else with at most two decimals.
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let cents = (value * 100.0).round() / 100.0;
    // scaling by 100 overflows near f64::MAX, where there is no fraction left
    let cents = if cents.is_finite() { cents } else { value };
    if cents == 0.0 {
        return "0".to_string();
    }
    if cents.fract() == 0.0 {
        return format!("{cents:.0}");
    }
    let text = format!("{cents:.2}");
    text.trim_end_matches('0').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert_eq, proptest};

    #[test]
    fn parse_accepts_documented_tags_in_any_spelling() {
        assert_eq!(Frequency::parse("Monthly"), Some(Frequency::Monthly));
        assert_eq!(Frequency::parse("  MONTHLY "), Some(Frequency::Monthly));
        assert_eq!(Frequency::parse("Quarterly"), Some(Frequency::Quarterly));
        assert_eq!(Frequency::parse("Half-Yearly"), Some(Frequency::HalfYearly));
        assert_eq!(Frequency::parse("half yearly"), Some(Frequency::HalfYearly));
        assert_eq!(Frequency::parse("Yearly"), Some(Frequency::Yearly));
        assert_eq!(Frequency::parse("annual"), Some(Frequency::Yearly));
        assert_eq!(Frequency::parse("Single"), Some(Frequency::Single));
        assert_eq!(Frequency::parse("One-time"), Some(Frequency::Single));
        assert_eq!(Frequency::parse("one time"), Some(Frequency::Single));
    }

    #[test]
    fn parse_rejects_empty_and_unknown_tags() {
        assert_eq!(Frequency::parse(""), None);
        assert_eq!(Frequency::parse("   "), None);
        assert_eq!(Frequency::parse("fortnightly"), None);
        assert_eq!(Frequency::parse("0"), None);
        assert_eq!(Frequency::parse("-3"), None);
        assert_eq!(Frequency::parse("NaN"), None);
    }

    #[test]
    fn numeric_tag_means_every_n_months() {
        assert_eq!(annualization_multiplier("3"), 4.0);
        assert_eq!(annualization_multiplier("6"), 2.0);
        assert_eq!(annualize(1_000.0, "5"), 2_400.0);
    }

    #[test]
    fn single_contribution_does_not_recur() {
        assert_eq!(annualize(10_000.0, "Single"), 0.0);
        assert_eq!(annualize(10_000.0, "Yearly"), 10_000.0);
    }

    #[test]
    fn unknown_frequency_contributes_nothing() {
        assert_eq!(annualize(5_000.0, ""), 0.0);
        assert_eq!(annualize(5_000.0, "weekly-ish"), 0.0);
    }

    #[test]
    fn annualize_rounds_to_whole_units() {
        assert_eq!(annualize(100.4, "Monthly"), 1_205.0);
        assert_eq!(annualize(0.125, "Quarterly"), 1.0);
        assert_eq!(annualize(33.33, "Half-Yearly"), 67.0);
    }

    #[test]
    fn salary_example_annualizes_to_six_lakh() {
        assert_eq!(annualize(parse_amount("50000"), "Monthly"), 600_000.0);
    }

    #[test]
    fn parse_amount_treats_junk_as_zero() {
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("abc"), 0.0);
        assert_eq!(parse_amount("1,000"), 0.0);
        assert_eq!(parse_amount("inf"), 0.0);
        assert_eq!(parse_amount("-250"), 0.0);
        assert_eq!(parse_amount(" 1250.5 "), 1_250.5);
    }

    #[test]
    fn parse_signed_keeps_negative_figures() {
        assert_eq!(parse_signed("-150000"), -150_000.0);
        assert_eq!(parse_signed("x"), 0.0);
    }

    #[test]
    fn format_amount_is_canonical() {
        assert_eq!(format_amount(600_000.0), "600000");
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(-0.0), "0");
        assert_eq!(format_amount(-350.0), "-350");
        assert_eq!(format_amount(1_250.5), "1250.5");
        assert_eq!(format_amount(0.1 + 0.2), "0.3");
        assert_eq!(format_amount(12.345_6), "12.35");
        assert_eq!(format_amount(f64::NAN), "0");
    }

    #[test]
    fn format_amount_keeps_figures_beyond_i64() {
        let annual = annualize(parse_amount("1e19"), "Monthly");
        assert_eq!(format_amount(annual), "120000000000000000000");
        assert_eq!(format_amount(-1e19), "-10000000000000000000");
        assert_eq!(parse_amount(&format_amount(annual)), annual);
        assert_eq!(format_amount(f64::MAX).len(), 309);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_annualize_matches_documented_multipliers(amount in 0u32..5_000_000) {
            let amount = amount as f64;
            prop_assert_eq!(annualize(amount, "Monthly"), (amount * 12.0).round());
            prop_assert_eq!(annualize(amount, "Quarterly"), (amount * 4.0).round());
            prop_assert_eq!(annualize(amount, "Half-Yearly"), (amount * 2.0).round());
            prop_assert_eq!(annualize(amount, "Yearly"), amount.round());
            prop_assert_eq!(annualize(amount, "Annual"), amount.round());
            prop_assert_eq!(annualize(amount, "Single"), 0.0);
        }

        #[test]
        fn prop_annualize_is_pure(cents in 0u64..100_000_000, tag_index in 0usize..7) {
            let tags = ["Monthly", "Quarterly", "Half Yearly", "Yearly", "Single", "4", "??"];
            let amount = cents as f64 / 100.0;
            let first = annualize(amount, tags[tag_index]);
            let second = annualize(amount, tags[tag_index]);
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.fract(), 0.0);
        }

        #[test]
        fn prop_format_then_parse_is_stable(cents in 0u64..10_000_000_000) {
            let value = cents as f64 / 100.0;
            let text = format_amount(value);
            prop_assert_eq!(format_amount(parse_amount(&text)), text);
        }
    }
}
