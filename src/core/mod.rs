mod aggregate;
mod catalog;
mod engine;
mod frequency;
mod legacy;
mod report;
mod totals;
mod types;

pub use aggregate::{Aggregates, LiabilityConvention, LiabilityTotal, liability_total};
pub use catalog::{Catalog, INCOME_STREAMS, MONTHLY_EXPENSE_KEYS, YEARLY_EXPENSE_KEYS};
pub use engine::{Edit, FormSession, FormSnapshot, MAX_SETTLE_PASSES, Settlement};
pub use frequency::{Frequency, annualization_multiplier, annualize, format_amount, parse_amount};
pub use legacy::Migration;
pub use report::{NetWorth, Report, age_on, format_inr, headline};
pub use totals::CrossSection;
pub use types::{
    FieldChange, FormError, FormRecord, Goal, GoalField, GoalSummary, Group, Layer, Row,
};
