use serde::Serialize;
use tracing::{debug, warn};

use super::aggregate::Aggregates;
use super::catalog::{Catalog, INCOME_STREAMS, income_annual_key, income_freq_key};
use super::frequency::{annualize, format_amount};
use super::legacy::{Migration, migrate};
use super::totals::{CrossSection, CrossSectionInputs};
use super::types::{
    FieldChange, FormError, FormRecord, Goal, GoalField, GoalSummary, Group, Layer, Row,
};

/// Upper bound on recalculation passes. With three layers the record is quiet
/// after the second pass, so hitting the cap means the layer graph is broken.
pub const MAX_SETTLE_PASSES: u32 = 8;

/// Outcome of one settle: the number of passes run, the last one quiet.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub passes: u32,
    pub changes: Vec<FieldChange>,
}

impl Settlement {
    pub fn is_quiet(&self) -> bool {
        self.changes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub key: String,
    pub changed: bool,
    pub derived: Vec<FieldChange>,
}

/// Read-only view handed to the presentation and report layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub record: FormRecord,
    pub rows: Vec<Row>,
    pub goals: Vec<Goal>,
    pub goal_summary: GoalSummary,
}

/// One in-memory form session: the record, its entity rows and the goal list.
///
/// Every mutation goes through this type and ends in a settle, so the record
/// is always consistent once a call returns.
#[derive(Debug, Clone)]
pub struct FormSession {
    record: FormRecord,
    catalog: Catalog,
    goals: Vec<Goal>,
}

impl Default for FormSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FormSession {
    /// A blank form: every raw field present and empty, every total zero.
    pub fn new() -> Self {
        let catalog = Catalog::default();
        let record = catalog
            .raw_keys()
            .into_iter()
            .map(|key| (key, String::new()))
            .collect();
        let mut session = Self {
            record,
            catalog,
            goals: Vec::new(),
        };
        if let Err(err) = session.settle() {
            warn!(%err, "blank form did not settle");
        }
        session
    }

    /// Imports a flat record, rewriting legacy keys and picking up rows the
    /// default catalog does not know, then settles it.
    pub fn from_record(mut record: FormRecord) -> Result<(Self, Vec<Migration>), FormError> {
        let migrations = migrate(&mut record);
        let mut catalog = Catalog::default();
        let discovered = catalog.discover_rows(&record);
        if !discovered.is_empty() {
            debug!(count = discovered.len(), "registered rows found in import");
        }

        let mut session = Self {
            record,
            catalog,
            goals: Vec::new(),
        };
        session.settle()?;
        Ok((session, migrations))
    }

    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn into_record(self) -> FormRecord {
        self.record
    }

    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            record: self.record.clone(),
            rows: self.catalog.all_rows().values().flatten().cloned().collect(),
            goals: self.goals.clone(),
            goal_summary: GoalSummary::from_goals(&self.goals),
        }
    }

    /// The single entry point for raw field edits.
    ///
    /// Derived keys are rejected. Writing the stored value again is a no-op and
    /// does not trigger recalculation.
    pub fn set_field(&mut self, key: &str, value: impl Into<String>) -> Result<Edit, FormError> {
        if key.trim().is_empty() {
            return Err(FormError::EmptyKey);
        }
        if self.catalog.is_derived(key) {
            warn!(key, "rejected edit of derived field");
            return Err(FormError::ReadOnlyField(key.to_string()));
        }

        if self.record.write(key, value.into()).is_none() {
            return Ok(Edit {
                key: key.to_string(),
                changed: false,
                derived: Vec::new(),
            });
        }

        let settlement = self.settle()?;
        Ok(Edit {
            key: key.to_string(),
            changed: true,
            derived: settlement.changes,
        })
    }

    /// Recomputes every derived field until a pass writes nothing.
    pub fn settle(&mut self) -> Result<Settlement, FormError> {
        let mut changes = Vec::new();
        for pass in 1..=MAX_SETTLE_PASSES {
            let written = self.run_pass();
            if written.is_empty() {
                return Ok(Settlement {
                    passes: pass,
                    changes,
                });
            }
            changes.extend(written);
        }
        warn!(passes = MAX_SETTLE_PASSES, "settle did not converge");
        Err(FormError::NotConverged {
            passes: MAX_SETTLE_PASSES,
        })
    }

    /// One pass over the layers in order. Each layer's batch is computed from
    /// the record as left by the layers below it, then written in one go.
    fn run_pass(&mut self) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        for layer in Layer::ALL {
            let batch = match layer {
                Layer::Annualized => self.annualized_entries(),
                Layer::Aggregate => Aggregates::compute(&self.record, &self.catalog).entries(),
                Layer::CrossSection => {
                    CrossSection::compute(&CrossSectionInputs::read(&self.record)).entries()
                }
            };
            let written = self.record.apply_batch(batch);
            if !written.is_empty() {
                debug!(?layer, writes = written.len(), "applied derived batch");
            }
            changes.extend(written);
        }
        changes
    }

    fn annualized_entries(&self) -> Vec<(String, String)> {
        let record = &self.record;
        let income = INCOME_STREAMS.iter().map(|(prefix, _)| {
            let annual = annualize(record.amount(prefix), record.text(&income_freq_key(prefix)));
            (income_annual_key(prefix), format_amount(annual))
        });
        let rows = self
            .catalog
            .all_rows()
            .values()
            .flatten()
            .filter(|row| row.group.is_investment())
            .map(|row| {
                let annual = annualize(
                    record.amount(&row.key("value")),
                    record.text(&row.key("freq")),
                );
                (row.key("annual"), format_amount(annual))
            });
        income.chain(rows).collect()
    }

    /// Adds an entity row with blank raw fields.
    pub fn add_row(
        &mut self,
        group: Group,
        slug: &str,
        label: Option<&str>,
    ) -> Result<(Row, Settlement), FormError> {
        let row = self.catalog.add_row(group, slug, label)?;
        for key in Catalog::row_keys(&row) {
            if !self.record.contains(&key) && !self.catalog.is_derived(&key) {
                self.record.write(&key, String::new());
            }
        }
        debug!(row = %row.stem(), "added row");
        let settlement = self.settle()?;
        Ok((row, settlement))
    }

    /// Removes an entity row and every key it owns.
    pub fn remove_row(&mut self, group: Group, slug: &str) -> Result<Settlement, FormError> {
        let row = self.catalog.remove_row(group, slug)?;
        for key in Catalog::row_keys(&row) {
            self.record.remove(&key);
        }
        debug!(row = %row.stem(), "removed row");
        self.settle()
    }

    pub fn add_goal(&mut self, goal: Goal) -> usize {
        self.goals.push(goal);
        self.goals.len() - 1
    }

    pub fn update_goal(
        &mut self,
        index: usize,
        field: GoalField,
        value: impl Into<String>,
    ) -> Result<&Goal, FormError> {
        let goal = self
            .goals
            .get_mut(index)
            .ok_or(FormError::UnknownGoal(index))?;
        goal.set(field, value.into());
        Ok(goal)
    }

    pub fn remove_goal(&mut self, index: usize) -> Result<Goal, FormError> {
        if index >= self.goals.len() {
            return Err(FormError::UnknownGoal(index));
        }
        Ok(self.goals.remove(index))
    }
}
