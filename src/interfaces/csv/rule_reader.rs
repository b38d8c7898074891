use crate::domain::context::TriggerType;
use crate::domain::rule::{Criterion, NewRule, RuleScope};
use crate::error::{CommissionError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum ScopeKind {
    Global,
    Alliance,
}

/// One line of a rules file. Empty filter cells mean "any".
#[derive(Debug, Deserialize)]
struct RuleRow {
    name: String,
    scope: ScopeKind,
    alliance_id: Option<String>,
    project_type: Option<String>,
    product: Option<String>,
    percent: Decimal,
    applies_on: TriggerType,
    active: Option<bool>,
}

impl TryFrom<RuleRow> for NewRule {
    type Error = CommissionError;

    fn try_from(row: RuleRow) -> Result<Self> {
        let scope = match (row.scope, row.alliance_id) {
            (ScopeKind::Global, _) => RuleScope::Global,
            (ScopeKind::Alliance, Some(id)) => RuleScope::Alliance(id),
            (ScopeKind::Alliance, None) => {
                return Err(CommissionError::ValidationError(format!(
                    "Rule '{}' has alliance scope but no alliance_id",
                    row.name
                )));
            }
        };
        Ok(NewRule {
            name: row.name,
            scope,
            project_type: Criterion::from(row.project_type),
            product: Criterion::from(row.product),
            percent: row.percent,
            applies_on: row.applies_on,
            active: row.active.unwrap_or(true),
        })
    }
}

/// Reads rule definitions from a CSV source.
///
/// Columns: `name, scope, alliance_id, project_type, product, percent, applies_on, active`.
pub struct RuleReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> RuleReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily parses each row into a [`NewRule`]. Range checks on the percent
    /// are left to the catalog.
    pub fn rules(self) -> impl Iterator<Item = Result<NewRule>> {
        self.reader
            .into_deserialize::<RuleRow>()
            .map(|row| NewRule::try_from(row?))
    }
}
