//! Ruleset executor
//!
//! Applies action chains to the line items of grouped transactions, in place.

use super::actions::Action;
use super::ruleset::{Ruleset, TransformationRule};
use crate::error::{TransformError, TransformResult};
use crate::models::{Fields, LineItem, Transaction};

/// Counters from a transformation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Line items visited
    pub line_items: usize,
    /// Field values that went through at least one rule
    pub fields_transformed: usize,
}

impl TransformStats {
    pub fn summary(&self) -> String {
        format!(
            "Transformed: {} field values across {} line items",
            self.fields_transformed, self.line_items
        )
    }
}

/// Apply an ordered action chain to one value.
///
/// Each action receives the previous action's output. The first failing
/// action aborts the rest of the chain.
pub fn apply_chain(value: &str, fields: &Fields, actions: &[Action]) -> TransformResult<String> {
    actions
        .iter()
        .try_fold(value.to_string(), |current, action| action.apply(&current, fields))
}

/// Apply every rule whose field is present on the line item.
///
/// Rules run in ruleset order and write back immediately, so later rules and
/// context-sensitive actions see earlier results. A failing rule leaves the
/// values written by earlier rules in place.
pub fn transform_line_item(item: &mut LineItem, rules: &[TransformationRule]) -> TransformResult<usize> {
    let mut transformed = 0;

    for rule in rules {
        let Some(current) = item.fields.get(&rule.field) else {
            continue;
        };

        let updated = apply_chain(current, &item.fields, &rule.actions).map_err(|source| {
            TransformError::Field {
                field: rule.field.clone(),
                row: item.source_row,
                source: Box::new(source),
            }
        })?;

        item.fields.insert(rule.field.clone(), updated);
        transformed += 1;
    }

    Ok(transformed)
}

/// Transform every line item of every transaction.
pub fn execute(transactions: &mut [Transaction], ruleset: &Ruleset) -> TransformResult<TransformStats> {
    let mut stats = TransformStats::default();

    for transaction in transactions.iter_mut() {
        for item in transaction.line_items.iter_mut() {
            stats.fields_transformed += transform_line_item(item, &ruleset.transformation_rules)?;
            stats.line_items += 1;
        }
    }

    Ok(stats)
}
