//! Record grouper: flat records to transactions.
//!
//! Records sharing a value in the grouping column become the line items of
//! one transaction.
//!
//! ## Example
//!
//! ```text
//! Input (3 records):
//! - Check=1001, Amount=10
//! - Check=1002, Amount=5
//! - Check=1001, Amount=20
//!
//! Output (2 transactions):
//! - #1 key=1001: [Amount=10, Amount=20]
//! - #2 key=1002: [Amount=5]
//! ```
//!
//! Transactions appear in order of first appearance of their key, and line
//! items keep input order unless a sort column is configured. A record
//! without the grouping column joins the empty-key group.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::dsl::ruleset::{SortOrder, TransactionGrouping};
use crate::models::{LineItem, Record, Transaction};

/// Group records into transactions.
///
/// With an empty `group_by_field` every record becomes its own transaction.
/// Transaction ids are 1-based positions; line item ids are left at 0 for
/// the numbering pass.
pub fn group_records(records: Vec<Record>, grouping: &TransactionGrouping) -> Vec<Transaction> {
    let mut transactions: Vec<Transaction> = if grouping.group_by_field.is_empty() {
        records
            .into_iter()
            .enumerate()
            .map(|(index, record)| Transaction {
                id: index + 1,
                group_key: String::new(),
                line_items: vec![to_line_item(record)],
            })
            .collect()
    } else {
        group_by_key(records, &grouping.group_by_field)
    };

    if !grouping.sort_by_field.is_empty() {
        for transaction in &mut transactions {
            sort_line_items(&mut transaction.line_items, &grouping.sort_by_field, grouping.sort_order);
        }
    }

    transactions
}

fn group_by_key(records: Vec<Record>, field: &str) -> Vec<Transaction> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut transactions: Vec<Transaction> = Vec::new();

    for record in records {
        let key = record.fields.get(field).cloned().unwrap_or_default();

        let position = *positions.entry(key.clone()).or_insert_with(|| {
            transactions.push(Transaction {
                id: transactions.len() + 1,
                group_key: key,
                line_items: Vec::new(),
            });
            transactions.len() - 1
        });

        transactions[position].line_items.push(to_line_item(record));
    }

    transactions
}

fn to_line_item(record: Record) -> LineItem {
    LineItem {
        id: 0,
        source_row: record.row_number,
        fields: record.fields,
    }
}

/// Stable sort; numeric when both values parse, lexical otherwise.
fn sort_line_items(items: &mut [LineItem], field: &str, order: SortOrder) {
    items.sort_by(|a, b| {
        let left = a.fields.get(field).map(String::as_str).unwrap_or("");
        let right = b.fields.get(field).map(String::as_str).unwrap_or("");

        let ordering = match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
            (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
            _ => left.cmp(right),
        };

        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}
