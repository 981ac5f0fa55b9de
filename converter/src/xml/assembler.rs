//! Document assembler: transactions to an element tree.
//!
//! ```text
//! <cashbook>                          root static fields
//!   <transaction n="1">               static + schema transaction fields
//!     <lineItem n="1">...</lineItem>  static + schema line item fields
//!   </transaction>
//! </cashbook>
//! ```
//!
//! Line item indices come from [`number_line_items`], which runs once per
//! unit before validation so findings and output cite the same ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Fields, ParentLevel, Requirement, Schema, StaticField, Transaction};

// =============================================================================
// Element Tree
// =============================================================================

/// A plain XML element: no namespaces, no mixed content beyond leading text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Leaf element with text content.
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name).with_text(text)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Direct children named `name`.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first direct child named `name`.
    pub fn child_text<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.children_named(name).next().and_then(|c| c.text.as_deref())
    }
}

// =============================================================================
// Options
// =============================================================================

/// Output document settings of a department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleOptions {
    /// Overrides the schema's root element name.
    pub root_element: Option<String>,
    pub transaction_element: Option<String>,
    pub line_item_element: Option<String>,
    /// Number line items across the whole unit instead of per transaction.
    pub global_numbering: bool,
    pub transaction_index_attribute: String,
    pub line_item_index_attribute: String,
    pub include_declaration: bool,
    /// Spaces per nesting level; 0 writes everything on one line.
    pub indent: usize,
    pub root_attributes: BTreeMap<String, String>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            root_element: None,
            transaction_element: None,
            line_item_element: None,
            global_numbering: true,
            transaction_index_attribute: "n".to_string(),
            line_item_index_attribute: "n".to_string(),
            include_declaration: true,
            indent: 2,
            root_attributes: BTreeMap::new(),
        }
    }
}

impl AssembleOptions {
    pub fn root_name<'a>(&'a self, schema: &'a Schema) -> &'a str {
        self.root_element.as_deref().unwrap_or(&schema.root_element)
    }

    pub fn transaction_name<'a>(&'a self, schema: &'a Schema) -> &'a str {
        self.transaction_element.as_deref().unwrap_or(&schema.transaction_element)
    }

    pub fn line_item_name<'a>(&'a self, schema: &'a Schema) -> &'a str {
        self.line_item_element.as_deref().unwrap_or(&schema.line_item_element)
    }
}

// =============================================================================
// Numbering
// =============================================================================

/// Assign line item ids in document order.
///
/// With global numbering ids run `1..=N` over the whole unit; otherwise they
/// restart at 1 in every transaction. Returns the number of line items.
pub fn number_line_items(transactions: &mut [Transaction], global: bool) -> usize {
    let mut next = 1;
    let mut total = 0;

    for transaction in transactions.iter_mut() {
        if !global {
            next = 1;
        }
        for item in transaction.line_items.iter_mut() {
            item.id = next;
            next += 1;
            total += 1;
        }
    }

    total
}

// =============================================================================
// Assembly
// =============================================================================

/// Build the document tree from numbered transactions.
pub fn assemble(
    transactions: &[Transaction],
    schema: &Schema,
    static_fields: &[StaticField],
    options: &AssembleOptions,
) -> Element {
    let mut root = Element::new(options.root_name(schema));
    for (key, value) in &options.root_attributes {
        root.attributes.push((key.clone(), value.clone()));
    }

    push_static(&mut root, static_fields, ParentLevel::Root);

    for transaction in transactions {
        root.push(build_transaction(transaction, schema, static_fields, options));
    }

    root
}

fn build_transaction(
    transaction: &Transaction,
    schema: &Schema,
    static_fields: &[StaticField],
    options: &AssembleOptions,
) -> Element {
    let mut element = Element::new(options.transaction_name(schema))
        .with_attr(&options.transaction_index_attribute, transaction.id.to_string());

    push_static(&mut element, static_fields, ParentLevel::Transaction);

    let empty = Fields::new();
    let first = transaction.first_line_item().map(|item| &item.fields).unwrap_or(&empty);
    push_schema_fields(&mut element, schema, ParentLevel::Transaction, first);

    for item in &transaction.line_items {
        let mut line = Element::new(options.line_item_name(schema))
            .with_attr(&options.line_item_index_attribute, item.id.to_string());
        push_static(&mut line, static_fields, ParentLevel::LineItem);
        push_schema_fields(&mut line, schema, ParentLevel::LineItem, &item.fields);
        element.push(line);
    }

    element
}

fn push_static(parent: &mut Element, static_fields: &[StaticField], level: ParentLevel) {
    for field in static_fields.iter().filter(|f| f.parent_tag == level) {
        parent.push(Element::leaf(&field.xml_tag, &field.value));
    }
}

/// Emit a field when it has a value or is required.
fn push_schema_fields(parent: &mut Element, schema: &Schema, level: ParentLevel, fields: &Fields) {
    for mapping in schema.fields_at(level) {
        let value = fields.get(&mapping.source_key).map(String::as_str).unwrap_or("");
        if !value.is_empty() || mapping.requirement == Requirement::Required {
            parent.push(Element::leaf(&mapping.output_tag, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldMapping, LineItem};
    use proptest::prelude::*;

    fn schema() -> Schema {
        Schema::new(
            "t",
            vec![
                FieldMapping::new("Check", "CheckNo", ParentLevel::Transaction).with_order(0),
                FieldMapping::new("Batch", "BatchId", ParentLevel::Root).with_order(1),
                FieldMapping::new("Amount", "Amount", ParentLevel::LineItem).required().with_order(3),
                FieldMapping::new("Memo", "Memo", ParentLevel::LineItem).with_order(2),
            ],
        )
        .unwrap()
    }

    fn tx(id: usize, items: &[&[(&str, &str)]]) -> Transaction {
        Transaction {
            id,
            group_key: String::new(),
            line_items: items
                .iter()
                .enumerate()
                .map(|(i, pairs)| LineItem {
                    id: 0,
                    source_row: i + 2,
                    fields: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
                })
                .collect(),
        }
    }

    fn ids(transactions: &[Transaction]) -> Vec<Vec<usize>> {
        transactions.iter().map(|t| t.line_items.iter().map(|li| li.id).collect()).collect()
    }

    #[test]
    fn test_global_and_local_numbering() {
        let mut transactions = vec![tx(1, &[&[], &[]]), tx(2, &[&[]]), tx(3, &[&[], &[], &[]])];

        assert_eq!(number_line_items(&mut transactions, true), 6);
        assert_eq!(ids(&transactions), vec![vec![1, 2], vec![3], vec![4, 5, 6]]);

        number_line_items(&mut transactions, false);
        assert_eq!(ids(&transactions), vec![vec![1, 2], vec![1], vec![1, 2, 3]]);
    }

    #[test]
    fn test_document_shape() {
        let mut transactions = vec![
            tx(1, &[&[("Check", "C1"), ("Amount", "10"), ("Memo", "rent")], &[("Check", "C1"), ("Amount", "5")]]),
            tx(2, &[&[("Check", "C2"), ("Amount", "")]]),
        ];
        number_line_items(&mut transactions, true);

        let statics = vec![
            StaticField { xml_tag: "Source".into(), value: "LEGACY".into(), parent_tag: ParentLevel::Root },
            StaticField { xml_tag: "Kind".into(), value: "CHK".into(), parent_tag: ParentLevel::Transaction },
            StaticField { xml_tag: "Currency".into(), value: "USD".into(), parent_tag: ParentLevel::LineItem },
        ];
        let doc = assemble(&transactions, &schema(), &statics, &AssembleOptions::default());

        assert_eq!(doc.name, "cashbook");
        let names: Vec<&str> = doc.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Source", "transaction", "transaction"]);
        // Root-level schema fields are not emitted.
        assert!(doc.child_text("BatchId").is_none());

        let first = &doc.children[1];
        assert_eq!(first.attr("n"), Some("1"));
        let names: Vec<&str> = first.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Kind", "CheckNo", "lineItem", "lineItem"]);
        assert_eq!(first.child_text("CheckNo"), Some("C1"));

        let line = &first.children[2];
        let names: Vec<&str> = line.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Currency", "Memo", "Amount"]);

        // Optional empty Memo omitted; required empty Amount kept.
        let second_line = &doc.children[2].children[2];
        assert_eq!(second_line.attr("n"), Some("3"));
        let names: Vec<&str> = second_line.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Currency", "Amount"]);
        assert_eq!(second_line.child_text("Amount"), Some(""));
    }

    #[test]
    fn test_custom_names_and_attributes() {
        let mut transactions = vec![tx(1, &[&[("Amount", "1")]])];
        number_line_items(&mut transactions, true);

        let mut options = AssembleOptions {
            root_element: Some("ledger".into()),
            transaction_element: Some("entry".into()),
            line_item_element: Some("split".into()),
            transaction_index_attribute: "seq".into(),
            line_item_index_attribute: "line".into(),
            ..Default::default()
        };
        options.root_attributes.insert("version".into(), "2".into());

        let doc = assemble(&transactions, &schema(), &[], &options);
        assert_eq!(doc.name, "ledger");
        assert_eq!(doc.attr("version"), Some("2"));
        let entry = &doc.children[0];
        assert_eq!(entry.name, "entry");
        assert_eq!(entry.attr("seq"), Some("1"));
        assert_eq!(entry.children[0].name, "split");
        assert_eq!(entry.children[0].attr("line"), Some("1"));
    }

    #[test]
    fn test_transaction_fields_come_from_first_line_item() {
        let mut transactions = vec![tx(1, &[&[("Check", "FIRST")], &[("Check", "SECOND")]])];
        number_line_items(&mut transactions, true);
        let doc = assemble(&transactions, &schema(), &[], &AssembleOptions::default());
        assert_eq!(doc.children[0].child_text("CheckNo"), Some("FIRST"));
    }

    proptest! {
        #[test]
        fn prop_global_numbering_is_contiguous(sizes in proptest::collection::vec(0usize..5, 0..10)) {
            let mut transactions: Vec<Transaction> = sizes
                .iter()
                .enumerate()
                .map(|(i, n)| tx(i + 1, &vec![&[][..]; *n]))
                .collect();

            let total = number_line_items(&mut transactions, true);
            let flat: Vec<usize> = ids(&transactions).into_iter().flatten().collect();
            prop_assert_eq!(flat, (1..=total).collect::<Vec<_>>());

            number_line_items(&mut transactions, false);
            for transaction in &transactions {
                let local: Vec<usize> = transaction.line_items.iter().map(|li| li.id).collect();
                prop_assert_eq!(local, (1..=transaction.line_items.len()).collect::<Vec<_>>());
            }
        }
    }
}
