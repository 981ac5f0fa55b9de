//! XSD generation from a schema.
//!
//! Describes exactly what the assembler emits: root static fields, then
//! unbounded transactions holding static and schema transaction fields and
//! unbounded line items.

use super::assembler::{AssembleOptions, Element};
use super::writer::{to_xml_string, WriteOptions};
use crate::error::AssembleResult;
use crate::models::{DataType, FieldMapping, ParentLevel, Requirement, Schema, StaticField};

const XS_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Render the XSD document for `schema`.
pub fn generate_xsd(schema: &Schema, static_fields: &[StaticField], options: &AssembleOptions) -> AssembleResult<String> {
    to_xml_string(&xsd_tree(schema, static_fields, options), WriteOptions::default())
}

/// Build the XSD element tree.
pub fn xsd_tree(schema: &Schema, static_fields: &[StaticField], options: &AssembleOptions) -> Element {
    let mut line_item = sequence();
    push_static(&mut line_item, static_fields, ParentLevel::LineItem);
    push_fields(&mut line_item, schema, ParentLevel::LineItem);
    let line_item = repeated(
        options.line_item_name(schema),
        line_item,
        &options.line_item_index_attribute,
    );

    let mut transaction = sequence();
    push_static(&mut transaction, static_fields, ParentLevel::Transaction);
    push_fields(&mut transaction, schema, ParentLevel::Transaction);
    transaction.push(line_item);
    let transaction = repeated(
        options.transaction_name(schema),
        transaction,
        &options.transaction_index_attribute,
    );

    let mut root = sequence();
    push_static(&mut root, static_fields, ParentLevel::Root);
    root.push(transaction);

    let mut root_type = Element::new("xs:complexType").with_child(root);
    for key in options.root_attributes.keys() {
        root_type.push(
            Element::new("xs:attribute")
                .with_attr("name", key)
                .with_attr("type", "xs:string"),
        );
    }

    Element::new("xs:schema")
        .with_attr("xmlns:xs", XS_NAMESPACE)
        .with_attr("elementFormDefault", "qualified")
        .with_child(
            Element::new("xs:element")
                .with_attr("name", options.root_name(schema))
                .with_child(root_type),
        )
}

fn sequence() -> Element {
    Element::new("xs:sequence")
}

/// An unbounded element with a required positive index attribute.
fn repeated(name: &str, content: Element, index_attribute: &str) -> Element {
    Element::new("xs:element")
        .with_attr("name", name)
        .with_attr("minOccurs", "0")
        .with_attr("maxOccurs", "unbounded")
        .with_child(
            Element::new("xs:complexType").with_child(content).with_child(
                Element::new("xs:attribute")
                    .with_attr("name", index_attribute)
                    .with_attr("type", "xs:positiveInteger")
                    .with_attr("use", "required"),
            ),
        )
}

fn push_static(sequence: &mut Element, static_fields: &[StaticField], level: ParentLevel) {
    for field in static_fields.iter().filter(|f| f.parent_tag == level) {
        sequence.push(
            Element::new("xs:element")
                .with_attr("name", &field.xml_tag)
                .with_attr("type", "xs:string"),
        );
    }
}

fn push_fields(sequence: &mut Element, schema: &Schema, level: ParentLevel) {
    for mapping in schema.fields_at(level) {
        sequence.push(field_element(mapping));
    }
}

fn field_element(mapping: &FieldMapping) -> Element {
    let min_occurs = if mapping.requirement == Requirement::Required { "1" } else { "0" };
    let element = Element::new("xs:element").with_attr("name", &mapping.output_tag);

    let restricted = matches!(
        mapping.data_type,
        DataType::String | DataType::Alphanumeric | DataType::Alpha
    ) && mapping.max_length > 0;

    if restricted {
        let restriction = Element::new("xs:restriction").with_attr("base", "xs:string").with_child(
            Element::new("xs:maxLength").with_attr("value", mapping.max_length.to_string()),
        );
        return element
            .with_attr("minOccurs", min_occurs)
            .with_child(Element::new("xs:simpleType").with_child(restriction));
    }

    element
        .with_attr("type", xs_type(&mapping.data_type))
        .with_attr("minOccurs", min_occurs)
}

fn xs_type(data_type: &DataType) -> &'static str {
    match data_type {
        DataType::Numeric => "xs:integer",
        DataType::Decimal { .. } => "xs:decimal",
        DataType::Boolean => "xs:boolean",
        DataType::Date { .. } => "xs:date",
        DataType::String | DataType::Alphanumeric | DataType::Alpha => "xs:string",
    }
}
