//! Output documents.
//!
//! - [`assembler`]: transactions to an element tree, line item numbering
//! - [`writer`]: element tree to XML text
//! - [`xsd`]: XSD describing the assembled documents of a schema

pub mod assembler;
pub mod writer;
pub mod xsd;

pub use assembler::{assemble, number_line_items, AssembleOptions, Element};
pub use writer::{to_xml_string, write_document, WriteOptions};
pub use xsd::generate_xsd;

impl From<&AssembleOptions> for WriteOptions {
    fn from(options: &AssembleOptions) -> Self {
        Self {
            include_declaration: options.include_declaration,
            indent: options.indent,
        }
    }
}
