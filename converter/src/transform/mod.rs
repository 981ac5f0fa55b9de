//! Transformation module.
//!
//! This module turns flat records into transformed transactions:
//! - DSL: action chains and department rulesets
//! - Grouper: flat records to transactions
//! - Pipeline: one input unit end to end

pub mod dsl;
pub mod grouper;
pub mod pipeline;

pub use grouper::group_records;
pub use pipeline::{convert_file, convert_records, UnitOptions, UnitOutput, UnitStats};
