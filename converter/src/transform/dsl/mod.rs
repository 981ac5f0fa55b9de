//! Action DSL for field transformations
//!
//! This module provides:
//! - `actions`: the action catalogue and how each one rewrites a value
//! - `dates`: date parsing and reformatting shared with validation
//! - `ruleset`: a department's grouping, rules and static fields
//! - `executor`: apply a ruleset to grouped transactions
//!
//! ## Usage Flow
//!
//! ```text
//! Department TOML → Ruleset → group_records → executor::execute → validate
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledgerxml::transform::dsl::{execute, Ruleset};
//!
//! let ruleset = Ruleset::from_json(ruleset_json)?;
//! let stats = execute(&mut transactions, &ruleset)?;
//! println!("{}", stats.summary());
//! ```

pub mod actions;
pub mod dates;
pub mod executor;
pub mod ruleset;

// Re-exports for convenience
pub use actions::{actions_description, Action, ActionSpec, Pattern, ACTION_KINDS, MAX_DECIMAL_PLACES};
pub use executor::{apply_chain, execute, TransformStats};
pub use ruleset::{example_ruleset, Ruleset, SortOrder, TransactionGrouping, TransformationRule};
