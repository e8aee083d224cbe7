//! Resolved-text and JSON export of a bank.
//!
//! Both exports resolve every value before writing it out; neither mutates the bank's
//! stored (unresolved) contents. Exporting is read-mostly against the [`cellbank_store::Workspace`]
//! except for the lazy loads the resolver triggers while following references.

mod json;
mod text;

pub use json::export_json;
pub use text::export_resolved_text;
