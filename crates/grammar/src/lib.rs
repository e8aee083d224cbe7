//! The bank text grammar: a header line followed by an indented body of registers and
//! addresses, plus the file I/O that persists it.
//!
//! ```text
//! <bank>    ::= <header> '{' NEWLINE <body> '}' NEWLINE?
//! <header>  ::= <prefix><bank-id-in-base> WS '(' <title> ')'
//! <body>    ::= ( <register-line> | <address-line> | <blank> )*
//! ```
//!
//! This crate owns the [`Bank`] model as well as its parser and serializer, since the two
//! are inseparable: the serializer's output is defined as whatever makes the parser's
//! round trip hold.

mod error;
mod io;
mod model;
mod parser;
mod serializer;

pub use error::GrammarError;
pub use io::load_bank;
pub use io::save_bank;
pub use model::Bank;
pub use parser::parse_bank;
pub use serializer::serialize_bank;
