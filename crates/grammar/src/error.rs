use std::fmt;
use std::io;

/// Errors raised while parsing or persisting a bank.
#[derive(Debug)]
pub enum GrammarError {
    /// The input contained no bytes at all (after BOM stripping).
    EmptyInput,
    /// The header did not begin with the configured prefix character.
    NoHeader { found: String },
    /// No `{` was found anywhere in the input, so the header never closes.
    MissingOpenBrace,
    /// The header's title is not wrapped in a balanced pair of parentheses.
    MalformedParens { header: String },
    /// The bank id token could not be parsed in the configured base.
    BadBankId { token: String },
    /// A register id token could not be parsed in the configured base.
    BadRegisterId { token: String },
    /// An address id token could not be parsed in the configured base.
    BadAddressId { token: String },
    /// Reading or writing the bank file failed at the filesystem layer.
    Io(io::Error),
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "bank text is empty"),
            Self::NoHeader { found } => write!(f, "expected bank header, found '{found}'"),
            Self::MissingOpenBrace => write!(f, "no opening '{{' found in bank text"),
            Self::MalformedParens { header } => write!(f, "malformed title parentheses in header '{header}'"),
            Self::BadBankId { token } => write!(f, "'{token}' is not a valid bank id"),
            Self::BadRegisterId { token } => write!(f, "'{token}' is not a valid register id"),
            Self::BadAddressId { token } => write!(f, "'{token}' is not a valid address id"),
            Self::Io(error) => write!(f, "bank I/O error: {error}"),
        }
    }
}

impl std::error::Error for GrammarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for GrammarError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}
