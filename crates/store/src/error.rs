use std::fmt;
use std::io;

use cellbank_grammar::GrammarError;

/// Errors raised while loading, creating, or persisting banks in a [`crate::Workspace`].
#[derive(Debug)]
pub enum StoreError {
    /// The bank file could not be parsed.
    Grammar(GrammarError),
    /// A filesystem operation failed.
    Io(io::Error),
    /// The requested bank is not loaded and has no file to lazily load from.
    NotLoaded { bank: u64 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grammar(error) => write!(f, "{error}"),
            Self::Io(error) => write!(f, "workspace I/O error: {error}"),
            Self::NotLoaded { bank } => write!(f, "bank {bank} is not loaded and has no file to load"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Grammar(error) => Some(error),
            Self::Io(error) => Some(error),
            Self::NotLoaded { .. } => None,
        }
    }
}

impl From<GrammarError> for StoreError {
    fn from(error: GrammarError) -> Self {
        Self::Grammar(error)
    }
}

impl From<io::Error> for StoreError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}
