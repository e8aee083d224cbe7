use std::fmt;
use std::io;
use std::path::PathBuf;

use cellbank_store::StoreError;

use crate::run::RunReport;

/// Errors raised while discovering plugins or running one against a cell.
#[derive(Debug)]
pub enum KernelError {
    /// No plugin directory with that name, or its manifest was invalid.
    PluginNotFound { name: String },
    /// The underlying bank/cell could not be loaded.
    Store(StoreError),
    /// The cell at `(bank, reg, addr)` holds no value.
    NoValue { bank: u64, reg: u64, addr: u64 },
    /// The manifest's entry for the host platform is empty.
    NoEntry { plugin: String },
    /// The selected entry file does not exist on disk.
    EntryNotFound { path: PathBuf },
    /// The plugin process did not write `output.json`.
    NoOutput { report: RunReport },
    /// Staging the run directory (creating it, writing `code.txt`/`input.json`) failed.
    StagingFailure(io::Error),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PluginNotFound { name } => write!(f, "no plugin named '{name}'"),
            Self::Store(error) => write!(f, "{error}"),
            Self::NoValue { bank, reg, addr } => write!(f, "cell ({bank}, {reg}, {addr}) has no value"),
            Self::NoEntry { plugin } => write!(f, "plugin '{plugin}' has no entry for this platform"),
            Self::EntryNotFound { path } => write!(f, "plugin entry not found: {}", path.display()),
            Self::NoOutput { report } => {
                write!(f, "plugin produced no output.json (exit={:?}): {}", report.exit_code, report.stderr_text())
            }
            Self::StagingFailure(error) => write!(f, "failed to stage plugin run: {error}"),
        }
    }
}

impl std::error::Error for KernelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(error) => Some(error),
            Self::StagingFailure(error) => Some(error),
            _ => None,
        }
    }
}

impl From<StoreError> for KernelError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl From<io::Error> for KernelError {
    fn from(error: io::Error) -> Self {
        Self::StagingFailure(error)
    }
}
