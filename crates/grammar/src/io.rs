use std::fs;
use std::io;
use std::path::Path;

use cellbank_config::Config;

use crate::error::GrammarError;
use crate::model::Bank;
use crate::parser::parse_bank;
use crate::serializer::serialize_bank;

/// Reads and parses the bank stored at `path`.
pub fn load_bank(path: &Path, config: &Config) -> Result<Bank, GrammarError> {
    tracing::debug!(path = %path.display(), "loading bank");

    let bytes = fs::read(path)?;
    parse_bank(&bytes, config)
}

/// Serializes `bank` and writes it to `path`.
///
/// The write is atomic-ish: the bytes land in `<path>.tmp` first, then that file is
/// renamed over `path`. If the rename fails because the temp file lives on a different
/// volume, we fall back to a copy-then-remove. Parent directories are created as needed.
pub fn save_bank(bank: &Bank, path: &Path, config: &Config) -> Result<(), GrammarError> {
    tracing::debug!(path = %path.display(), "saving bank");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = serialize_bank(bank, config);
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, &bytes)?;

    match fs::rename(&tmp_path, path) {
        Ok(()) => Ok(()),
        Err(error) if is_cross_volume(&error) => {
            fs::copy(&tmp_path, path)?;
            fs::remove_file(&tmp_path)?;
            Ok(())
        }
        Err(error) => Err(GrammarError::Io(error)),
    }
}

fn tmp_path_for(path: &Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}

/// POSIX `EXDEV` ("cross-device link"), raised by `rename(2)` when the temp file and the
/// target live on different filesystems.
#[cfg(unix)]
const EXDEV: i32 = 18;

fn is_cross_volume(error: &io::Error) -> bool {
    #[cfg(unix)]
    {
        error.raw_os_error() == Some(EXDEV)
    }
    #[cfg(not(unix))]
    {
        let _ = error;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files").join("x00001.txt");
        let config = Config::default();

        let mut bank = Bank::new(1, *b"demo");
        bank.set(1, 1, *b"hello");

        save_bank(&bank, &path, &config).unwrap();
        let loaded = load_bank(&path, &config).unwrap();

        assert_eq!(loaded, bank);
        assert!(!dir.path().join("files").join("x00001.txt.tmp").exists());
    }
}
