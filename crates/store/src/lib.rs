//! The workspace: an in-memory map of loaded banks, backed by `files/<prefix><id>.txt` on
//! disk, loaded lazily on first reference.
//!
//! A [`Workspace`] is the single owner of every [`Bank`] it holds. Other layers (the
//! resolver, the exporter, the plugin kernel) borrow it read-only except when triggering a
//! lazy load, which is the only mutation they perform.

mod error;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use cellbank_config::Config;
use cellbank_grammar::Bank;
use cellbank_numeral::format_uint;
use cellbank_numeral::parse_uint;

pub use error::StoreError;

/// An in-memory collection of banks, lazily loaded from a `files/` directory tree rooted
/// at `root`.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
    banks: BTreeMap<u64, Bank>,
    filenames: HashMap<u64, PathBuf>,
}

impl Workspace {
    /// Creates a workspace rooted at `root` (the directory containing `files/`).
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Self { root: root.into(), config, banks: BTreeMap::new(), filenames: HashMap::new() }
    }

    /// The configuration this workspace was constructed with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The directory this workspace is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The `files/` directory for this workspace.
    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    /// The `plugins/` directory for this workspace.
    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    /// The canonical on-disk path for bank `id`: `files/<prefix><padded-id>.txt`.
    pub fn bank_path(&self, id: u64) -> PathBuf {
        let stem = format!("{}{}", self.config.prefix, format_uint(id, self.config.base, self.config.width_bank));
        self.files_dir().join(format!("{stem}.txt"))
    }

    /// Returns the bank with the given id, if it is currently loaded. Does not trigger a
    /// lazy load.
    pub fn get(&self, id: u64) -> Option<&Bank> {
        self.banks.get(&id)
    }

    /// Returns a mutable reference to the bank with the given id, if it is currently
    /// loaded. Does not trigger a lazy load.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Bank> {
        self.banks.get_mut(&id)
    }

    /// Whether bank `id` is currently resident in memory.
    pub fn is_loaded(&self, id: u64) -> bool {
        self.banks.contains_key(&id)
    }

    /// Ensures bank `id` is loaded, reading it from `files/<prefix><padded-id>.txt` if it
    /// is not already resident. A missing file is not an error here (see [`Workspace::open`]
    /// for the load-or-create variant); this method only surfaces genuine I/O or parse
    /// failures.
    pub fn ensure_loaded(&mut self, id: u64) -> Result<(), StoreError> {
        if self.banks.contains_key(&id) {
            return Ok(());
        }

        let path = self.bank_path(id);
        match cellbank_grammar::load_bank(&path, &self.config) {
            Ok(bank) => {
                tracing::debug!(bank = id, path = %path.display(), "lazily loaded bank");
                self.banks.insert(id, bank);
                self.filenames.insert(id, path);
                Ok(())
            }
            Err(cellbank_grammar::GrammarError::Io(error)) if error.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotLoaded { bank: id })
            }
            Err(error) => Err(StoreError::Grammar(error)),
        }
    }

    /// Opens bank `id`: loads it from disk if the file exists, otherwise creates an empty
    /// bank in memory (and persists it, if possible — a write failure is reported but does
    /// not prevent the in-memory bank from existing, per the specification's lifecycle
    /// rule for freshly opened banks).
    pub fn open(&mut self, id: u64) -> Result<&Bank, StoreError> {
        if !self.banks.contains_key(&id) {
            let path = self.bank_path(id);

            match cellbank_grammar::load_bank(&path, &self.config) {
                Ok(bank) => {
                    tracing::debug!(bank = id, path = %path.display(), "opened existing bank");
                    self.banks.insert(id, bank);
                    self.filenames.insert(id, path);
                }
                Err(cellbank_grammar::GrammarError::Io(error)) if error.kind() == io::ErrorKind::NotFound => {
                    tracing::info!(bank = id, path = %path.display(), "bank file missing, creating empty bank");

                    let bank = Bank::new(id, Vec::new());
                    if let Err(error) = cellbank_grammar::save_bank(&bank, &path, &self.config) {
                        tracing::warn!(bank = id, %error, "failed to persist newly created bank");
                    }

                    self.banks.insert(id, bank);
                    self.filenames.insert(id, path);
                }
                Err(error) => return Err(StoreError::Grammar(error)),
            }
        }

        Ok(self.banks.get(&id).expect("bank was just inserted"))
    }

    /// Persists bank `id` to the path it was loaded from (or its canonical path, if it was
    /// never loaded from disk).
    pub fn write(&mut self, id: u64) -> Result<(), StoreError> {
        let bank = self.banks.get(&id).ok_or(StoreError::NotLoaded { bank: id })?;
        let path = self.filenames.entry(id).or_insert_with(|| {
            let stem = format!(
                "{}{}",
                self.config.prefix,
                format_uint(id, self.config.base, self.config.width_bank)
            );
            self.root.join("files").join(format!("{stem}.txt"))
        });

        cellbank_grammar::save_bank(bank, path, &self.config)?;
        Ok(())
    }

    /// Inserts or replaces the in-memory bank for `id`, marking it as loaded at its
    /// canonical path.
    pub fn insert(&mut self, bank: Bank) {
        let id = bank.id;
        let path = self.bank_path(id);
        self.banks.insert(id, bank);
        self.filenames.entry(id).or_insert(path);
    }

    /// Scans the top level of `files/` and loads every file whose stem begins with the
    /// configured prefix and parses as a non-negative integer in the configured base.
    /// Files that don't match are skipped silently. Returns the number of banks loaded.
    pub fn preload_all(&mut self) -> Result<usize, StoreError> {
        let files_dir = self.files_dir();
        let mut loaded = 0;

        let entries = match std::fs::read_dir(&files_dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(StoreError::Io(error)),
        };

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !entry.file_type()?.is_file() {
                continue;
            }

            if let Some(id) = self.bank_id_from_path(&path) {
                match cellbank_grammar::load_bank(&path, &self.config) {
                    Ok(bank) => {
                        self.banks.insert(id, bank);
                        self.filenames.insert(id, path);
                        loaded += 1;
                    }
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "skipping unparsable bank file");
                    }
                }
            }
        }

        tracing::info!(count = loaded, "preloaded banks from {}", files_dir.display());
        Ok(loaded)
    }

    fn bank_id_from_path(&self, path: &Path) -> Option<u64> {
        let stem = path.file_stem()?.to_str()?;
        let rest = stem.strip_prefix(self.config.prefix)?;
        parse_uint(rest, self.config.base).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_empty_bank_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new(dir.path(), Config::default());

        let bank = ws.open(1).unwrap();
        assert!(bank.is_empty());
        assert!(ws.bank_path(1).exists());
    }

    #[test]
    fn open_loads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new(dir.path(), Config::default());

        std::fs::create_dir_all(dir.path().join("files")).unwrap();
        std::fs::write(dir.path().join("files").join("x00001.txt"), b"x00001\t(demo){\n\t0001\thello\n}\n").unwrap();

        let bank = ws.open(1).unwrap();
        assert_eq!(bank.title, b"demo");
        assert_eq!(bank.get(1, 1), Some(&b"hello"[..]));
    }

    #[test]
    fn ensure_loaded_reports_missing_bank() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new(dir.path(), Config::default());

        assert!(matches!(ws.ensure_loaded(42), Err(StoreError::NotLoaded { bank: 42 })));
    }

    #[test]
    fn write_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new(dir.path(), Config::default());

        ws.open(1).unwrap();
        ws.get_mut(1).unwrap().set(1, 1, *b"hello");
        ws.write(1).unwrap();

        let mut ws2 = Workspace::new(dir.path(), Config::default());
        let bank = ws2.open(1).unwrap();
        assert_eq!(bank.get(1, 1), Some(&b"hello"[..]));
    }

    #[test]
    fn preload_all_skips_unmatched_files() {
        let dir = tempfile::tempdir().unwrap();
        let files_dir = dir.path().join("files");
        std::fs::create_dir_all(&files_dir).unwrap();
        std::fs::write(files_dir.join("x00001.txt"), b"x00001\t(a){\n\t0001\tv\n}\n").unwrap();
        std::fs::write(files_dir.join("notabank.txt"), b"irrelevant").unwrap();
        std::fs::write(files_dir.join("config.json"), b"{}").unwrap();

        let mut ws = Workspace::new(dir.path(), Config::default());
        let loaded = ws.preload_all().unwrap();

        assert_eq!(loaded, 1);
        assert!(ws.is_loaded(1));
    }
}
