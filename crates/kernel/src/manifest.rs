use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

/// A discovered plugin: its name and the directory its manifest was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    pub name: String,
    pub dir: PathBuf,
    pub entry_win: String,
    pub entry_lin: String,
}

impl Plugin {
    /// The entry script/executable for the host platform, relative to [`Plugin::dir`].
    pub fn entry_for_host(&self) -> &str {
        if cfg!(target_os = "windows") { &self.entry_win } else { &self.entry_lin }
    }
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    entry_win: String,
    #[serde(default)]
    entry_lin: String,
}

/// Scans `plugins_dir`'s top-level directories for a `plugin.json` with a non-empty
/// `name`. Discovery errors — a missing `plugins/` directory, an unreadable or malformed
/// manifest — are silent: the affected plugin is simply absent from the returned list.
pub fn discover_plugins(plugins_dir: &Path) -> Vec<Plugin> {
    let mut plugins = Vec::new();

    let Ok(entries) = fs::read_dir(plugins_dir) else {
        return plugins;
    };

    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        let manifest_path = dir.join("plugin.json");
        let Ok(bytes) = fs::read(&manifest_path) else {
            continue;
        };
        let Ok(raw) = serde_json::from_slice::<RawManifest>(&bytes) else {
            tracing::warn!(path = %manifest_path.display(), "skipping plugin with malformed manifest");
            continue;
        };

        if raw.name.is_empty() {
            continue;
        }

        plugins.push(Plugin { name: raw.name, dir, entry_win: raw.entry_win, entry_lin: raw.entry_lin });
    }

    plugins
}

/// Looks up a single plugin by name.
pub fn find_plugin(plugins_dir: &Path, name: &str) -> Option<Plugin> {
    discover_plugins(plugins_dir).into_iter().find(|plugin| plugin.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, name: &str, contents: &str) {
        let plugin_dir = dir.join(name);
        fs::create_dir_all(&plugin_dir).unwrap();
        fs::write(plugin_dir.join("plugin.json"), contents).unwrap();
    }

    #[test]
    fn discovers_valid_manifests() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "python", r#"{"name": "python", "entry_win": "run.bat", "entry_lin": "run.sh"}"#);

        let plugins = discover_plugins(dir.path());
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name, "python");
    }

    #[test]
    fn skips_manifest_with_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "broken", r#"{"name": "", "entry_win": "a", "entry_lin": "b"}"#);

        assert!(discover_plugins(dir.path()).is_empty());
    }

    #[test]
    fn skips_malformed_manifest_silently() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "broken", "not json");

        assert!(discover_plugins(dir.path()).is_empty());
    }

    #[test]
    fn missing_plugins_directory_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_plugins(&dir.path().join("nonexistent")).is_empty());
    }

    #[test]
    fn ignores_unknown_manifest_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "python", r#"{"name": "python", "entry_win": "a", "entry_lin": "b", "extra": 1}"#);

        assert_eq!(discover_plugins(dir.path()).len(), 1);
    }
}
