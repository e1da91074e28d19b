//! Persona ("gem") definitions loaded from a directory of JSON files.
//!
//! Each `<key>.json` file holds a display name and the seed prompt that
//! conditions every model turn of a conversation started with that gem. The
//! store is read-only for the lifetime of the process.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gem {
    pub name: String,
    pub prompt: String,
}

pub struct GemStore {
    gems: BTreeMap<String, Gem>,
}

impl GemStore {
    /// Load every `*.json` definition in `dir`. Files that cannot be read or
    /// parsed, or that lack a non-empty name or prompt, are skipped. Fails
    /// only when no usable gem remains: the application has no default
    /// persona to fall back on.
    pub fn load(dir: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let mut gems = BTreeMap::new();

        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                match Self::load_one(&path) {
                    Ok(gem) => {
                        gems.insert(key.to_string(), gem);
                    }
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "skipping invalid gem file");
                    }
                }
            }
        }

        if gems.is_empty() {
            return Err(format!(
                "no valid gem files found in '{}'; add at least one <key>.json with \"name\" and \"prompt\" fields",
                dir.display()
            )
            .into());
        }

        Ok(Self { gems })
    }

    fn load_one(path: &Path) -> Result<Gem, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let gem: Gem = serde_json::from_str(&contents)?;
        if gem.name.trim().is_empty() || gem.prompt.trim().is_empty() {
            return Err("gem requires a non-empty name and prompt".into());
        }
        Ok(gem)
    }

    pub fn get(&self, key: &str) -> Option<&Gem> {
        self.gems.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.gems.contains_key(key)
    }

    /// Keys in sorted order, which is also the picker display order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.gems.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Gem)> {
        self.gems.iter().map(|(k, g)| (k.as_str(), g))
    }

    pub fn len(&self) -> usize {
        self.gems.len()
    }

    /// The gem selected by default in a fresh new-chat view: the preselected
    /// key when it exists, else "default", else the first key in sort order.
    pub fn default_key(&self, preselected: Option<&str>) -> &str {
        if let Some((key, _)) = preselected.and_then(|key| self.gems.get_key_value(key)) {
            return key;
        }
        if self.gems.contains_key("default") {
            return "default";
        }
        // load() guarantees at least one gem.
        self.gems.keys().next().map(|k| k.as_str()).unwrap_or("default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_gem(dir: &Path, key: &str, contents: &str) {
        fs::write(dir.join(format!("{key}.json")), contents).expect("write gem file");
    }

    #[test]
    fn loads_valid_gems_keyed_by_filename_stem() {
        let dir = TempDir::new().expect("tempdir");
        write_gem(dir.path(), "default", r#"{"name":"Default","prompt":"You are helpful."}"#);
        write_gem(dir.path(), "pirate", r#"{"name":"Pirate","prompt":"Talk like a pirate."}"#);

        let store = GemStore::load(dir.path()).expect("load gems");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("pirate").unwrap().name, "Pirate");
        assert_eq!(store.keys().collect::<Vec<_>>(), vec!["default", "pirate"]);
    }

    #[test]
    fn skips_malformed_and_incomplete_entries() {
        let dir = TempDir::new().expect("tempdir");
        write_gem(dir.path(), "good", r#"{"name":"Good","prompt":"Be good."}"#);
        write_gem(dir.path(), "broken", "{not json");
        write_gem(dir.path(), "no-prompt", r#"{"name":"Nameless"}"#);
        write_gem(dir.path(), "empty-name", r#"{"name":"  ","prompt":"x"}"#);
        fs::write(dir.path().join("notes.txt"), "not a gem").unwrap();

        let store = GemStore::load(dir.path()).expect("load gems");
        assert_eq!(store.len(), 1);
        assert!(store.contains("good"));
        assert!(!store.contains("broken"));
        assert!(!store.contains("no-prompt"));
        assert!(!store.contains("empty-name"));
    }

    #[test]
    fn empty_directory_is_fatal() {
        let dir = TempDir::new().expect("tempdir");
        assert!(GemStore::load(dir.path()).is_err());
    }

    #[test]
    fn default_key_prefers_preselection_then_default() {
        let dir = TempDir::new().expect("tempdir");
        write_gem(dir.path(), "alpha", r#"{"name":"A","prompt":"a"}"#);
        write_gem(dir.path(), "default", r#"{"name":"D","prompt":"d"}"#);
        let store = GemStore::load(dir.path()).expect("load gems");

        assert_eq!(store.default_key(Some("alpha")), "alpha");
        assert_eq!(store.default_key(Some("missing")), "default");
        assert_eq!(store.default_key(None), "default");
    }

    #[test]
    fn default_key_falls_back_to_first_in_sort_order() {
        let dir = TempDir::new().expect("tempdir");
        write_gem(dir.path(), "zeta", r#"{"name":"Z","prompt":"z"}"#);
        write_gem(dir.path(), "beta", r#"{"name":"B","prompt":"b"}"#);
        let store = GemStore::load(dir.path()).expect("load gems");

        assert_eq!(store.default_key(None), "beta");
    }
}
