//! Saved stop/line combinations, persisted as a JSON file.
//!
//! The store is owned by the application shell and handed to whoever needs
//! it. Every mutation is written through before returning; a missing or
//! unreadable file on open starts an empty store.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::BookmarkError;

/// A single line or, for a stop served by several, a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BookmarkLine {
    One(String),
    Many(Vec<String>),
}

impl BookmarkLine {
    pub fn lines(&self) -> Vec<&str> {
        match self {
            BookmarkLine::One(line) => vec![line.as_str()],
            BookmarkLine::Many(lines) => lines.iter().map(String::as_str).collect(),
        }
    }

    fn key(&self) -> Vec<&str> {
        let mut lines = self.lines();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// Builds from CLI input: one value stays a single line.
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            BookmarkLine::One(values.remove(0))
        } else {
            BookmarkLine::Many(values)
        }
    }
}

impl fmt::Display for BookmarkLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookmarkKind {
    #[serde(rename = "ttc-subway")]
    Subway,
    #[serde(rename = "ttc-bus")]
    Bus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub stop_tag: String,
    pub stop_name: String,
    pub line: BookmarkLine,
    #[serde(rename = "type")]
    pub kind: BookmarkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl Bookmark {
    /// `"1"` and `["1"]` name the same key, as do lists in any order.
    fn has_key(&self, stop_tag: &str, line: &BookmarkLine) -> bool {
        self.stop_tag == stop_tag && self.line.key() == line.key()
    }
}

#[derive(Debug)]
pub struct BookmarkStore {
    path: PathBuf,
    items: Vec<Bookmark>,
}

impl BookmarkStore {
    /// Opens the store at `path`, rehydrating whatever it holds.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<Bookmark>>(&content) {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Bookmark file is corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No bookmark file yet");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Bookmark file is unreadable, starting empty");
                Vec::new()
            }
        };
        debug!(count = items.len(), "Bookmarks loaded");
        Self { path, items }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds `bookmark` unless one with the same `(stop_tag, line)` exists.
    /// Returns whether the store changed.
    pub fn add(&mut self, bookmark: Bookmark) -> Result<bool, BookmarkError> {
        if self.contains(&bookmark.stop_tag, &bookmark.line) {
            return Ok(false);
        }
        info!(stop_tag = %bookmark.stop_tag, line = %bookmark.line, "Adding bookmark");
        let mut items = self.items.clone();
        items.push(bookmark);
        self.commit(items)?;
        Ok(true)
    }

    /// Removes the bookmark keyed by `(stop_tag, line)`. Returns whether one
    /// was removed.
    pub fn remove(&mut self, stop_tag: &str, line: &BookmarkLine) -> Result<bool, BookmarkError> {
        if !self.contains(stop_tag, line) {
            return Ok(false);
        }
        let items = self
            .items
            .iter()
            .filter(|b| !b.has_key(stop_tag, line))
            .cloned()
            .collect();
        self.commit(items)?;
        info!(stop_tag, line = %line, "Removed bookmark");
        Ok(true)
    }

    pub fn contains(&self, stop_tag: &str, line: &BookmarkLine) -> bool {
        self.items.iter().any(|b| b.has_key(stop_tag, line))
    }

    /// Bookmarks in insertion order.
    pub fn list(&self) -> &[Bookmark] {
        &self.items
    }

    pub fn to_json(&self) -> Result<String, BookmarkError> {
        Ok(serde_json::to_string_pretty(&self.items)?)
    }

    /// Persists `items` and only then makes them the store's contents, so a
    /// failed write leaves memory and disk in agreement.
    fn commit(&mut self, items: Vec<Bookmark>) -> Result<(), BookmarkError> {
        self.flush(&items)?;
        self.items = items;
        Ok(())
    }

    /// Writes to a sibling temp file and renames it over the store, so a
    /// crash mid-write leaves the previous contents.
    fn flush(&self, items: &[Bookmark]) -> Result<(), BookmarkError> {
        let write_err = |source| BookmarkError::Write {
            path: self.path.display().to_string(),
            source,
        };
        let json = serde_json::to_string_pretty(items)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("ttc_eta_test_{name}.json"));
        let _ = fs::remove_file(&path); // clean up any prior run
        path
    }

    fn bus(stop_tag: &str, line: &str) -> Bookmark {
        Bookmark {
            stop_tag: stop_tag.to_string(),
            stop_name: format!("Stop {stop_tag}"),
            line: BookmarkLine::One(line.to_string()),
            kind: BookmarkKind::Bus,
            direction: Some("East".to_string()),
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let path = temp_path("idempotent");
        let mut store = BookmarkStore::open(&path);

        assert!(store.add(bus("5292", "504")).unwrap());
        assert!(!store.add(bus("5292", "504")).unwrap());
        assert!(store.add(bus("5292", "510")).unwrap());

        assert_eq!(store.list().len(), 2);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let path = temp_path("remove");
        let mut store = BookmarkStore::open(&path);
        store.add(bus("5292", "504")).unwrap();
        store.add(bus("8765", "29")).unwrap();

        let key = BookmarkLine::One("504".to_string());
        assert!(store.remove("5292", &key).unwrap());
        assert!(!store.remove("5292", &key).unwrap());

        assert_eq!(store.list(), &[bus("8765", "29")]);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_reload_preserves_order() {
        let path = temp_path("reload");
        let mut store = BookmarkStore::open(&path);
        let subway = Bookmark {
            stop_tag: "13797".to_string(),
            stop_name: "Union Station".to_string(),
            line: BookmarkLine::Many(vec!["1".to_string()]),
            kind: BookmarkKind::Subway,
            direction: None,
        };
        store.add(bus("8765", "29")).unwrap();
        store.add(subway.clone()).unwrap();
        store.add(bus("5292", "504")).unwrap();

        let reloaded = BookmarkStore::open(&path);
        assert_eq!(reloaded.list(), store.list());
        assert_eq!(reloaded.list()[1], subway);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_or_corrupt_file_starts_empty() {
        let missing = BookmarkStore::open(temp_path("missing"));
        assert!(missing.list().is_empty());

        let path = temp_path("corrupt");
        fs::write(&path, "{not json").unwrap();
        let corrupt = BookmarkStore::open(&path);
        assert!(corrupt.list().is_empty());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_serialized_field_names() {
        let path = temp_path("fields");
        let mut store = BookmarkStore::open(&path);
        store.add(bus("5292", "504")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"stopTag\": \"5292\""));
        assert!(content.contains("\"type\": \"ttc-bus\""));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_single_line_and_one_element_list_share_a_key() {
        let path = temp_path("shapes");
        let mut store = BookmarkStore::open(&path);
        let mut subway = bus("13797", "1");
        subway.line = BookmarkLine::Many(vec!["1".to_string()]);
        subway.kind = BookmarkKind::Subway;

        assert!(store.add(subway).unwrap());
        assert!(!store.add(bus("13797", "1")).unwrap());
        assert_eq!(store.list().len(), 1);

        let mut pair = bus("5292", "504");
        pair.line = BookmarkLine::from_values(vec!["504".to_string(), "510".to_string()]);
        assert!(store.add(pair).unwrap());
        assert!(store.contains("5292", &BookmarkLine::Many(vec!["510".to_string(), "504".to_string()])));
        assert!(store.remove("5292", &BookmarkLine::Many(vec!["510".to_string(), "504".to_string()])).unwrap());

        assert!(store.remove("13797", &BookmarkLine::One("1".to_string())).unwrap());
        assert!(store.list().is_empty());
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        // a directory where the file should be makes the rename fail
        let path = temp_path("unwritable");
        let _ = fs::remove_dir_all(&path);
        fs::create_dir_all(path.join("occupied")).unwrap();
        let mut store = BookmarkStore::open(&path);

        assert!(store.add(bus("5292", "504")).is_err());
        assert!(store.list().is_empty());
        assert!(!store.contains("5292", &BookmarkLine::One("504".to_string())));

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let _ = fs::remove_file(tmp);
        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn test_line_list_is_distinct_from_single_line() {
        let one = BookmarkLine::One("504".to_string());
        let many = BookmarkLine::from_values(vec!["504".to_string(), "510".to_string()]);

        assert_ne!(one, many);
        assert_eq!(many.lines(), vec!["504", "510"]);
        assert_eq!(many.to_string(), "504,510");
        assert_eq!(BookmarkLine::from_values(vec!["29".to_string()]), BookmarkLine::One("29".to_string()));
    }
}
