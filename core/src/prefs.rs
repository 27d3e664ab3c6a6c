//! Persisted user preferences
//!
//! Preferences are individually keyed boolean flags in a key-value store:
//! `log.<category>` for each event category and `perf_overlay`. A missing
//! flag takes its default; a malformed one is logged and ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use hashbrown::HashMap;

use crate::config::config_dir;
use crate::events::EventCategory;

pub const PERF_OVERLAY_KEY: &str = "perf_overlay";

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Durable key-value store for preference flags
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError>;
}

/// Volatile store, used by tests and the CLI
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a TOML file, written through on every `set`
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl TomlFileStore {
    /// `prefs.toml` in the platform config directory
    pub fn open_default() -> Option<Self> {
        config_dir().map(|dir| Self::open(dir.join("prefs.toml")))
    }

    /// Open a store. An unreadable or unparsable file starts empty; a single
    /// entry that is not a string or boolean is skipped on its own.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<toml::Table>(&content) {
                Ok(table) => {
                    let mut values = BTreeMap::new();
                    collect_entries(&path, "", table, &mut values);
                    values
                }
                Err(e) => {
                    tracing::warn!("Ignoring malformed preferences {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Failed to read preferences {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PrefsError> {
        let io_err = |source| PrefsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, content).map_err(io_err)
    }
}

/// Flatten `table` into dotted keys, keeping string and boolean entries
fn collect_entries(path: &Path, prefix: &str, table: toml::Table, values: &mut BTreeMap<String, String>) {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name
        } else {
            format!("{}.{}", prefix, name)
        };
        match value {
            toml::Value::String(text) => {
                values.insert(key, text);
            }
            toml::Value::Boolean(flag) => {
                values.insert(key, flag.to_string());
            }
            toml::Value::Table(inner) => collect_entries(path, &key, inner, values),
            other => {
                tracing::warn!(
                    "Ignoring preference `{}` in {}: unexpected {}",
                    key,
                    path.display(),
                    other.type_str()
                );
            }
        }
    }
}

impl PreferenceStore for TomlFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }
}

/// Read a boolean flag, falling back to `default` when absent or malformed
pub fn read_flag(store: &dyn PreferenceStore, key: &str, default: bool) -> bool {
    match store.get(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<bool>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Ignoring malformed preference {} = {:?}", key, raw);
                default
            }
        },
    }
}

pub fn write_flag(store: &mut dyn PreferenceStore, key: &str, value: bool) -> Result<(), PrefsError> {
    store.set(key, if value { "true" } else { "false" })
}

/// Store key for a category's logging flag
pub fn category_key(category: EventCategory) -> String {
    format!("log.{}", category.name())
}

/// Preference flags as read at initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub logged: HashMap<EventCategory, bool>,
    pub perf_overlay: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            logged: EventCategory::ALL
                .iter()
                .map(|&c| (c, c.logged_by_default()))
                .collect(),
            perf_overlay: false,
        }
    }
}

impl Preferences {
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let logged = EventCategory::ALL
            .iter()
            .map(|&c| (c, read_flag(store, &category_key(c), c.logged_by_default())))
            .collect();
        Self {
            logged,
            perf_overlay: read_flag(store, PERF_OVERLAY_KEY, false),
        }
    }

    pub fn save(&self, store: &mut dyn PreferenceStore) -> Result<(), PrefsError> {
        for category in EventCategory::ALL {
            write_flag(store, &category_key(category), self.is_logged(category))?;
        }
        write_flag(store, PERF_OVERLAY_KEY, self.perf_overlay)
    }

    pub fn is_logged(&self, category: EventCategory) -> bool {
        self.logged
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.logged_by_default())
    }

    pub fn set_logged(&mut self, category: EventCategory, logged: bool) {
        self.logged.insert(category, logged);
    }
}
