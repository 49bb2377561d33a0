/*!
 # Config entries

 A [`ConfigEntry`] is the persisted record of one configured lamp. The
 [`ConfigStore`] keeps all entries in a single JSON file.
*/

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{Error, Result};

/// Name used when an entry carries none
pub const DEFAULT_NAME: &str = "Sunset Lamp";

/// User-provided data of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    #[serde(default = "default_name")]
    pub name: String,
    pub mac_address: String,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// The persisted record of one configured device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub version: u32,
    pub title: String,
    pub data: EntryData,
}

impl ConfigEntry {
    pub fn new(name: &str, mac_address: &str) -> Self {
        Self::from_data(
            name,
            EntryData {
                name: name.to_string(),
                mac_address: mac_address.to_string(),
            },
        )
    }

    pub fn from_data(title: &str, data: EntryData) -> Self {
        Self {
            entry_id: Uuid::new_v4().simple().to_string(),
            version: crate::config_flow::ConfigFlow::VERSION,
            title: title.to_string(),
            data,
        }
    }

    /// Matches on entry id, title, name or MAC address (case-insensitive)
    pub fn matches(&self, query: &str) -> bool {
        self.entry_id == query
            || self.title.eq_ignore_ascii_case(query)
            || self.data.name.eq_ignore_ascii_case(query)
            || self.data.mac_address.eq_ignore_ascii_case(query)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    entries: Vec<ConfigEntry>,
}

/// JSON-file backed list of config entries
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/sunset-lamp/entries.json`, falling back to the working directory
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sunset-lamp")
            .join("entries.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all entries. A missing file is an empty store.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Vec<ConfigEntry>> {
        if !self.path.exists() {
            debug!("No config store yet");
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let file: StoreFile = serde_json::from_str(&raw)?;
        debug!("Loaded {} entries", file.entries.len());
        Ok(file.entries)
    }

    fn save(&self, entries: Vec<ConfigEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&StoreFile { entries })?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.entry_id))]
    pub fn add(&self, entry: ConfigEntry) -> Result<()> {
        let mut entries = self.load()?;
        entries.push(entry);
        self.save(entries)?;
        info!("Config entry saved");
        Ok(())
    }

    /// Removes and returns the first entry matching `query`
    #[instrument(skip(self))]
    pub fn remove(&self, query: &str) -> Result<ConfigEntry> {
        let mut entries = self.load()?;
        let index = entries
            .iter()
            .position(|e| e.matches(query))
            .ok_or_else(|| Error::EntryNotFound(query.to_string()))?;
        let removed = entries.remove(index);
        self.save(entries)?;
        info!("Config entry {} removed", removed.entry_id);
        Ok(removed)
    }

    /// Finds an entry by query, or the only/first entry when no query is given
    pub fn find(&self, query: Option<&str>) -> Result<ConfigEntry> {
        let entries = self.load()?;
        let found = match query {
            Some(q) => entries.into_iter().find(|e| e.matches(q)),
            None => entries.into_iter().next(),
        };
        found.ok_or_else(|| Error::EntryNotFound(query.unwrap_or("<any>").to_string()))
    }
}
