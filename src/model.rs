use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaEntry {
    pub id: String,
    pub title: String,
    pub source: String,
}

impl MediaEntry {
    pub fn new(id: &str, title: &str, source: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            source: source.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TableError {
    #[error("playlist has no entries")]
    Empty,
    #[error("entry {0} has an empty id")]
    EmptyId(usize),
}

/// Ordered, read-only list of media references for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTable {
    entries: Vec<MediaEntry>,
}

impl MediaTable {
    pub fn new(entries: Vec<MediaEntry>) -> Result<Self, TableError> {
        if entries.is_empty() {
            return Err(TableError::Empty);
        }
        if let Some(position) = entries.iter().position(|entry| entry.id.trim().is_empty()) {
            return Err(TableError::EmptyId(position));
        }
        Ok(Self { entries })
    }

    /// The daily Nitnem prayers, in recitation order.
    pub fn nitnem() -> Self {
        Self {
            entries: vec![
                MediaEntry::new(
                    "FJlBFhE0J4w",
                    "1. Japji Sahib",
                    "https://www.youtube.com/watch?v=FJlBFhE0J4w",
                ),
                MediaEntry::new(
                    "MbC9pGsY2Ag",
                    "2. Jaap Sahib",
                    "https://www.youtube.com/watch?v=MbC9pGsY2Ag",
                ),
                MediaEntry::new(
                    "Gks0Q9v1aRI",
                    "3. Tav Parshad Savaiye",
                    "https://www.youtube.com/watch?v=Gks0Q9v1aRI",
                ),
                MediaEntry::new(
                    "B1pYt8HaEBY",
                    "4. Chaupai Sahib",
                    "https://www.youtube.com/watch?v=B1pYt8HaEBY",
                ),
                MediaEntry::new(
                    "67zW9q-_LYQ",
                    "5. Anand Sahib",
                    "https://www.youtube.com/watch?v=67zW9q-_LYQ",
                ),
                MediaEntry::new(
                    "RRt5f0eAp4I",
                    "6. Rehras Sahib",
                    "https://youtu.be/vr8DGObwZwQ?si=TwLnp7ob4HzBA0GB",
                ),
                MediaEntry::new(
                    "5S1LEg6MzdQ",
                    "7. Sohaila Sahib",
                    "https://www.youtube.com/watch?v=5S1LEg6MzdQ",
                ),
                MediaEntry::new(
                    "gyA4SukHK-E",
                    "8. Simran",
                    "https://www.youtube.com/watch?v=gyA4SukHK-E",
                ),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&MediaEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub media_dir: Option<PathBuf>,
    #[serde(default)]
    pub media_base_url: Option<String>,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_advance_delay_ms")]
    pub advance_delay_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: Option<u32>,
    #[serde(default = "default_cache_generation")]
    pub cache_generation: String,
    #[serde(default = "default_runtime_cache")]
    pub runtime_cache: String,
    #[serde(default = "default_runtime_hosts")]
    pub runtime_hosts: Vec<String>,
    #[serde(default)]
    pub precache_urls: Vec<String>,
    #[serde(default = "default_offline_document")]
    pub offline_document: String,
}

fn default_settle_delay_ms() -> u64 {
    1500
}

fn default_advance_delay_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_retry_limit() -> Option<u32> {
    Some(5)
}

fn default_cache_generation() -> String {
    String::from("nitnem-app-v2")
}

fn default_runtime_cache() -> String {
    String::from("youtube-api-v1")
}

fn default_runtime_hosts() -> Vec<String> {
    vec![String::from("www.youtube.com")]
}

fn default_offline_document() -> String {
    String::from("/index.html")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            media_dir: None,
            media_base_url: None,
            settle_delay_ms: default_settle_delay_ms(),
            advance_delay_ms: default_advance_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_limit: default_retry_limit(),
            cache_generation: default_cache_generation(),
            runtime_cache: default_runtime_cache(),
            runtime_hosts: default_runtime_hosts(),
            precache_urls: Vec::new(),
            offline_document: default_offline_document(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nitnem_table_has_eight_prayers_in_order() {
        let table = MediaTable::nitnem();
        assert_eq!(table.len(), 8);
        assert_eq!(table.last_index(), 7);
        assert_eq!(table.get(0).map(|e| e.title.as_str()), Some("1. Japji Sahib"));
        assert_eq!(table.get(7).map(|e| e.id.as_str()), Some("gyA4SukHK-E"));
    }

    #[test]
    fn table_rejects_empty_and_blank_ids() {
        assert_eq!(MediaTable::new(Vec::new()), Err(TableError::Empty));
        let entries = vec![MediaEntry::new("a", "A", ""), MediaEntry::new(" ", "B", "")];
        assert_eq!(MediaTable::new(entries), Err(TableError::EmptyId(1)));
    }

    #[test]
    fn theme_serializes_lowercase() {
        let json = serde_json::to_string(&Preferences { theme: Theme::Dark }).expect("json");
        assert_eq!(json, r#"{"theme":"dark"}"#);
        assert_eq!(Theme::Dark.toggle(), Theme::Light);
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"retry_limit":null,"retry_delay_ms":10}"#).expect("parse");
        assert_eq!(settings.retry_limit, None);
        assert_eq!(settings.retry_delay_ms, 10);
        assert_eq!(settings.settle_delay_ms, 1500);
        assert_eq!(settings.cache_generation, "nitnem-app-v2");
    }
}
