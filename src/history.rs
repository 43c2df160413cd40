use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use dialoguer::{Select, theme::ColorfulTheme};
use dirs_next::data_dir;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::types::Translation;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryEntry {
    pub show_id: String,
    pub show_title: String,
    pub episode: String,
    pub translation: Translation,
    pub watched_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct History {
    pub entries: Vec<HistoryEntry>,
}

impl History {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read history file {}", path.display()))?;
        let history = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse history file {}", path.display()))?;
        Ok(history)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create history directory {}", parent.display())
            })?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("failed to write history file {}", path.display()))?;
        Ok(())
    }

    pub fn upsert(&mut self, entry: HistoryEntry) {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|e| e.show_id == entry.show_id && e.translation == entry.translation)
        {
            self.entries.remove(pos);
        }
        self.entries.insert(0, entry);
    }

    pub fn last_episode(&self, show_id: &str, translation: Translation) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.show_id == show_id && e.translation == translation)
            .map(|e| e.episode.clone())
    }

    pub fn select_entry(&self) -> Result<Option<HistoryEntry>> {
        if self.entries.is_empty() {
            println!("History is empty.");
            return Ok(None);
        }

        let items: Vec<String> = self
            .entries
            .iter()
            .map(|entry| {
                format!(
                    "[{}] {} · episode {} · watched {}",
                    entry.translation.label(),
                    entry.show_title,
                    entry.episode,
                    entry.watched_at.format("%Y-%m-%d %H:%M")
                )
            })
            .collect();

        let selection = Select::with_theme(&theme())
            .with_prompt("Select an entry to replay (Esc to cancel)")
            .items(&items)
            .default(0)
            .interact_opt()?;
        Ok(selection.map(|idx| self.entries[idx].clone()))
    }
}

pub fn history_path() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(base.join("stremo").join("history.json"))
}

pub fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(show_id: &str, episode: &str, translation: Translation) -> HistoryEntry {
        HistoryEntry {
            show_id: show_id.to_string(),
            show_title: format!("Show {show_id}"),
            episode: episode.to_string(),
            translation,
            watched_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_replaces_entry_for_same_show_and_translation() {
        let mut history = History::default();
        history.upsert(entry("a", "1", Translation::Sub));
        history.upsert(entry("a", "2", Translation::Sub));
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.last_episode("a", Translation::Sub).as_deref(), Some("2"));
    }

    #[test]
    fn upsert_keeps_translations_separate() {
        let mut history = History::default();
        history.upsert(entry("a", "1", Translation::Sub));
        history.upsert(entry("a", "3", Translation::Dub));
        assert_eq!(history.entries.len(), 2);
        assert_eq!(history.last_episode("a", Translation::Sub).as_deref(), Some("1"));
        assert_eq!(history.last_episode("a", Translation::Dub).as_deref(), Some("3"));
    }

    #[test]
    fn newest_entry_comes_first() {
        let mut history = History::default();
        history.upsert(entry("a", "1", Translation::Sub));
        history.upsert(entry("b", "5", Translation::Sub));
        assert_eq!(history.entries[0].show_id, "b");
    }
}
