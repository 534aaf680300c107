use crate::model::{Preferences, Theme};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable light/dark preference, read once and written on every toggle.
#[derive(Debug)]
pub struct ThemeStore {
    path: PathBuf,
    theme: Theme,
}

impl ThemeStore {
    pub fn load(path: &Path) -> Self {
        let theme = match read_preferences(path) {
            Ok(preferences) => preferences.theme,
            Err(err) => {
                warn!("using default theme: {err:#}");
                Theme::default()
            }
        };
        debug!("theme is {}", theme.label());
        Self {
            path: path.to_path_buf(),
            theme,
        }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn toggle(&mut self) -> Result<Theme> {
        self.theme = self.theme.toggle();
        write_preferences(&self.path, &Preferences { theme: self.theme })?;
        Ok(self.theme)
    }
}

fn read_preferences(path: &Path) -> Result<Preferences> {
    if !path.exists() {
        return Ok(Preferences::default());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_preferences(path: &Path, preferences: &Preferences) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(preferences)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
