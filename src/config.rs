use crate::model::{MediaEntry, MediaTable, Settings};
use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "nitnem";
const SETTINGS_FILE: &str = "settings.json";
const PREFERENCES_FILE: &str = "preferences.json";
const PLAYLIST_FILE: &str = "playlist.json";
const LOG_FILE: &str = "nitnem.log";
const CACHE_DIR: &str = "cache";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("NITNEM_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

pub fn preferences_path(root: &Path) -> PathBuf {
    root.join(PREFERENCES_FILE)
}

pub fn playlist_path(root: &Path) -> PathBuf {
    root.join(PLAYLIST_FILE)
}

pub fn log_path(root: &Path) -> PathBuf {
    root.join(LOG_FILE)
}

pub fn cache_root(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

pub fn ensure_config_dir(root: &Path) -> Result<()> {
    fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))
}

/// Reads `settings.json`, writing the defaults on first run so they can be edited.
pub fn load_settings(root: &Path) -> Result<Settings> {
    let path = settings_path(root);
    if !path.exists() {
        let settings = Settings::default();
        save_settings(root, &settings)?;
        return Ok(settings);
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(root: &Path, settings: &Settings) -> Result<()> {
    ensure_config_dir(root)?;
    let path = settings_path(root);
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Loads the playlist override, or the built-in Nitnem table when there is none.
pub fn load_table(root: &Path) -> Result<MediaTable> {
    let path = playlist_path(root);
    if !path.exists() {
        return Ok(MediaTable::nitnem());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read playlist file {}", path.display()))?;
    let entries: Vec<MediaEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse playlist file {}", path.display()))?;
    MediaTable::new(entries).with_context(|| format!("invalid playlist in {}", path.display()))
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    strip_windows_verbatim_prefix(&canonical)
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_load_writes_default_settings() {
        let dir = tempdir().expect("tempdir");
        let settings = load_settings(dir.path()).expect("load");
        assert_eq!(settings.retry_delay_ms, 3000);
        assert!(settings_path(dir.path()).exists());

        let mut changed = settings.clone();
        changed.retry_limit = None;
        save_settings(dir.path(), &changed).expect("save");
        let loaded = load_settings(dir.path()).expect("reload");
        assert_eq!(loaded.retry_limit, None);
    }

    #[test]
    fn missing_playlist_uses_builtin_table() {
        let dir = tempdir().expect("tempdir");
        let table = load_table(dir.path()).expect("table");
        assert_eq!(table, MediaTable::nitnem());
    }

    #[test]
    fn playlist_override_is_validated() {
        let dir = tempdir().expect("tempdir");
        fs::write(playlist_path(dir.path()), "[]").expect("write");
        assert!(load_table(dir.path()).is_err());

        fs::write(
            playlist_path(dir.path()),
            r#"[{"id":"a","title":"First","source":"https://example.com/a"}]"#,
        )
        .expect("write");
        let table = load_table(dir.path()).expect("table");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0).map(|e| e.title.as_str()), Some("First"));
    }

    #[test]
    fn strips_windows_verbatim_prefix() {
        let cleaned = strip_windows_verbatim_prefix(Path::new(r"\\?\E:\Nitnem\japji.mp3"));
        assert_eq!(cleaned, PathBuf::from(r"E:\Nitnem\japji.mp3"));
    }
}
