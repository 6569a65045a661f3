// Operator settings
// Loaded from ~/.config/ledgergrid/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which services `lgrid run` performs when no task flag is given
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    pub paste: bool,
    pub update: bool,
    pub delete: bool,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self { paste: false, update: true, delete: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    /// Update writes back into the input workbook instead of `<stem>_updated.xlsx`
    pub overwrite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasteSettings {
    /// Folder holding the `<MM>月` report folders
    pub input_root: Option<PathBuf>,
    /// Vendor prefix tried when a report has no file of its own name
    pub vendor_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// env_logger filter used when RUST_LOG is unset
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub modules: ModuleSettings,
    pub files: FileSettings,
    pub paste: PasteSettings,
    pub log: LogSettings,
}

const DEFAULT_FILE: &str = r#"# ledgergrid settings

# Services `lgrid run` performs when no --paste/--update/--delete flag is given
[modules]
paste = false
update = true
delete = true

[files]
# true: update overwrites the input workbook
# false: update writes <name>_updated.xlsx next to it
overwrite = false

[paste]
# input_root = "D:/reports"
vendor_id = ""

[log]
# error, warn, info, debug or trace; RUST_LOG takes precedence
level = "info"
"#;

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ledgergrid");
        config_dir.join("settings.toml")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load from a specific file. A missing file is created with defaults;
    /// an unreadable or invalid one yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            create_default_file(path);
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("Error parsing {}: {}", path.display(), e);
                    log::warn!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let text = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, text).map_err(|e| e.to_string())
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

/// Write the commented default file
fn create_default_file(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            log::warn!("Error creating config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, DEFAULT_FILE) {
        log::warn!("Error writing default {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_parses_to_defaults() {
        assert_eq!(Settings::from_toml(DEFAULT_FILE).unwrap(), Settings::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings = Settings::from_toml("[files]\noverwrite = true\n").unwrap();
        assert!(settings.files.overwrite);
        assert_eq!(settings.modules, ModuleSettings::default());
        assert_eq!(settings.log.level, "info");
    }

    #[test]
    fn missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let settings = Settings::load_from(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[modules\npaste = ").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut settings = Settings::default();
        settings.modules.paste = true;
        settings.paste.input_root = Some(PathBuf::from("/data/reports"));
        settings.paste.vendor_id = "A01".to_string();
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
    }
}
