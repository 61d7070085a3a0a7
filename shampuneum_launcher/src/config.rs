use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sl_core::{
    err, IntoIoError, IntoJsonError, JsonFileError, DEFAULT_MAX_MEMORY, DEFAULT_MIN_MEMORY,
};
use sl_instances::InstallOptions;
use sl_mod_manager::BundleRegistry;
use thiserror::Error;

const CONFIG_FILE: &str = "config.json";

/// Global launcher configuration stored in
/// `<launcher dir>/config.json`.
///
/// # Why `Option`?
///
/// Every field is an `Option` for backwards compatibility.
/// If upgrading from an older version,
/// `serde` will deserialize missing fields as `None`,
/// which is treated as a default value.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LauncherConfig {
    /// Like `4G`.
    pub max_memory: Option<String>,
    pub min_memory: Option<String>,
    /// `None` means detect (or download) Java automatically.
    pub java_path: Option<PathBuf>,
    /// `ULTRA`, `MEDIUM` or `LOW`.
    pub modpack: Option<String>,

    pub fov: Option<f32>,
    pub render_distance: Option<u32>,
    pub max_fps: Option<u32>,
    pub language: Option<String>,
    pub auto_connect_server: Option<bool>,

    /// Pre-filled on the next login.
    pub last_username: Option<String>,
    /// Launcher version the user chose not to be asked about again.
    pub skipped_version: Option<String>,
    /// Default: `true`
    pub auto_update_check: Option<bool>,
}

impl LauncherConfig {
    /// Load the launcher configuration from `dir`.
    ///
    /// # Errors
    /// - if the user doesn't have permission to access launcher directory
    ///
    /// This function is designed to *not* fail fast,
    /// resetting the config if it's nonexistent or corrupted
    /// (with an error log message).
    pub fn load_s(dir: &Path) -> Result<Self, JsonFileError> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return LauncherConfig::create(&config_path);
        }

        let config = std::fs::read_to_string(&config_path).path(&config_path)?;
        let config: Self = match serde_json::from_str(&config) {
            Ok(config) => config,
            Err(error) => {
                err!("Invalid launcher config! It was reset, a copy of the old one is in config.json.bak\nError: {error}");
                _ = std::fs::copy(&config_path, dir.join("config.json.bak"));
                return LauncherConfig::create(&config_path);
            }
        };
        Ok(config)
    }

    pub async fn save(&self, dir: &Path) -> Result<(), JsonFileError> {
        let config_path = dir.join(CONFIG_FILE);
        let config = serde_json::to_string_pretty(&self).json_to()?;

        tokio::fs::write(&config_path, config.as_bytes())
            .await
            .path(config_path)?;
        Ok(())
    }

    fn create(path: &Path) -> Result<Self, JsonFileError> {
        let config = LauncherConfig::default();
        std::fs::write(path, serde_json::to_string_pretty(&config).json_to()?.as_bytes())
            .path(path)?;
        Ok(config)
    }

    /// Stops update prompts for exactly `version`.
    /// A newer one will be offered again.
    pub fn skip_version(&mut self, version: &str) {
        self.skipped_version = Some(version.trim().trim_start_matches('v').to_owned());
    }

    #[must_use]
    pub fn c_max_memory(&self) -> String {
        self.max_memory
            .clone()
            .unwrap_or_else(|| DEFAULT_MAX_MEMORY.to_owned())
    }

    #[must_use]
    pub fn c_min_memory(&self) -> String {
        self.min_memory
            .clone()
            .unwrap_or_else(|| DEFAULT_MIN_MEMORY.to_owned())
    }

    #[must_use]
    pub fn c_auto_update_check(&self) -> bool {
        self.auto_update_check.unwrap_or(true)
    }

    /// Install options with every unset field at its default.
    #[must_use]
    pub fn install_options(&self) -> InstallOptions {
        let defaults = InstallOptions::default();
        InstallOptions {
            modpack: self.modpack.clone().unwrap_or(defaults.modpack),
            java_path: self.java_path.clone(),
            fov: self.fov.unwrap_or(defaults.fov),
            render_distance: self.render_distance.unwrap_or(defaults.render_distance),
            max_fps: self.max_fps.unwrap_or(defaults.max_fps),
            language: self.language.clone().unwrap_or(defaults.language),
            auto_connect_server: self
                .auto_connect_server
                .unwrap_or(defaults.auto_connect_server),
        }
    }

    /// Remembers what was used for a successful install.
    pub fn remember(&mut self, options: &InstallOptions) {
        self.modpack = Some(options.bundle_id());
        self.java_path.clone_from(&options.java_path);
        self.fov = Some(options.fov);
        self.render_distance = Some(options.render_distance);
        self.max_fps = Some(options.max_fps);
        self.language = Some(options.language.clone());
        self.auto_connect_server = Some(options.auto_connect_server);
    }

    /// Sets a field from its `settings set` name.
    /// `default` (or `auto` for `java_path`) clears it.
    ///
    /// # Errors
    /// Unknown key, or a value that doesn't fit.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        let clear = value.eq_ignore_ascii_case("default");
        match key {
            "max_memory" => self.max_memory = parse_memory(key, value, clear)?,
            "min_memory" => self.min_memory = parse_memory(key, value, clear)?,
            "java_path" => {
                self.java_path = (!clear && !value.eq_ignore_ascii_case("auto"))
                    .then(|| PathBuf::from(value));
            }
            "modpack" => {
                self.modpack = if clear {
                    None
                } else {
                    let registry = BundleRegistry::default();
                    let bundle = registry.get(value).map_err(|_| SettingError::BadValue {
                        key: key.to_owned(),
                        value: value.to_owned(),
                        expected: registry.ids().join(", "),
                    })?;
                    Some(bundle.id.clone())
                };
            }
            "fov" => self.fov = parse(key, value, clear, "a number like 90")?,
            "render_distance" => {
                self.render_distance = parse(key, value, clear, "a whole number of chunks")?;
            }
            "max_fps" => self.max_fps = parse(key, value, clear, "a whole number")?,
            "language" => self.language = (!clear).then(|| value.to_owned()),
            "auto_connect_server" => {
                self.auto_connect_server = parse(key, value, clear, "true or false")?;
            }
            "last_username" => self.last_username = (!clear).then(|| value.to_owned()),
            "auto_update_check" => {
                self.auto_update_check = parse(key, value, clear, "true or false")?;
            }
            _ => return Err(SettingError::UnknownKey(key.to_owned())),
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(
    key: &str,
    value: &str,
    clear: bool,
    expected: &str,
) -> Result<Option<T>, SettingError> {
    if clear {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| SettingError::BadValue {
            key: key.to_owned(),
            value: value.to_owned(),
            expected: expected.to_owned(),
        })
}

fn parse_memory(key: &str, value: &str, clear: bool) -> Result<Option<String>, SettingError> {
    if clear {
        return Ok(None);
    }
    let upper = value.to_uppercase();
    let digits = upper.trim_end_matches(['M', 'G']);
    if digits.is_empty() || digits.len() == upper.len() || digits.parse::<u32>().is_err() {
        return Err(SettingError::BadValue {
            key: key.to_owned(),
            value: value.to_owned(),
            expected: "a size like 4G or 2048M".to_owned(),
        });
    }
    Ok(Some(upper))
}

#[derive(Debug, Error)]
pub enum SettingError {
    #[error("unknown setting {0:?}")]
    UnknownKey(String),
    #[error("invalid value {value:?} for {key}: expected {expected}")]
    BadValue {
        key: String,
        value: String,
        expected: String,
    },
}
