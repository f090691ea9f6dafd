//! INI file configuration adapter.

use crate::domain::error::FlowtraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

/// Section and key names are case-insensitive.
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FlowtraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| FlowtraderError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, FlowtraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| FlowtraderError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    /// `section.key` names present in the file but absent from `known`,
    /// sorted.
    pub fn unknown_keys(&self, known: &[(&str, &str)]) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .config
            .get_map_ref()
            .iter()
            .flat_map(|(section, keys)| keys.keys().map(move |key| (section, key)))
            .filter(|(section, key)| !known.iter().any(|(s, k)| s == section && k == key))
            .map(|(section, key)| format!("{}.{}", section, key))
            .collect();
        unknown.sort();
        unknown
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }
}
