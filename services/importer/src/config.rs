use std::path::PathBuf;

use crate::import::DEFAULT_ASSET_MARKER;

const DEFAULT_DB_URL: &str = "sqlite://data/podcasts.db";
const DEFAULT_INITIAL_LOGS_DIR: &str = "data/initial_logs";

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_url: String,
    pub asset_marker: String,
    pub initial_logs_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            db_url: lookup("DB_URL").unwrap_or_else(|| DEFAULT_DB_URL.to_string()),
            asset_marker: lookup("ASSET_PATH_MARKER")
                .filter(|marker| !marker.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ASSET_MARKER.to_string()),
            initial_logs_dir: PathBuf::from(
                lookup("INITIAL_LOGS_DIR").unwrap_or_else(|| DEFAULT_INITIAL_LOGS_DIR.to_string()),
            ),
        }
    }

    /// On-disk database file behind `db_url`, if any (`None` for in-memory).
    pub fn database_file(&self) -> Option<PathBuf> {
        let rest = self
            .db_url
            .strip_prefix("sqlite://")
            .or_else(|| self.db_url.strip_prefix("sqlite:"))?;
        let path = rest.split('?').next().unwrap_or(rest);
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]);
        assert_eq!(c.db_url, "sqlite://data/podcasts.db");
        assert_eq!(c.asset_marker, "/wp-content/uploads");
        assert_eq!(c.initial_logs_dir, PathBuf::from("data/initial_logs"));
    }

    #[test]
    fn test_overrides() {
        let c = config(&[("DB_URL", "sqlite:/tmp/x.db?mode=rwc"), ("ASSET_PATH_MARKER", "/media")]);
        assert_eq!(c.asset_marker, "/media");
        assert_eq!(c.database_file(), Some(PathBuf::from("/tmp/x.db")));
    }

    #[test]
    fn test_blank_marker_falls_back() {
        assert_eq!(config(&[("ASSET_PATH_MARKER", "  ")]).asset_marker, "/wp-content/uploads");
    }

    #[test]
    fn test_database_file() {
        assert_eq!(config(&[]).database_file(), Some(PathBuf::from("data/podcasts.db")));
        assert_eq!(config(&[("DB_URL", "sqlite::memory:")]).database_file(), None);
    }
}
