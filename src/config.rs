//! Environment-derived configuration for the ingest daemon: the loopback
//! port, the optional shared-secret token, and where the two SQLite
//! databases live on this machine.

use crate::error::{ReplayError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 17888;

pub struct Config {
    pub ingest_port: u16,
    pub ingest_token: Option<String>,
    pub runs_db_path: PathBuf,
    pub live_db_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "stake-replay", "stake-replay").ok_or_else(|| {
            ReplayError::system("NO_HOME_DIR", "could not resolve a per-user config directory")
        })?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .map_err(|e| ReplayError::system("IO_ERROR", "failed to create config dir").with_cause(e))?;

        let ingest_port = std::env::var("LIVE_INGEST_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let ingest_token = std::env::var("LIVE_INGEST_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self {
            ingest_port,
            ingest_token,
            runs_db_path: data_dir.join("runs.sqlite3"),
            live_db_path: data_dir.join("live.sqlite3"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both env vars are exercised in one test to avoid races between parallel
    // test threads mutating the same process-global environment.
    #[test]
    fn load_falls_back_to_defaults_then_honors_env_overrides() {
        std::env::remove_var("LIVE_INGEST_PORT");
        std::env::remove_var("LIVE_INGEST_TOKEN");
        let defaulted = Config::load().unwrap();
        assert_eq!(defaulted.ingest_port, DEFAULT_PORT);
        assert!(defaulted.ingest_token.is_none());
        assert!(defaulted.runs_db_path.ends_with("runs.sqlite3"));
        assert!(defaulted.live_db_path.ends_with("live.sqlite3"));

        std::env::set_var("LIVE_INGEST_PORT", "9999");
        std::env::set_var("LIVE_INGEST_TOKEN", "secret");
        let overridden = Config::load().unwrap();
        assert_eq!(overridden.ingest_port, 9999);
        assert_eq!(overridden.ingest_token.as_deref(), Some("secret"));

        std::env::remove_var("LIVE_INGEST_PORT");
        std::env::remove_var("LIVE_INGEST_TOKEN");
    }

    #[test]
    fn empty_token_env_var_disables_auth() {
        std::env::set_var("LIVE_INGEST_TOKEN", "");
        let config = Config::load().unwrap();
        assert!(config.ingest_token.is_none());
        std::env::remove_var("LIVE_INGEST_TOKEN");
    }
}
