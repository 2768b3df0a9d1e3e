//! The discoverable game-id → executable-filename map and save-directory
//! override named by §6 "CLI / env". Read from a TOML file so a single
//! `gamos` binary can be pointed at any number of installed games without a
//! recompile, the way the teacher's frontend reads its machine/ROM-path
//! configuration.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Game id → path of the self-contained executable embedding its
    /// `=VS=` archive.
    #[serde(default)]
    pub games: HashMap<String, PathBuf>,
    /// Overrides the platform save directory [`dirs::data_dir`] resolves by default.
    #[serde(default)]
    pub save_dir: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    UnknownGame(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config: {e}"),
            Self::Parse(e) => write!(f, "failed to parse config: {e}"),
            Self::UnknownGame(id) => write!(f, "no game registered under id {id:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&text).map_err(ConfigError::Parse)
    }

    pub fn archive_path(&self, game_id: &str) -> Result<&Path, ConfigError> {
        self.games
            .get(game_id)
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::UnknownGame(game_id.to_string()))
    }

    /// Resolves the save directory: the config override if set, otherwise
    /// the platform data directory under a fixed subdirectory.
    pub fn resolved_save_dir(&self) -> PathBuf {
        self.save_dir.clone().unwrap_or_else(|| dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("gamos"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_game_map_and_save_dir() {
        let toml = r#"
            save_dir = "/tmp/saves"

            [games]
            joust = "/opt/games/joust.exe"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.archive_path("joust").unwrap(), Path::new("/opt/games/joust.exe"));
        assert_eq!(cfg.save_dir, Some(PathBuf::from("/tmp/saves")));
    }

    #[test]
    fn unknown_game_id_is_an_error() {
        let cfg = Config::default();
        assert!(cfg.archive_path("nope").is_err());
    }
}
