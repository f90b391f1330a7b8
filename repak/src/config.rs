use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use asset_graph::{MatchList, PatternError};
use pak_write::transform::TransformFailure;
use serde::Deserialize;

// Built-in filters applied to every game on top of any per-game config.
// `/…/` strings are regular expressions, everything else is a substring.
const DEFAULT_EXCLUDE: &[&str] = &["/_[123]\\.md3/", "/\\.map$/"];

const DEFAULT_INCLUDE: &[&str] = &[
    "/\\.cfg$/",
    "/\\.qvm$/",
    "/scripts/.+\\.txt/",
    "botfiles/",
    "fonts/",
    "gfx/",
    "icons/",
    "include/",
    "menu/",
    "models/",
    "music/",
    "powerups/", // powerup shaders
    "sprites/",
    "sound/",
    "ui/",
];

pub const DEFAULT_BASE_GAME: &str = "basejs";
pub const DEFAULT_REFERENCE_THRESHOLD: usize = 3;
pub const DEFAULT_MAX_PAK_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Pattern(PatternError),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Parse(err) => write!(f, "config parse error: {}", err),
            ConfigError::Pattern(err) => write!(f, "config pattern error: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Pattern(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<PatternError> for ConfigError {
    fn from(err: PatternError) -> Self {
        ConfigError::Pattern(err)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnTransformFailure {
    #[default]
    KeepOriginal,
    Drop,
}

impl OnTransformFailure {
    pub fn policy(self) -> TransformFailure {
        match self {
            OnTransformFailure::KeepOriginal => TransformFailure::KeepOriginal,
            OnTransformFailure::Drop => TransformFailure::Drop,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepakConfig {
    #[serde(default = "default_base_game")]
    pub base_game: String,

    #[serde(default = "default_reference_threshold")]
    pub reference_threshold: usize,

    #[serde(default = "default_max_pak_bytes")]
    pub max_pak_bytes: u64,

    #[serde(default)]
    pub on_transform_failure: OnTransformFailure,

    #[serde(default)]
    pub games: HashMap<String, GameConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameConfig {
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub maps: HashMap<String, MapConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapConfig {
    #[serde(default)]
    pub include: Vec<String>,
}

fn default_base_game() -> String {
    DEFAULT_BASE_GAME.to_string()
}

fn default_reference_threshold() -> usize {
    DEFAULT_REFERENCE_THRESHOLD
}

fn default_max_pak_bytes() -> u64 {
    DEFAULT_MAX_PAK_BYTES
}

impl Default for RepakConfig {
    fn default() -> Self {
        RepakConfig {
            base_game: default_base_game(),
            reference_threshold: default_reference_threshold(),
            max_pak_bytes: default_max_pak_bytes(),
            on_transform_failure: OnTransformFailure::default(),
            games: HashMap::new(),
        }
    }
}

impl RepakConfig {
    pub fn parse_toml(text: &str) -> Result<Self, ConfigError> {
        let config: RepakConfig = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                Self::parse_toml(&text)
            }
            None => Ok(RepakConfig::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_threshold < 1 {
            return Err(ConfigError::Invalid(
                "reference_threshold must be at least 1".to_string(),
            ));
        }
        if self.max_pak_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_pak_bytes must be nonzero".to_string(),
            ));
        }
        // Surface bad patterns up front rather than mid-walk.
        for (game, game_config) in &self.games {
            MatchList::parse(&game_config.exclude).map_err(|err| {
                ConfigError::Invalid(format!("games.{}.exclude: {}", game, err))
            })?;
            MatchList::parse(&game_config.include).map_err(|err| {
                ConfigError::Invalid(format!("games.{}.include: {}", game, err))
            })?;
            for (map, map_config) in &game_config.maps {
                MatchList::parse(&map_config.include).map_err(|err| {
                    ConfigError::Invalid(format!("games.{}.maps.{}.include: {}", game, map, err))
                })?;
            }
        }
        Ok(())
    }

    /// Per-game section lookup. Graph identities are lowercased, so a game
    /// directory may not match its section key byte for byte; fall back to a
    /// case-insensitive scan.
    pub fn game_section(&self, game: &str) -> Option<&GameConfig> {
        self.games.get(game).or_else(|| {
            self.games
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(game))
                .map(|(_, game_config)| game_config)
        })
    }

    /// Game exclude filter: per-game entries plus the built-in list.
    pub fn game_exclude(&self, game: &str) -> Result<MatchList, ConfigError> {
        let mut list = match self.game_section(game) {
            Some(game_config) => MatchList::parse(&game_config.exclude)?,
            None => MatchList::new(Vec::new()),
        };
        list.extend(MatchList::parse(&owned(DEFAULT_EXCLUDE))?);
        Ok(list)
    }

    /// Game include whitelist: per-game entries plus the built-in list.
    pub fn game_include(&self, game: &str) -> Result<MatchList, ConfigError> {
        let mut list = match self.game_section(game) {
            Some(game_config) => MatchList::parse(&game_config.include)?,
            None => MatchList::new(Vec::new()),
        };
        list.extend(MatchList::parse(&owned(DEFAULT_INCLUDE))?);
        Ok(list)
    }

    /// Per-map include whitelist, if configured. No built-in entries.
    pub fn map_include(&self, game: &str, map: &str) -> Result<Option<MatchList>, ConfigError> {
        let Some(map_config) = self.game_section(game).and_then(|g| g.maps.get(map)) else {
            return Ok(None);
        };
        Ok(Some(MatchList::parse(&map_config.include)?))
    }
}

fn owned(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|entry| entry.to_string()).collect()
}
