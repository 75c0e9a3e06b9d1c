//! Engine-level configuration loading for match pacing and scoring rules.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the engine looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/engine.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_DUEL_CONFIG_PATH";

/// Number of questions dealt per match when the config does not say otherwise.
const DEFAULT_QUESTION_COUNT: u32 = 20;
/// Per-question countdown budget in seconds.
const DEFAULT_QUESTION_TIME_SECS: u32 = 30;
/// Points awarded for a correct answer.
const DEFAULT_POINTS_PER_CORRECT: i32 = 10;
/// Maximum number of players allowed per team.
const DEFAULT_MAX_TEAM_SIZE: usize = 4;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the engine.
pub struct EngineConfig {
    /// Number of questions dealt to a match at start time.
    pub question_count: u32,
    /// Countdown budget, in seconds, each player gets per question.
    pub question_time_secs: u32,
    /// Points credited for a correct answer.
    pub points_per_correct: i32,
    /// Hard cap on the number of players per team.
    pub max_team_size: usize,
}

impl EngineConfig {
    /// Load the engine configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        questions = config.question_count,
                        seconds_per_question = config.question_time_secs,
                        "loaded engine config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            question_count: DEFAULT_QUESTION_COUNT,
            question_time_secs: DEFAULT_QUESTION_TIME_SECS,
            points_per_correct: DEFAULT_POINTS_PER_CORRECT,
            max_team_size: DEFAULT_MAX_TEAM_SIZE,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    question_count: Option<u32>,
    question_time_secs: Option<u32>,
    points_per_correct: Option<i32>,
    max_team_size: Option<usize>,
}

impl From<RawConfig> for EngineConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = EngineConfig::default();
        Self {
            question_count: value.question_count.unwrap_or(defaults.question_count),
            question_time_secs: value
                .question_time_secs
                .unwrap_or(defaults.question_time_secs),
            points_per_correct: value
                .points_per_correct
                .unwrap_or(defaults.points_per_correct),
            max_team_size: value.max_team_size.unwrap_or(defaults.max_team_size),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.question_count, 20);
        assert_eq!(config.question_time_secs, 30);
        assert_eq!(config.points_per_correct, 10);
        assert_eq!(config.max_team_size, 4);
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let raw: RawConfig = serde_json::from_str(r#"{"question_count": 5}"#).unwrap();
        let config: EngineConfig = raw.into();
        assert_eq!(config.question_count, 5);
        assert_eq!(config.question_time_secs, 30);
        assert_eq!(config.max_team_size, 4);
    }
}
