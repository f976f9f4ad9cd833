use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct JuggleConfig {
    pub motion: MotionConfig,
    pub pattern: PatternConfig,
    pub action: ActionConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MotionConfig {
    /// Minimum vertical displacement (normalized units) between frames to count as movement
    #[serde(default = "default_movement_threshold")]
    pub movement_threshold: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PatternConfig {
    /// Maximum seconds between two upward swings for them to chain
    #[serde(default = "default_alternation_window_seconds")]
    pub alternation_window_seconds: f64,

    /// Number of chained upward swings that confirms the pattern
    #[serde(default = "default_alternation_threshold")]
    pub alternation_threshold: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Only log the confirmation
    Log,
    /// Run an external program and wait for it to exit
    Command,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ActionConfig {
    #[serde(default = "default_action_kind")]
    pub kind: ActionKind,

    /// Program and arguments for the `command` action, e.g. a media player and a clip
    #[serde(default = "default_action_command")]
    pub command: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

/// Longest accepted alternation window
pub const MAX_ALTERNATION_WINDOW_SECONDS: f64 = 3600.0;

impl PatternConfig {
    /// Window as a `Duration`. NaN or non-positive seconds give a zero window,
    /// out-of-range values saturate.
    pub fn alternation_window(&self) -> Duration {
        let secs = self.alternation_window_seconds;
        Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        })
    }
}

impl JuggleConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("jugglecam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("motion.movement_threshold", default_movement_threshold())?
            .set_default(
                "pattern.alternation_window_seconds",
                default_alternation_window_seconds(),
            )?
            .set_default(
                "pattern.alternation_threshold",
                default_alternation_threshold() as i64,
            )?
            .set_default("action.kind", "log")?
            .set_default("action.command", default_action_command())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            // JUGGLECAM_MOTION__MOVEMENT_THRESHOLD=0.03 and friends
            .add_source(
                Environment::with_prefix("JUGGLECAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: JuggleConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.motion.movement_threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::Message(
                "Movement threshold must be a finite, non-negative number".to_string(),
            ));
        }

        let window = self.pattern.alternation_window_seconds;
        if !window.is_finite() || window <= 0.0 || window > MAX_ALTERNATION_WINDOW_SECONDS {
            return Err(ConfigError::Message(format!(
                "Alternation window must be greater than 0 and at most {} seconds",
                MAX_ALTERNATION_WINDOW_SECONDS
            )));
        }

        if self.pattern.alternation_threshold == 0 {
            return Err(ConfigError::Message(
                "Alternation threshold must be greater than 0".to_string(),
            ));
        }

        if self.action.kind == ActionKind::Command && self.action.command.is_empty() {
            return Err(ConfigError::Message(
                "Command action requires a non-empty action.command".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for JuggleConfig {
    fn default() -> Self {
        Self {
            motion: MotionConfig::default(),
            pattern: PatternConfig::default(),
            action: ActionConfig::default(),
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            movement_threshold: default_movement_threshold(),
        }
    }
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            alternation_window_seconds: default_alternation_window_seconds(),
            alternation_threshold: default_alternation_threshold(),
        }
    }
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            kind: default_action_kind(),
            command: default_action_command(),
        }
    }
}

// Default value functions
fn default_movement_threshold() -> f64 {
    0.02
}

fn default_alternation_window_seconds() -> f64 {
    2.0
}
fn default_alternation_threshold() -> u32 {
    4
}

fn default_action_kind() -> ActionKind {
    ActionKind::Log
}
fn default_action_command() -> Vec<String> {
    Vec::new()
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = JuggleConfig::default();

        assert_eq!(config.motion.movement_threshold, 0.02);
        assert_eq!(config.pattern.alternation_window(), Duration::from_secs(2));
        assert_eq!(config.pattern.alternation_threshold, 4);
        assert_eq!(config.action.kind, ActionKind::Log);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[motion]
movement_threshold = 0.05

[pattern]
alternation_threshold = 6

[action]
kind = "command"
command = ["mpv", "clip.mp4"]
"#
        )
        .unwrap();

        let config = JuggleConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.motion.movement_threshold, 0.05);
        assert_eq!(config.pattern.alternation_threshold, 6);
        assert_eq!(config.pattern.alternation_window_seconds, 2.0);
        assert_eq!(config.action.kind, ActionKind::Command);
        assert_eq!(config.action.command, vec!["mpv", "clip.mp4"]);
        assert_eq!(config.system.event_bus_capacity, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = JuggleConfig::load_from_file(dir.path().join("absent.toml")).unwrap();

        assert_eq!(config, JuggleConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = JuggleConfig::default();

        config.pattern.alternation_threshold = 0;
        assert!(config.validate().is_err());
        config.pattern.alternation_threshold = 4;

        config.pattern.alternation_window_seconds = 0.0;
        assert!(config.validate().is_err());
        config.pattern.alternation_window_seconds = 1e20;
        assert!(config.validate().is_err());
        config.pattern.alternation_window_seconds = MAX_ALTERNATION_WINDOW_SECONDS;
        assert!(config.validate().is_ok());
        config.pattern.alternation_window_seconds = 2.0;

        config.motion.movement_threshold = f64::NAN;
        assert!(config.validate().is_err());
        config.motion.movement_threshold = 0.02;

        config.action.kind = ActionKind::Command;
        assert!(config.validate().is_err());
        config.action.command = vec!["true".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_alternation_window_out_of_range() {
        let window = |secs: f64| {
            PatternConfig {
                alternation_window_seconds: secs,
                ..PatternConfig::default()
            }
            .alternation_window()
        };

        assert_eq!(window(1e20), Duration::MAX);
        assert_eq!(window(f64::INFINITY), Duration::MAX);
        assert_eq!(window(-1.0), Duration::ZERO);
        assert_eq!(window(f64::NAN), Duration::ZERO);
        assert_eq!(window(0.5), Duration::from_millis(500));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = JuggleConfig::default();
        let rendered = config.to_toml().unwrap();

        assert!(rendered.contains("movement_threshold"));
        let parsed: JuggleConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
