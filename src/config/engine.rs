use std::fs;
use std::path::{Path, PathBuf};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use crate::advisor::DifficultyPolicy;
use crate::error::{StudyError, ValidationError};
use crate::goals::RateTable;
use crate::pace::{PaceRounding, DEFAULT_ALPHA};
use crate::records::FinePolicy;
use crate::summary::FeedbackBands;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "STUDY_PACE_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaceConfig {
    /// Smoothing factor for each pace update.
    pub alpha: f64,
    pub rounding: PaceRounding,
}

impl Default for PaceConfig {
    fn default() -> Self {
        PaceConfig {
            alpha: DEFAULT_ALPHA,
            rounding: PaceRounding::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub rate_table: RateTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pace store file. `None` keeps pace factors in memory only.
    pub store_path: Option<PathBuf>,
    pub pace: PaceConfig,
    pub difficulty: DifficultyPolicy,
    pub allocation: AllocationConfig,
    pub feedback: FeedbackBands,
    pub fines: FinePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            store_path: Some(data_dir().join("pace.json")),
            pace: PaceConfig::default(),
            difficulty: DifficultyPolicy::default(),
            allocation: AllocationConfig::default(),
            feedback: FeedbackBands::default(),
            fines: FinePolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults with the pace store kept in memory.
    pub fn in_memory() -> Self {
        EngineConfig {
            store_path: None,
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, StudyError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, StudyError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| StudyError::new(
                format!("Failed to read config: {}", e),
                "config"
            ).with_context(format!("path: {:?}", path)))?;
        Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("path: {:?}", path)))
    }

    /// Reject settings that would corrupt pace state or invert a regime.
    pub fn validate(&self) -> Result<(), StudyError> {
        let alpha = self.pace.alpha;
        if !alpha.is_finite() || alpha <= 0.0 || alpha > 1.0 {
            return Err(ValidationError::InvalidAlpha(alpha).into());
        }
        for (name, t) in [
            ("sensitive", self.difficulty.sensitive),
            ("conservative", self.difficulty.conservative),
        ] {
            if !(t.down < t.up) {
                return Err(StudyError::new(
                    format!("{} thresholds must satisfy down < up (down {}, up {})", name, t.down, t.up),
                    "config"
                ));
            }
        }
        let bands = &self.feedback;
        if bands.on_target_low > bands.on_target_high || bands.overall_low > bands.overall_high {
            return Err(StudyError::new("feedback bands must satisfy low <= high", "config"));
        }
        Ok(())
    }
}

/// Platform data directory for the engine's files.
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let mut dir = PathBuf::from(home);
            dir.push("Library/Application Support/com.studypace");
            return dir;
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            let mut dir = PathBuf::from(appdata);
            dir.push("com.studypace");
            return dir;
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let mut dir = PathBuf::from(home);
            dir.push(".local/share/com.studypace");
            return dir;
        }
    }

    PathBuf::from("data")
}

fn get_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("pace.toml"))
}

fn load_engine_config_internal() -> EngineConfig {
    let config_path = get_config_path();

    if !config_path.exists() {
        tracing::info!(path = ?config_path, "No engine config file, using defaults");
        return EngineConfig::default();
    }

    match EngineConfig::load_from_path(&config_path) {
        Ok(config) => {
            tracing::info!(path = ?config_path, "Loaded engine config");
            config
        }
        Err(e) => {
            tracing::warn!(path = ?config_path, error = %e, "Failed to load engine config, using defaults");
            EngineConfig::default()
        }
    }
}

lazy_static! {
    static ref ENGINE_CONFIG: EngineConfig = load_engine_config_internal();
}

/// Process-wide configuration, loaded once on first use.
pub fn get_engine_config() -> &'static EngineConfig {
    &ENGINE_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::Thresholds;

    #[test]
    fn empty_file_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config.pace.alpha, 0.2);
        assert_eq!(config.pace.rounding, PaceRounding::OutputOnly);
        assert_eq!(config.difficulty.sensitive, Thresholds::SENSITIVE);
        assert_eq!(config.difficulty.conservative, Thresholds::CONSERVATIVE);
        assert_eq!(config.allocation.rate_table, RateTable::PerHour);
        assert_eq!(config.fines, FinePolicy { partial: 1000, missed: 2000 });
        assert!(config.store_path.is_some());
    }

    #[test]
    fn partial_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            store_path = "/tmp/pace-test.json"

            [pace]
            rounding = "stored"

            [difficulty.sensitive]
            up = 1.3
            down = 0.6

            [allocation]
            rate_table = "per_half_hour"

            [fines]
            missed = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/pace-test.json")));
        assert_eq!(config.pace.alpha, 0.2);
        assert_eq!(config.pace.rounding, PaceRounding::Stored);
        assert_eq!(config.difficulty.sensitive, Thresholds { up: 1.3, down: 0.6 });
        assert_eq!(config.difficulty.conservative, Thresholds::CONSERVATIVE);
        assert_eq!(config.allocation.rate_table, RateTable::PerHalfHour);
        assert_eq!(config.fines.partial, 1000);
        assert_eq!(config.fines.missed, 5000);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let err = EngineConfig::from_toml_str("[pace]\nalpha = 0.0\n").unwrap_err();
        assert!(err.is_validation());

        let err = EngineConfig::from_toml_str("[difficulty.conservative]\nup = 0.5\ndown = 0.9\n").unwrap_err();
        assert_eq!(err.stage, "config");

        let err = EngineConfig::from_toml_str("[pace]\nalpha = \"fast\"\n").unwrap_err();
        assert_eq!(err.stage, "config");
    }
}
