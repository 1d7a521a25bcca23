//! Flow configuration
//!
//! Everything tunable about a screening run: stage order, activity windows
//! and detector thresholds. Loaded from JSON; every field has a default so a
//! partial file is enough.

use crate::detection::{BlowConfig, CoverEyesConfig, PointingConfig, SpeechConfig, WaveConfig};
use crate::error::FlowError;
use crate::sequencer::Stage;
use crate::store::DEFAULT_STORAGE_KEY;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseToNameConfig {
    pub window_secs: u64,
}

impl Default for ResponseToNameConfig {
    fn default() -> Self {
        Self { window_secs: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImitationConfig {
    pub wave_secs: u64,
    pub cover_eyes_secs: u64,
    /// Cover-eyes windows before the task counts as failed
    pub cover_eyes_attempts: u32,
}

impl Default for ImitationConfig {
    fn default() -> Self {
        Self {
            wave_secs: 7,
            cover_eyes_secs: 15,
            cover_eyes_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlowOutCandlesConfig {
    pub duration_secs: u64,
}

impl Default for BlowOutCandlesConfig {
    fn default() -> Self {
        Self { duration_secs: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShapeMatchConfig {
    pub duration_secs: u64,
    /// Drops closer than this (px) to the target snap into place
    pub snap_distance: f64,
}

impl Default for ShapeMatchConfig {
    fn default() -> Self {
        Self {
            duration_secs: 60,
            snap_distance: 60.0,
        }
    }
}

/// Complete configuration of a screening flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowConfig {
    /// File name (without extension) of the stored session record
    pub storage_key: String,
    pub stages: Vec<Stage>,
    pub response_to_name: ResponseToNameConfig,
    pub imitation: ImitationConfig,
    pub blow_out_candles: BlowOutCandlesConfig,
    pub shape_match: ShapeMatchConfig,
    pub speech: SpeechConfig,
    pub wave: WaveConfig,
    pub cover_eyes: CoverEyesConfig,
    pub pointing: PointingConfig,
    pub blow: BlowConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            stages: Stage::DEFAULT_ORDER.to_vec(),
            response_to_name: ResponseToNameConfig::default(),
            imitation: ImitationConfig::default(),
            blow_out_candles: BlowOutCandlesConfig::default(),
            shape_match: ShapeMatchConfig::default(),
            speech: SpeechConfig::default(),
            wave: WaveConfig::default(),
            cover_eyes: CoverEyesConfig::default(),
            pointing: PointingConfig::default(),
            blow: BlowConfig::default(),
        }
    }
}

impl FlowConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        let config: FlowConfig = serde_json::from_str(json)
            .map_err(|e| FlowError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, FlowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Same configuration with a different stage list
    pub fn with_stages(mut self, stages: Vec<Stage>) -> Self {
        self.stages = stages;
        self
    }

    /// Reject configurations no flow can run with. An empty stage list is
    /// allowed; such a flow completes immediately.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.storage_key.trim().is_empty() {
            return Err(FlowError::InvalidConfig("storageKey must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if !seen.insert(stage) {
                return Err(FlowError::InvalidConfig(format!(
                    "stage {} is listed more than once",
                    stage
                )));
            }
        }

        let windows = [
            ("responseToName.windowSecs", self.response_to_name.window_secs),
            ("imitation.waveSecs", self.imitation.wave_secs),
            ("imitation.coverEyesSecs", self.imitation.cover_eyes_secs),
            ("blowOutCandles.durationSecs", self.blow_out_candles.duration_secs),
            ("shapeMatch.durationSecs", self.shape_match.duration_secs),
        ];
        if let Some((name, _)) = windows.iter().find(|(_, secs)| *secs == 0) {
            return Err(FlowError::InvalidConfig(format!("{} must be positive", name)));
        }

        if self.imitation.cover_eyes_attempts == 0 {
            return Err(FlowError::InvalidConfig(
                "imitation.coverEyesAttempts must be positive".to_string(),
            ));
        }
        if self.speech.languages.is_empty() {
            return Err(FlowError::InvalidConfig(
                "speech.languages must list at least one language".to_string(),
            ));
        }
        if self.shape_match.snap_distance <= 0.0 {
            return Err(FlowError::InvalidConfig(
                "shapeMatch.snapDistance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Language;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.storage_key, "currentScreening");
        assert_eq!(config.stages, Stage::DEFAULT_ORDER.to_vec());
        assert_eq!(config.response_to_name.window_secs, 20);
        assert_eq!(config.imitation.wave_secs, 7);
        assert_eq!(config.shape_match.snap_distance, 60.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = FlowConfig::from_json(
            r#"{
                "stages": ["questionnaire", "responseToName", "blowOutCandles"],
                "speech": {"languages": ["en", "fr"]},
                "blowOutCandles": {"durationSecs": 5}
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.stages,
            vec![Stage::Questionnaire, Stage::ResponseToName, Stage::BlowOutCandles]
        );
        assert_eq!(config.speech.languages, vec![Language::En, Language::Fr]);
        assert_eq!(config.speech.cooldown_ms, 1500.0);
        assert_eq!(config.blow_out_candles.duration_secs, 5);
        assert_eq!(config.imitation.cover_eyes_attempts, 2);
    }

    #[test]
    fn test_empty_stage_list_is_valid() {
        let config = FlowConfig::from_json(r#"{"stages": []}"#).unwrap();
        assert!(config.stages.is_empty());
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let result = FlowConfig::from_json(r#"{"stages": ["welcome", "welcome"]}"#);
        assert!(matches!(result, Err(FlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = FlowConfig::from_json(r#"{"shapeMatch": {"durationSecs": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("shapeMatch.durationSecs"));
    }

    #[test]
    fn test_no_languages_rejected() {
        let result = FlowConfig::from_json(r#"{"speech": {"languages": []}}"#);
        assert!(matches!(result, Err(FlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_unknown_stage_is_parse_error() {
        let result = FlowConfig::from_json(r#"{"stages": ["results"]}"#);
        assert!(matches!(result, Err(FlowError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.json");
        let written = FlowConfig::default().with_stages(vec![Stage::Welcome]);
        std::fs::write(&path, written.to_json().unwrap()).unwrap();

        let loaded = FlowConfig::load(&path).unwrap();
        assert_eq!(loaded, written);
    }
}
