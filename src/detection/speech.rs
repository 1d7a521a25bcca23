//! Spoken "yes" detection on speech recognizer transcripts

use crate::detection::{Detector, SensorKind};
use serde::{Deserialize, Serialize};

/// Confidence assumed for final results that carry none
const DEFAULT_FINAL_CONFIDENCE: f64 = 0.8;

/// Confidence assumed for interim results that carry none
const DEFAULT_INTERIM_CONFIDENCE: f64 = 0.5;

/// Interim results are accepted slightly below the configured threshold
const INTERIM_THRESHOLD_SLACK: f64 = 0.1;

/// Lowest threshold an interim result is held to
const INTERIM_THRESHOLD_FLOOR: f64 = 0.1;

/// Recognition language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
}

impl Language {
    /// Spellings a recognizer produces for an affirmative answer
    pub fn yes_words(&self) -> &'static [&'static str] {
        match self {
            Language::En => &["yes", "yeah", "yep", "ya", "yah", "yea", "yas", "yaz", "es"],
            Language::Fr => &["oui", "ouai", "ouais"],
        }
    }
}

/// One recognizer result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Recognizer confidence in 0..1, absent on some platforms
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub timestamp_ms: f64,
}

impl Transcript {
    pub fn final_text(text: impl Into<String>, timestamp_ms: f64) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            is_final: true,
            timestamp_ms,
        }
    }
}

/// Yes detection tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpeechConfig {
    pub languages: Vec<Language>,
    pub confidence_threshold: f64,
    /// Qualifying results needed before a detection fires
    pub min_hits: u32,
    /// Minimum gap between two detections
    pub cooldown_ms: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            languages: vec![Language::En],
            confidence_threshold: 0.1,
            min_hits: 1,
            cooldown_ms: 1500.0,
        }
    }
}

/// Lowercase, strip punctuation and squash stretched letters ("yesss" -> "yes")
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let chars: Vec<char> = cleaned.chars().collect();
    let mut squashed = String::with_capacity(cleaned.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        // Runs of three or more collapse to one, shorter runs stay as they are
        let keep = if run >= 3 { 1 } else { run };
        squashed.extend(std::iter::repeat(c).take(keep));
        i += run;
    }

    squashed.trim().to_string()
}

/// Whether any word of the text is an affirmative in one of the languages
pub fn contains_yes(text: &str, languages: &[Language]) -> bool {
    let normalized = normalize(text);
    normalized.split_whitespace().any(|word| {
        languages
            .iter()
            .any(|lang| lang.yes_words().contains(&word))
    })
}

/// Watches recognizer output for a spoken "yes"
#[derive(Debug, Clone)]
pub struct YesDetector {
    config: SpeechConfig,
    hits: u32,
    last_trigger_ms: Option<f64>,
}

impl YesDetector {
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            hits: 0,
            last_trigger_ms: None,
        }
    }

    fn threshold_for(&self, transcript: &Transcript) -> f64 {
        let threshold = self.config.confidence_threshold;
        if transcript.is_final {
            threshold
        } else {
            (threshold - INTERIM_THRESHOLD_SLACK).max(INTERIM_THRESHOLD_FLOOR)
        }
    }
}

impl Default for YesDetector {
    fn default() -> Self {
        Self::new(SpeechConfig::default())
    }
}

impl Detector for YesDetector {
    type Frame = Transcript;

    fn sensor(&self) -> SensorKind {
        SensorKind::SpeechRecognizer
    }

    fn observe(&mut self, transcript: &Transcript) -> bool {
        if !contains_yes(&transcript.text, &self.config.languages) {
            return false;
        }

        let confidence = transcript.confidence.unwrap_or(if transcript.is_final {
            DEFAULT_FINAL_CONFIDENCE
        } else {
            DEFAULT_INTERIM_CONFIDENCE
        });
        // Some recognizers report 0.0 when they do not score results
        let confident = confidence == 0.0 || confidence >= self.threshold_for(transcript);
        let cooled_down = self
            .last_trigger_ms
            .map_or(true, |last| transcript.timestamp_ms - last > self.config.cooldown_ms);
        if !confident || !cooled_down {
            return false;
        }

        self.hits += 1;
        if self.hits >= self.config.min_hits {
            self.hits = 0;
            self.last_trigger_ms = Some(transcript.timestamp_ms);
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.hits = 0;
        self.last_trigger_ms = None;
    }
}
