//! Hand wave detection
//!
//! Tracks the horizontal position of the index fingertip over a short
//! history and counts direction reversals. A wave is a couple of reversals
//! with enough side-to-side travel.

use crate::detection::landmarks::{HandFrame, INDEX_TIP};
use crate::detection::{Detector, SensorKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Wave detection tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaveConfig {
    /// Fingertip positions older than this are forgotten
    pub history_ms: f64,
    /// Samples needed before anything is decided; also the span window
    pub min_samples: usize,
    /// Horizontal span needed for a reversal to count
    pub reversal_span: f64,
    /// Minimum time between two counted reversals
    pub min_reversal_gap_ms: f64,
    pub required_reversals: u32,
    /// Horizontal span needed at the moment of detection
    pub min_span: f64,
    /// Consecutive positive frames before a wave is reported
    pub confirm_frames: u32,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            history_ms: 1000.0,
            min_samples: 5,
            reversal_span: 0.08,
            min_reversal_gap_ms: 200.0,
            required_reversals: 2,
            min_span: 0.15,
            confirm_frames: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct WaveDetector {
    config: WaveConfig,
    /// (timestamp_ms, x)
    history: VecDeque<(f64, f64)>,
    direction: Option<Direction>,
    reversals: u32,
    last_reversal_ms: Option<f64>,
    streak: u32,
}

impl WaveDetector {
    pub fn new(config: WaveConfig) -> Self {
        Self {
            config,
            history: VecDeque::new(),
            direction: None,
            reversals: 0,
            last_reversal_ms: None,
            streak: 0,
        }
    }

    pub fn reversals(&self) -> u32 {
        self.reversals
    }

    fn recent_span(&self) -> f64 {
        let skip = self.history.len().saturating_sub(self.config.min_samples);
        let (min, max) = self
            .history
            .iter()
            .skip(skip)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, x)| {
                (lo.min(x), hi.max(x))
            });
        max - min
    }
}

impl Default for WaveDetector {
    fn default() -> Self {
        Self::new(WaveConfig::default())
    }
}

impl Detector for WaveDetector {
    type Frame = HandFrame;

    fn sensor(&self) -> SensorKind {
        SensorKind::Camera
    }

    fn observe(&mut self, frame: &HandFrame) -> bool {
        let Some(tip) = frame.primary_hand().and_then(|hand| hand.get(INDEX_TIP)) else {
            self.streak = 0;
            return false;
        };
        let now = frame.timestamp_ms;

        self.history.push_back((now, tip.x));
        while let Some(&(t, _)) = self.history.front() {
            if now - t >= self.config.history_ms {
                self.history.pop_front();
            } else {
                break;
            }
        }
        if self.history.len() < self.config.min_samples {
            self.streak = 0;
            return false;
        }

        let span = self.recent_span();
        let (Some(&(_, first_x)), Some(&(_, last_x))) = (self.history.front(), self.history.back())
        else {
            return false;
        };
        let direction = if last_x > first_x {
            Direction::Right
        } else {
            Direction::Left
        };

        if let Some(previous) = self.direction {
            let gap_ok = self
                .last_reversal_ms
                .map_or(true, |last| now - last > self.config.min_reversal_gap_ms);
            if previous != direction && span > self.config.reversal_span && gap_ok {
                self.reversals += 1;
                self.last_reversal_ms = Some(now);
            }
        }
        self.direction = Some(direction);

        if self.reversals >= self.config.required_reversals && span > self.config.min_span {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.streak >= self.config.confirm_frames
    }

    fn reset(&mut self) {
        self.history.clear();
        self.direction = None;
        self.reversals = 0;
        self.last_reversal_ms = None;
        self.streak = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::landmarks::fixtures::{frame, open_hand};

    /// Hand sweeping between x=0.3 and x=0.7, 300ms per sweep, 50ms frames
    fn waving_frames(count: usize) -> Vec<HandFrame> {
        (0..count)
            .map(|i| {
                let t = i as f64 * 50.0;
                let phase = (t % 600.0) / 300.0;
                let x = if phase < 1.0 {
                    0.3 + 0.4 * phase
                } else {
                    0.7 - 0.4 * (phase - 1.0)
                };
                // open_hand puts the index tip 0.03 left of center
                frame(t, Some(open_hand(x + 0.03, 0.5)))
            })
            .collect()
    }

    #[test]
    fn test_detects_waving_hand() {
        let mut detector = WaveDetector::default();
        let fired = waving_frames(60).iter().any(|f| detector.observe(f));
        assert!(fired);
        assert!(detector.reversals() >= 2);
    }

    #[test]
    fn test_still_hand_is_not_a_wave() {
        let mut detector = WaveDetector::default();
        for i in 0..60 {
            assert!(!detector.observe(&frame(i as f64 * 50.0, Some(open_hand(0.5, 0.5)))));
        }
        assert_eq!(detector.reversals(), 0);
    }

    #[test]
    fn test_single_sweep_is_not_a_wave() {
        let mut detector = WaveDetector::default();
        for i in 0..20 {
            let x = 0.2 + 0.03 * i as f64;
            assert!(!detector.observe(&frame(i as f64 * 50.0, Some(open_hand(x, 0.5)))));
        }
    }

    #[test]
    fn test_frames_without_hands_are_ignored() {
        let mut detector = WaveDetector::default();
        for i in 0..30 {
            assert!(!detector.observe(&frame(i as f64 * 50.0, None)));
        }
    }

    #[test]
    fn test_reset_forgets_reversals() {
        let mut detector = WaveDetector::default();
        for f in waving_frames(60) {
            if detector.observe(&f) {
                break;
            }
        }
        detector.reset();
        assert_eq!(detector.reversals(), 0);
        assert!(!detector.observe(&waving_frames(1)[0]));
    }
}
