//! Index finger pointing detection
//!
//! A hand is pointing when the index finger is clearly longer than the other
//! three, measured from knuckle to tip. Raw per-frame decisions are smoothed
//! over a short window of recent frames.

use crate::detection::landmarks::{
    HandFrame, HandLandmarks, INDEX_MCP, INDEX_TIP, MIDDLE_MCP, MIDDLE_TIP, PINKY_MCP, PINKY_TIP,
    RING_MCP, RING_TIP,
};
use crate::detection::{Detector, SensorKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Pointing tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointingConfig {
    /// Index must be longer than every other finger by this factor
    pub index_margin: f64,
    /// Every other finger must be shorter than this fraction of the index
    pub others_ratio: f64,
    /// Frames in the smoothing window
    pub window_frames: usize,
    /// Pointing frames within the window needed to report
    pub min_hits: usize,
}

impl Default for PointingConfig {
    fn default() -> Self {
        Self {
            index_margin: 1.1,
            others_ratio: 0.9,
            window_frames: 20,
            min_hits: 1,
        }
    }
}

fn finger_length(hand: &HandLandmarks, tip: usize, mcp: usize) -> Option<f64> {
    Some(hand.get(tip)?.distance(&hand.get(mcp)?))
}

/// Single-frame pointing decision
pub fn is_pointing(hand: &HandLandmarks, config: &PointingConfig) -> bool {
    let lengths = (
        finger_length(hand, INDEX_TIP, INDEX_MCP),
        finger_length(hand, MIDDLE_TIP, MIDDLE_MCP),
        finger_length(hand, RING_TIP, RING_MCP),
        finger_length(hand, PINKY_TIP, PINKY_MCP),
    );
    let (Some(index), Some(middle), Some(ring), Some(pinky)) = lengths else {
        return false;
    };
    let others = [middle, ring, pinky];

    let index_longest = others.iter().all(|&len| index > len * config.index_margin);
    let others_shorter = others.iter().all(|&len| len < index * config.others_ratio);
    index_longest && others_shorter
}

#[derive(Debug, Clone)]
pub struct PointingDetector {
    config: PointingConfig,
    recent: VecDeque<bool>,
}

impl PointingDetector {
    pub fn new(config: PointingConfig) -> Self {
        Self {
            recent: VecDeque::with_capacity(config.window_frames),
            config,
        }
    }

    /// Smoothed state after the last frame
    pub fn is_pointing(&self) -> bool {
        self.recent.iter().filter(|raw| **raw).count() >= self.config.min_hits.max(1)
    }
}

impl Default for PointingDetector {
    fn default() -> Self {
        Self::new(PointingConfig::default())
    }
}

impl Detector for PointingDetector {
    type Frame = HandFrame;

    fn sensor(&self) -> SensorKind {
        SensorKind::Camera
    }

    fn observe(&mut self, frame: &HandFrame) -> bool {
        let raw = frame
            .primary_hand()
            .is_some_and(|hand| is_pointing(hand, &self.config));

        self.recent.push_back(raw);
        while self.recent.len() > self.config.window_frames.max(1) {
            self.recent.pop_front();
        }
        self.is_pointing()
    }

    fn reset(&mut self) {
        self.recent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::landmarks::fixtures::{frame, open_hand, pointing_hand};

    #[test]
    fn test_pointing_hand() {
        let config = PointingConfig::default();
        assert!(is_pointing(&pointing_hand(0.5, 0.5), &config));
        assert!(!is_pointing(&open_hand(0.5, 0.5), &config));
    }

    #[test]
    fn test_incomplete_hand_is_not_pointing() {
        let hand = HandLandmarks(pointing_hand(0.5, 0.5).0[..10].to_vec());
        assert!(!is_pointing(&hand, &PointingConfig::default()));
    }

    #[test]
    fn test_smoothing_window_holds_detection() {
        let mut detector = PointingDetector::default();
        assert!(!detector.observe(&frame(0.0, Some(open_hand(0.5, 0.5)))));
        assert!(detector.observe(&frame(33.0, Some(pointing_hand(0.5, 0.5)))));

        // Stays pointing while the positive frame is inside the window
        for i in 0..19 {
            assert!(detector.observe(&frame(66.0 + i as f64 * 33.0, None)));
        }
        assert!(!detector.observe(&frame(1000.0, None)));
    }

    #[test]
    fn test_min_hits_in_window() {
        let mut detector = PointingDetector::new(PointingConfig {
            min_hits: 3,
            ..Default::default()
        });
        assert!(!detector.observe(&frame(0.0, Some(pointing_hand(0.5, 0.5)))));
        assert!(!detector.observe(&frame(33.0, Some(open_hand(0.5, 0.5)))));
        assert!(!detector.observe(&frame(66.0, Some(pointing_hand(0.5, 0.5)))));
        assert!(detector.observe(&frame(99.0, Some(pointing_hand(0.5, 0.5)))));
    }

    #[test]
    fn test_reset_empties_window() {
        let mut detector = PointingDetector::default();
        detector.observe(&frame(0.0, Some(pointing_hand(0.5, 0.5))));
        detector.reset();
        assert!(!detector.is_pointing());
    }
}
