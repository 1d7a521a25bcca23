//! Hand landmark frames
//!
//! Hand tracking models report 21 normalized landmarks per hand (x and y in
//! 0..1 of the image, y growing downwards). Detectors only need a handful of
//! them.

use serde::{Deserialize, Serialize};

pub const WRIST: usize = 0;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

/// Landmarks per tracked hand
pub const LANDMARK_COUNT: usize = 21;

/// A single normalized landmark
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Planar distance, depth is ignored
    pub fn distance(&self, other: &Landmark) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// All landmarks of one hand
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandLandmarks(pub Vec<Landmark>);

impl HandLandmarks {
    pub fn get(&self, index: usize) -> Option<Landmark> {
        self.0.get(index).copied()
    }

    /// Whether every landmark index is present
    pub fn is_complete(&self) -> bool {
        self.0.len() >= LANDMARK_COUNT
    }
}

/// One frame of hand tracking output
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HandFrame {
    /// Capture time in milliseconds on the host's monotonic clock
    pub timestamp_ms: f64,
    /// Tracked hands, empty when none is visible
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
}

impl HandFrame {
    /// First hand with a full landmark set
    pub fn primary_hand(&self) -> Option<&HandLandmarks> {
        self.hands.first().filter(|hand| hand.is_complete())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_distance_ignores_depth() {
        let a = Landmark { x: 0.0, y: 0.0, z: 5.0 };
        let b = Landmark::new(0.3, 0.4);
        assert!((a.distance(&b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_incomplete_hand_is_not_primary() {
        let frame = HandFrame {
            timestamp_ms: 0.0,
            hands: vec![HandLandmarks(vec![Landmark::default(); 5])],
        };
        assert!(frame.primary_hand().is_none());
        assert!(frame_with_hand().primary_hand().is_some());
    }

    fn frame_with_hand() -> HandFrame {
        frame(0.0, Some(open_hand(0.5, 0.5)))
    }

    #[test]
    fn test_frame_deserializes_from_landmark_arrays() {
        let json = format!(
            r#"{{"timestamp_ms": 12.5, "hands": [{}]}}"#,
            serde_json::to_string(&open_hand(0.5, 0.5)).unwrap()
        );
        let frame: HandFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame.hands[0].0.len(), LANDMARK_COUNT);
        assert_eq!(frame.timestamp_ms, 12.5);
    }
}
