//! Peekaboo (hand over eyes) detection
//!
//! Scores each frame against a set of loose geometric cues and requires the
//! pose to hold across several frames before reporting it.

use crate::detection::landmarks::{
    HandFrame, HandLandmarks, Landmark, INDEX_TIP, MIDDLE_TIP, THUMB_TIP, WRIST,
};
use crate::detection::{Detector, SensorKind};
use serde::{Deserialize, Serialize};

/// Wrist must sit below this line for the hand to be raised to the face
const FACE_WRIST_MIN_Y: f64 = 0.4;
/// Index and middle fingertips must be above this line
const FACE_FINGERTIP_MAX_Y: f64 = 0.6;
const INDEX_MIDDLE_MAX_DIST: f64 = 0.15;
const THUMB_INDEX_MAX_DIST: f64 = 0.25;
/// Region of the image the face usually occupies
const FACE_AREA_X: (f64, f64) = (0.2, 0.8);
const FACE_AREA_Y: (f64, f64) = (0.1, 0.6);

/// Cover-eyes tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoverEyesConfig {
    /// Cues out of five that must hold on a frame
    pub required_cues: usize,
    /// Largest wrist movement between frames that still counts as steady
    pub stable_movement: f64,
    /// Net covering frames before the pose counts as held
    pub hold_frames: u32,
    /// Consecutive held frames before a detection is reported
    pub confirm_frames: u32,
}

impl Default for CoverEyesConfig {
    fn default() -> Self {
        Self {
            required_cues: 3,
            stable_movement: 0.05,
            hold_frames: 5,
            confirm_frames: 3,
        }
    }
}

/// Which cues a single hand pose satisfies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoverCues {
    pub near_face: bool,
    pub fingers_clustered: bool,
    pub in_face_area: bool,
    pub palm_facing: bool,
    pub stable: bool,
}

impl CoverCues {
    pub fn count(&self) -> usize {
        [
            self.near_face,
            self.fingers_clustered,
            self.in_face_area,
            self.palm_facing,
            self.stable,
        ]
        .into_iter()
        .filter(|cue| *cue)
        .count()
    }
}

#[derive(Debug, Clone)]
pub struct CoverEyesDetector {
    config: CoverEyesConfig,
    last_wrist: Option<Landmark>,
    /// Sticky: only updated when a previous wrist position exists
    stable: bool,
    held: u32,
    streak: u32,
}

impl CoverEyesDetector {
    pub fn new(config: CoverEyesConfig) -> Self {
        Self {
            config,
            last_wrist: None,
            stable: false,
            held: 0,
            streak: 0,
        }
    }

    /// Net count of covering frames so far, for progress display
    pub fn held_frames(&self) -> u32 {
        self.held
    }

    fn cues(&mut self, hand: &HandLandmarks) -> Option<CoverCues> {
        let wrist = hand.get(WRIST)?;
        let index = hand.get(INDEX_TIP)?;
        let middle = hand.get(MIDDLE_TIP)?;
        let thumb = hand.get(THUMB_TIP)?;

        if let Some(last) = self.last_wrist {
            self.stable = wrist.distance(&last) < self.config.stable_movement;
        }
        self.last_wrist = Some(wrist);

        Some(CoverCues {
            near_face: wrist.y > FACE_WRIST_MIN_Y
                && index.y < FACE_FINGERTIP_MAX_Y
                && middle.y < FACE_FINGERTIP_MAX_Y,
            fingers_clustered: index.distance(&middle) < INDEX_MIDDLE_MAX_DIST
                && thumb.distance(&index) < THUMB_INDEX_MAX_DIST,
            in_face_area: index.x > FACE_AREA_X.0
                && index.x < FACE_AREA_X.1
                && index.y > FACE_AREA_Y.0
                && index.y < FACE_AREA_Y.1,
            palm_facing: wrist.y > index.y && wrist.y > middle.y,
            stable: self.stable,
        })
    }
}

impl Default for CoverEyesDetector {
    fn default() -> Self {
        Self::new(CoverEyesConfig::default())
    }
}

impl Detector for CoverEyesDetector {
    type Frame = HandFrame;

    fn sensor(&self) -> SensorKind {
        SensorKind::Camera
    }

    fn observe(&mut self, frame: &HandFrame) -> bool {
        let Some(cues) = frame.primary_hand().and_then(|hand| self.cues(hand)) else {
            self.streak = 0;
            return false;
        };

        if cues.count() >= self.config.required_cues {
            self.held += 1;
        } else {
            self.held = self.held.saturating_sub(1);
        }

        if self.held >= self.config.hold_frames {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.streak >= self.config.confirm_frames
    }

    fn reset(&mut self) {
        self.last_wrist = None;
        self.stable = false;
        self.held = 0;
        self.streak = 0;
    }
}
