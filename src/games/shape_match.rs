//! Shape match under sensory overload
//!
//! Four shapes start on the left edge and have to be dragged onto their
//! outlines on the right while the host plays loud distractions. No sensor is
//! involved; the host reports drops in viewport pixels.

use super::{unexpected, Phase, StageController, StageEnv, StageInput, StageSignal};
use crate::activity::ActivityWindow;
use crate::config::FlowConfig;
use crate::error::FlowError;
use crate::sequencer::Stage;
use crate::types::{ActivityResult, Verdict};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Targets sit at this fraction of the viewport width
const TARGET_X_FRACTION: f64 = 0.9;

/// Left edge where every shape starts
const HOME_X: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Triangle,
    Circle,
    Rectangle,
    Star,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Triangle,
        ShapeKind::Circle,
        ShapeKind::Rectangle,
        ShapeKind::Star,
    ];

    fn home_y(&self) -> f64 {
        match self {
            ShapeKind::Triangle => 80.0,
            ShapeKind::Circle => 220.0,
            ShapeKind::Rectangle => 360.0,
            ShapeKind::Star => 500.0,
        }
    }

    fn target_y(&self) -> f64 {
        match self {
            ShapeKind::Triangle => 100.0,
            ShapeKind::Circle => 220.0,
            ShapeKind::Rectangle => 360.0,
            ShapeKind::Star => 500.0,
        }
    }

    /// Target position for a given viewport width
    pub fn target(&self, viewport_width: f64) -> (f64, f64) {
        (viewport_width * TARGET_X_FRACTION, self.target_y())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeState {
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    pub placed: bool,
}

/// Positions of all shapes
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeBoard {
    shapes: Vec<ShapeState>,
    snap_distance: f64,
}

impl ShapeBoard {
    pub fn new(snap_distance: f64) -> Self {
        Self {
            shapes: ShapeKind::ALL
                .into_iter()
                .map(|kind| ShapeState {
                    kind,
                    x: HOME_X,
                    y: kind.home_y(),
                    placed: false,
                })
                .collect(),
            snap_distance,
        }
    }

    pub fn shapes(&self) -> &[ShapeState] {
        &self.shapes
    }

    pub fn placed_count(&self) -> usize {
        self.shapes.iter().filter(|s| s.placed).count()
    }

    pub fn all_placed(&self) -> bool {
        self.shapes.iter().all(|s| s.placed)
    }

    /// Drop a shape at (x, y). Close enough to its target it snaps in and
    /// stays placed, otherwise it goes back home. Returns whether it snapped.
    pub fn drop_shape(&mut self, kind: ShapeKind, x: f64, y: f64, viewport_width: f64) -> bool {
        let snap_distance = self.snap_distance;
        let Some(shape) = self.shapes.iter_mut().find(|s| s.kind == kind) else {
            return false;
        };
        if shape.placed {
            return true;
        }

        let (target_x, target_y) = kind.target(viewport_width);
        if (x - target_x).hypot(y - target_y) < snap_distance {
            shape.x = target_x;
            shape.y = target_y;
            shape.placed = true;
            true
        } else {
            shape.x = HOME_X;
            shape.y = kind.home_y();
            false
        }
    }
}

pub struct ShapeMatchStage {
    board: ShapeBoard,
    window: ActivityWindow,
}

impl ShapeMatchStage {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            board: ShapeBoard::new(config.shape_match.snap_distance),
            window: ActivityWindow::from_secs(config.shape_match.duration_secs),
        }
    }

    pub fn board(&self) -> &ShapeBoard {
        &self.board
    }

    fn finish(&self, verdict: Verdict) -> StageSignal {
        info!(
            "Shape match: {} ({}/{} placed)",
            verdict.label(),
            self.board.placed_count(),
            ShapeKind::ALL.len()
        );
        StageSignal::Complete(Some(ActivityResult::from_verdict(verdict)))
    }
}

impl StageController for ShapeMatchStage {
    fn stage(&self) -> Stage {
        Stage::ShapeMatch
    }

    fn phase(&self) -> Phase {
        match self.window.outcome() {
            None => Phase::Intro,
            Some(outcome) if outcome.is_resolved() => Phase::Finished,
            Some(_) => Phase::Active,
        }
    }

    fn prompt(&self) -> String {
        match self.phase() {
            Phase::Active => format!(
                "Drag the shapes to their outlines ({}/{})",
                self.board.placed_count(),
                ShapeKind::ALL.len()
            ),
            Phase::Finished if self.board.all_placed() => "You won!".to_string(),
            Phase::Finished => "Oops, time is up!".to_string(),
            _ => "Match every shape before the time runs out".to_string(),
        }
    }

    fn seconds_left(&self) -> Option<u64> {
        self.window.is_pending().then(|| self.window.seconds_left())
    }

    fn handle(&mut self, input: StageInput, _env: &mut StageEnv<'_>) -> Result<StageSignal, FlowError> {
        let phase = self.phase();
        match input {
            StageInput::Start if phase == Phase::Intro => {
                self.window.arm();
                Ok(StageSignal::Stay)
            }
            StageInput::DropShape {
                shape,
                x,
                y,
                viewport_width,
            } if phase == Phase::Active => {
                let snapped = self.board.drop_shape(shape, x, y, viewport_width);
                debug!("Dropped {:?} at ({}, {}): snapped={}", shape, x, y, snapped);
                if self.board.all_placed() && self.window.detect() {
                    return Ok(self.finish(Verdict::Passed));
                }
                Ok(StageSignal::Stay)
            }
            StageInput::Tick { elapsed_ms } => {
                if self.window.tick(Duration::from_millis(elapsed_ms)).is_some() {
                    return Ok(self.finish(Verdict::NotPassed));
                }
                Ok(StageSignal::Stay)
            }
            StageInput::Transcript(_) | StageInput::Hands(_) | StageInput::Spectrum(_) => {
                Ok(StageSignal::Stay)
            }
            StageInput::Skip if phase != Phase::Finished => {
                if !self.window.is_pending() {
                    self.window.arm();
                }
                self.window.expire();
                Ok(self.finish(Verdict::NotPassed))
            }
            other => Err(unexpected(self.stage(), &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::testing::Harness;
    use pretty_assertions::assert_eq;

    const WIDTH: f64 = 1280.0;

    fn drop_at(shape: ShapeKind, x: f64, y: f64) -> StageInput {
        StageInput::DropShape {
            shape,
            x,
            y,
            viewport_width: WIDTH,
        }
    }

    #[test]
    fn test_drop_near_target_snaps() {
        let mut board = ShapeBoard::new(60.0);
        // Target for the triangle is (1152, 100)
        assert!(board.drop_shape(ShapeKind::Triangle, 1130.0, 130.0, WIDTH));
        let triangle = board.shapes()[0];
        assert!(triangle.placed);
        assert_eq!((triangle.x, triangle.y), (1152.0, 100.0));
    }

    #[test]
    fn test_drop_far_from_target_returns_home() {
        let mut board = ShapeBoard::new(60.0);
        assert!(!board.drop_shape(ShapeKind::Star, 1152.0, 440.0, WIDTH));
        let star = board.shapes()[3];
        assert!(!star.placed);
        assert_eq!((star.x, star.y), (50.0, 500.0));
    }

    #[test]
    fn test_placed_shape_stays_placed() {
        let mut board = ShapeBoard::new(60.0);
        board.drop_shape(ShapeKind::Circle, 1152.0, 220.0, WIDTH);
        assert!(board.drop_shape(ShapeKind::Circle, 0.0, 0.0, WIDTH));
        assert_eq!(board.placed_count(), 1);
    }

    #[test]
    fn test_all_shapes_placed_passes() {
        let mut harness = Harness::new();
        let mut stage = ShapeMatchStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Start).unwrap();

        let mut signal = StageSignal::Stay;
        for kind in ShapeKind::ALL {
            let (x, y) = kind.target(WIDTH);
            signal = harness.send(&mut stage, drop_at(kind, x + 10.0, y - 10.0)).unwrap();
        }
        assert_eq!(signal, StageSignal::Complete(Some(ActivityResult::Score(1))));
        assert_eq!(stage.prompt(), "You won!");
    }

    #[test]
    fn test_time_runs_out_with_shapes_left() {
        let mut harness = Harness::new();
        let mut stage = ShapeMatchStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Start).unwrap();
        harness.send(&mut stage, drop_at(ShapeKind::Triangle, 1152.0, 100.0)).unwrap();

        assert_eq!(harness.tick_secs(&mut stage, 59), StageSignal::Stay);
        assert_eq!(
            harness.tick_secs(&mut stage, 1),
            StageSignal::Complete(Some(ActivityResult::Score(0)))
        );
        assert_eq!(stage.board().placed_count(), 1);
    }

    #[test]
    fn test_drop_before_start_rejected() {
        let mut harness = Harness::new();
        let mut stage = ShapeMatchStage::new(&FlowConfig::default());
        let result = harness.send(&mut stage, drop_at(ShapeKind::Star, 1152.0, 500.0));
        assert!(matches!(result, Err(FlowError::UnexpectedInput { .. })));
    }
}
