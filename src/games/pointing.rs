//! Pointing adventure
//!
//! A short story in five scenes. In the map and ice cream scenes the child is
//! asked to point at something; pointing in either scene latches a "yay" and
//! the adventure records a pass when the ending scene is left.

use super::{unexpected, Phase, StageController, StageEnv, StageInput, StageSignal};
use crate::config::FlowConfig;
use crate::detection::{DetectionAdapter, PointingDetector};
use crate::error::FlowError;
use crate::sequencer::{Advance, Stage, StageSequencer};
use crate::types::{ActivityResult, Verdict};
use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scene {
    Intro,
    Map,
    Arrival,
    IceCream,
    Ending,
}

impl Scene {
    pub const ORDER: [Scene; 5] = [
        Scene::Intro,
        Scene::Map,
        Scene::Arrival,
        Scene::IceCream,
        Scene::Ending,
    ];

    /// Scenes that watch for pointing
    pub fn asks_to_point(&self) -> bool {
        matches!(self, Scene::Map | Scene::IceCream)
    }

    pub fn narration(&self) -> &'static str {
        match self {
            Scene::Intro => "Let's go on an adventure!",
            Scene::Map => "Where is the ice cream shop? Point to it on the map!",
            Scene::Arrival => "We made it to the ice cream shop!",
            Scene::IceCream => "Which ice cream do you want? Point to it!",
            Scene::Ending => "What a great adventure!",
        }
    }
}

pub struct PointingStage {
    scenes: StageSequencer<Scene>,
    adapter: DetectionAdapter<PointingDetector>,
    camera_denied: bool,
    yay: bool,
    finished: bool,
}

impl PointingStage {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            scenes: StageSequencer::new(Scene::ORDER.to_vec()),
            adapter: DetectionAdapter::new(PointingDetector::new(config.pointing.clone())),
            camera_denied: false,
            yay: false,
            finished: false,
        }
    }

    pub fn scene(&self) -> Option<Scene> {
        self.scenes.current()
    }

    /// Whether pointing was seen in any scene so far
    pub fn yay(&self) -> bool {
        self.yay
    }

    fn enter_scene(&mut self, env: &mut StageEnv<'_>) {
        self.adapter.deactivate();
        self.camera_denied = false;
        if self.scene().is_some_and(|scene| scene.asks_to_point()) {
            if let Err(e) = self.adapter.activate(&mut *env.sensors) {
                warn!("Pointing scene continues without camera: {}", e);
                self.camera_denied = true;
            }
        }
    }

    fn finish(&mut self) -> StageSignal {
        self.adapter.deactivate();
        self.finished = true;
        let verdict = Verdict::from_detected(self.yay);
        info!("Pointing adventure: {}", verdict.label());
        StageSignal::Complete(Some(ActivityResult::from_verdict(verdict)))
    }
}

impl StageController for PointingStage {
    fn stage(&self) -> Stage {
        Stage::Pointing
    }

    fn phase(&self) -> Phase {
        if self.finished {
            Phase::Finished
        } else if self.camera_denied {
            Phase::AccessNeeded
        } else if self.adapter.is_active() {
            Phase::Active
        } else {
            Phase::Intro
        }
    }

    fn prompt(&self) -> String {
        if self.camera_denied {
            return "Please allow camera access so we can see you point".to_string();
        }
        self.scene()
            .map(|scene| scene.narration())
            .unwrap_or_default()
            .to_string()
    }

    fn handle(&mut self, input: StageInput, env: &mut StageEnv<'_>) -> Result<StageSignal, FlowError> {
        if self.finished {
            return Err(unexpected(self.stage(), &input));
        }
        match input {
            StageInput::Continue => match self.scenes.advance() {
                Advance::Moved { .. } => {
                    self.enter_scene(env);
                    Ok(StageSignal::Stay)
                }
                Advance::AtLastStage | Advance::Empty => Ok(self.finish()),
            },
            StageInput::Hands(frame) => {
                if self.adapter.feed(&frame) {
                    info!("Yay! Pointing seen in {:?}", self.scene());
                    self.yay = true;
                }
                Ok(StageSignal::Stay)
            }
            StageInput::Retry if self.camera_denied => {
                self.enter_scene(env);
                Ok(StageSignal::Stay)
            }
            StageInput::Tick { .. } | StageInput::Transcript(_) | StageInput::Spectrum(_) => {
                Ok(StageSignal::Stay)
            }
            StageInput::Skip => Ok(self.finish()),
            other => Err(unexpected(self.stage(), &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::landmarks::fixtures::{frame, pointing_hand};
    use crate::detection::SensorKind;
    use crate::games::testing::Harness;
    use pretty_assertions::assert_eq;

    fn point() -> StageInput {
        StageInput::Hands(frame(0.0, Some(pointing_hand(0.5, 0.5))))
    }

    #[test]
    fn test_pointing_on_map_passes() {
        let mut harness = Harness::new();
        let mut stage = PointingStage::new(&FlowConfig::default());
        assert_eq!(stage.scene(), Some(Scene::Intro));
        assert_eq!(harness.sensors.total_open(), 0);

        harness.send(&mut stage, StageInput::Continue).unwrap();
        assert_eq!(stage.scene(), Some(Scene::Map));
        assert_eq!(harness.sensors.open_handles(SensorKind::Camera), 1);

        harness.send(&mut stage, point()).unwrap();
        assert!(stage.yay());
        // One-shot: the camera is released after the yay
        assert_eq!(harness.sensors.total_open(), 0);

        for _ in 0..3 {
            assert_eq!(
                harness.send(&mut stage, StageInput::Continue).unwrap(),
                StageSignal::Stay
            );
        }
        assert_eq!(stage.scene(), Some(Scene::Ending));
        assert_eq!(
            harness.send(&mut stage, StageInput::Continue).unwrap(),
            StageSignal::Complete(Some(ActivityResult::Score(1)))
        );
        assert_eq!(harness.sensors.total_open(), 0);
    }

    #[test]
    fn test_pointing_outside_asking_scenes_is_ignored() {
        let mut harness = Harness::new();
        let mut stage = PointingStage::new(&FlowConfig::default());
        harness.send(&mut stage, point()).unwrap();
        harness.send(&mut stage, StageInput::Continue).unwrap();
        harness.send(&mut stage, StageInput::Continue).unwrap();
        assert_eq!(stage.scene(), Some(Scene::Arrival));
        harness.send(&mut stage, point()).unwrap();
        assert!(!stage.yay());
    }

    #[test]
    fn test_no_pointing_records_zero() {
        let mut harness = Harness::new();
        let mut stage = PointingStage::new(&FlowConfig::default());
        let mut signal = StageSignal::Stay;
        for _ in 0..5 {
            signal = harness.send(&mut stage, StageInput::Continue).unwrap();
        }
        assert_eq!(signal, StageSignal::Complete(Some(ActivityResult::Score(0))));
        assert_eq!(stage.phase(), Phase::Finished);
        assert!(harness.send(&mut stage, StageInput::Continue).is_err());
    }

    #[test]
    fn test_leaving_scene_releases_camera() {
        let mut harness = Harness::new();
        let mut stage = PointingStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Continue).unwrap();
        assert_eq!(harness.sensors.total_open(), 1);
        harness.send(&mut stage, StageInput::Continue).unwrap();
        assert_eq!(stage.scene(), Some(Scene::Arrival));
        assert_eq!(harness.sensors.total_open(), 0);
    }

    #[test]
    fn test_denied_camera_does_not_block_story() {
        let mut harness = Harness::denying(SensorKind::Camera);
        let mut stage = PointingStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Continue).unwrap();
        assert_eq!(stage.phase(), Phase::AccessNeeded);

        harness.send(&mut stage, StageInput::Continue).unwrap();
        assert_eq!(stage.phase(), Phase::Intro);
        assert_eq!(stage.prompt(), Scene::Arrival.narration());
    }
}
