//! Stage controllers
//!
//! One controller per stage. The flow owns exactly one controller at a time
//! and feeds it host inputs; a controller answers with a signal telling the
//! flow whether the stage is done and what to record. Dropping a controller
//! drops its detection adapters, which releases any sensor it still holds.

mod blow_out_candles;
mod imitation;
mod intake;
mod pointing;
mod response_to_name;
mod shape_match;
mod windowed;

pub use blow_out_candles::BlowOutCandlesStage;
pub use imitation::{ImitationStage, ImitationTask};
pub use intake::{QuestionnaireStage, WelcomeStage};
pub use pointing::{PointingStage, Scene};
pub use response_to_name::ResponseToNameStage;
pub use shape_match::{ShapeBoard, ShapeKind, ShapeMatchStage};

use crate::config::FlowConfig;
use crate::detection::{HandFrame, SensorHub, SpectrumFrame, Transcript};
use crate::error::FlowError;
use crate::sequencer::Stage;
use crate::session::{QuestionnaireForm, SessionContext};
use crate::types::ActivityResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything a host can send to the active stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageInput {
    SubmitQuestionnaire(QuestionnaireForm),
    /// Move past an informational screen or scene
    Continue,
    /// Start the activity window
    Start,
    Transcript(Transcript),
    Hands(HandFrame),
    Spectrum(SpectrumFrame),
    /// Wall-clock time passed since the previous tick
    Tick { elapsed_ms: u64 },
    DropShape {
        shape: ShapeKind,
        x: f64,
        y: f64,
        viewport_width: f64,
    },
    /// Start the stage's current step over
    Retry,
    /// Manual fallback: give up on the activity and move on
    Skip,
    /// Leave the flow, releasing everything the active stage holds
    Exit,
}

impl StageInput {
    pub fn name(&self) -> &'static str {
        match self {
            StageInput::SubmitQuestionnaire(_) => "submit_questionnaire",
            StageInput::Continue => "continue",
            StageInput::Start => "start",
            StageInput::Transcript(_) => "transcript",
            StageInput::Hands(_) => "hands",
            StageInput::Spectrum(_) => "spectrum",
            StageInput::Tick { .. } => "tick",
            StageInput::DropShape { .. } => "drop_shape",
            StageInput::Retry => "retry",
            StageInput::Skip => "skip",
            StageInput::Exit => "exit",
        }
    }

    pub fn tick(elapsed: Duration) -> Self {
        StageInput::Tick {
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Coarse state of a stage, for the host's UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Instructions shown, waiting for the host to start
    Intro,
    /// Window armed, detection running
    Active,
    /// A required sensor was refused
    AccessNeeded,
    /// Result known, stage about to hand over
    Finished,
}

/// What the flow should do after an input
#[derive(Debug, Clone, PartialEq)]
pub enum StageSignal {
    Stay,
    /// Stage is done; activity stages carry their result
    Complete(Option<ActivityResult>),
}

/// Session pieces a controller may touch while handling an input
pub struct StageEnv<'a> {
    pub session: &'a mut SessionContext,
    pub sensors: &'a mut dyn SensorHub,
    pub now: DateTime<Utc>,
}

pub trait StageController {
    fn stage(&self) -> Stage;

    fn phase(&self) -> Phase;

    /// Short instruction for the current step
    fn prompt(&self) -> String;

    /// Countdown while a window is armed
    fn seconds_left(&self) -> Option<u64> {
        None
    }

    fn handle(&mut self, input: StageInput, env: &mut StageEnv<'_>) -> Result<StageSignal, FlowError>;
}

/// Build the controller for a stage from configuration
pub fn controller_for(
    stage: Stage,
    config: &FlowConfig,
    session: &SessionContext,
) -> Box<dyn StageController> {
    match stage {
        Stage::Questionnaire => Box::new(QuestionnaireStage::new()),
        Stage::Welcome => Box::new(WelcomeStage::new()),
        Stage::ResponseToName => {
            let child_name = session.record().map(|r| r.child_info.name.clone());
            Box::new(ResponseToNameStage::new(config, child_name))
        }
        Stage::Imitation => Box::new(ImitationStage::new(config)),
        Stage::BlowOutCandles => Box::new(BlowOutCandlesStage::new(config)),
        Stage::ShapeMatch => Box::new(ShapeMatchStage::new(config)),
        Stage::Pointing => Box::new(PointingStage::new(config)),
    }
}

pub(crate) fn unexpected(stage: Stage, input: &StageInput) -> FlowError {
    FlowError::UnexpectedInput {
        stage: stage.to_string(),
        input: input.name().to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::detection::VirtualSensorHub;
    use crate::store::MemoryStore;

    /// Session plus sensors for driving a single controller
    pub struct Harness {
        pub session: SessionContext,
        pub sensors: VirtualSensorHub,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                session: SessionContext::new(Box::new(MemoryStore::new())),
                sensors: VirtualSensorHub::new(),
            }
        }

        pub fn denying(kind: crate::detection::SensorKind) -> Self {
            Self {
                session: SessionContext::new(Box::new(MemoryStore::new())),
                sensors: VirtualSensorHub::denying([kind]),
            }
        }

        pub fn send(
            &mut self,
            controller: &mut dyn StageController,
            input: StageInput,
        ) -> Result<StageSignal, FlowError> {
            let mut env = StageEnv {
                session: &mut self.session,
                sensors: &mut self.sensors,
                now: Utc::now(),
            };
            controller.handle(input, &mut env)
        }

        pub fn tick_secs(
            &mut self,
            controller: &mut dyn StageController,
            secs: u64,
        ) -> StageSignal {
            self.send(controller, StageInput::tick(Duration::from_secs(secs)))
                .unwrap()
        }
    }
}
