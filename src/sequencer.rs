//! Stage sequencing
//!
//! The screening is an ordered list of stages with a single cursor. The list
//! is fixed at configuration time and the cursor only ever moves forward by
//! one, except for an explicit reset back to the first stage.

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Group of activity stages that is stamped as a whole when it finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageGroup {
    /// Response to name, imitation, candles and shape match
    GameSuite,
    /// Pointing adventure with its own scenes
    PointingAdventure,
}

/// Every stage the screening flow knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Questionnaire,
    Welcome,
    ResponseToName,
    Imitation,
    BlowOutCandles,
    ShapeMatch,
    Pointing,
}

impl Stage {
    /// Stage order used when no configuration overrides it
    pub const DEFAULT_ORDER: [Stage; 7] = [
        Stage::Questionnaire,
        Stage::Welcome,
        Stage::ResponseToName,
        Stage::Imitation,
        Stage::BlowOutCandles,
        Stage::ShapeMatch,
        Stage::Pointing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Questionnaire => "questionnaire",
            Stage::Welcome => "welcome",
            Stage::ResponseToName => "responseToName",
            Stage::Imitation => "imitation",
            Stage::BlowOutCandles => "blowOutCandles",
            Stage::ShapeMatch => "shapeMatch",
            Stage::Pointing => "pointing",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Stage::DEFAULT_ORDER.into_iter().find(|stage| stage.as_str() == s)
    }

    /// Key under which this stage's result is recorded, if it is an activity
    pub fn activity_key(&self) -> Option<&'static str> {
        match self {
            Stage::Questionnaire | Stage::Welcome => None,
            Stage::ResponseToName => Some("responseToName"),
            Stage::Imitation => Some("waveGame"),
            Stage::BlowOutCandles => Some("blowOutCandles"),
            Stage::ShapeMatch => Some("overstim"),
            Stage::Pointing => Some("pointing"),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Questionnaire => "Parent Questionnaire",
            Stage::Welcome => "Welcome",
            Stage::ResponseToName => "Response to Name",
            Stage::Imitation => "Wave Game",
            Stage::BlowOutCandles => "Blow Out Candles",
            Stage::ShapeMatch => "Shape Match",
            Stage::Pointing => "Pointing",
        }
    }

    pub fn group(&self) -> Option<StageGroup> {
        match self {
            Stage::ResponseToName | Stage::Imitation | Stage::BlowOutCandles | Stage::ShapeMatch => {
                Some(StageGroup::GameSuite)
            }
            Stage::Pointing => Some(StageGroup::PointingAdventure),
            Stage::Questionnaire | Stage::Welcome => None,
        }
    }

    pub fn is_activity(&self) -> bool {
        self.activity_key().is_some()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an `advance` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Cursor moved from one position to the next
    Moved { from: usize, to: usize },
    /// Cursor already on the last stage; nothing changed
    AtLastStage,
    /// No stages configured; nothing changed
    Empty,
}

/// Ordered list of stages plus the index of the active one
#[derive(Debug, Clone)]
pub struct StageSequencer<S> {
    stages: Vec<S>,
    position: usize,
}

impl<S: Copy + fmt::Debug> StageSequencer<S> {
    pub fn new(stages: Vec<S>) -> Self {
        Self {
            stages,
            position: 0,
        }
    }

    pub fn stages(&self) -> &[S] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// An empty sequencer is complete from the start
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Active stage, `None` only for an empty list
    pub fn current(&self) -> Option<S> {
        self.stages.get(self.position).copied()
    }

    pub fn is_last(&self) -> bool {
        !self.stages.is_empty() && self.position + 1 == self.stages.len()
    }

    /// Stages after the active one
    pub fn upcoming(&self) -> &[S] {
        self.stages.get(self.position + 1..).unwrap_or(&[])
    }

    /// Move forward by exactly one stage.
    ///
    /// On the last stage this is a no-op; the caller is expected to leave for
    /// its terminal mode instead.
    pub fn advance(&mut self) -> Advance {
        if self.stages.is_empty() {
            warn!("advance() called on an empty stage list");
            return Advance::Empty;
        }
        if self.is_last() {
            return Advance::AtLastStage;
        }
        let from = self.position;
        self.position += 1;
        Advance::Moved {
            from,
            to: self.position,
        }
    }

    /// Back to the first stage
    pub fn reset(&mut self) {
        self.position = 0;
    }
}
