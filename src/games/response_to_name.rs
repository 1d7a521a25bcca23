//! Response to name
//!
//! The child's name is called out and the stage listens for a spoken "yes"
//! until the window closes.

use super::windowed::WindowedDetection;
use super::{unexpected, Phase, StageController, StageEnv, StageInput, StageSignal};
use crate::config::FlowConfig;
use crate::detection::YesDetector;
use crate::error::FlowError;
use crate::sequencer::Stage;
use crate::types::{ActivityResult, Verdict};
use log::info;
use std::time::Duration;

pub struct ResponseToNameStage {
    child_name: Option<String>,
    run: WindowedDetection<YesDetector>,
}

impl ResponseToNameStage {
    pub fn new(config: &FlowConfig, child_name: Option<String>) -> Self {
        Self {
            child_name,
            run: WindowedDetection::new(
                YesDetector::new(config.speech.clone()),
                Duration::from_secs(config.response_to_name.window_secs),
            ),
        }
    }

    fn finish(&self, verdict: Verdict) -> StageSignal {
        info!("Response to name: {}", verdict.label());
        StageSignal::Complete(Some(ActivityResult::from_verdict(verdict)))
    }
}

impl StageController for ResponseToNameStage {
    fn stage(&self) -> Stage {
        Stage::ResponseToName
    }

    fn phase(&self) -> Phase {
        self.run.phase()
    }

    fn prompt(&self) -> String {
        match self.phase() {
            Phase::AccessNeeded => "Please allow microphone access to play".to_string(),
            _ => match &self.child_name {
                Some(name) => format!("If you are {}, say yes!", name),
                None => "If you hear your name, say yes!".to_string(),
            },
        }
    }

    fn seconds_left(&self) -> Option<u64> {
        self.run.seconds_left()
    }

    fn handle(&mut self, input: StageInput, env: &mut StageEnv<'_>) -> Result<StageSignal, FlowError> {
        let phase = self.phase();
        match input {
            StageInput::Start if phase == Phase::Intro => {
                self.run.start(&mut *env.sensors);
                Ok(StageSignal::Stay)
            }
            StageInput::Retry if matches!(phase, Phase::AccessNeeded | Phase::Active) => {
                self.run.start(&mut *env.sensors);
                Ok(StageSignal::Stay)
            }
            StageInput::Transcript(transcript) => Ok(match self.run.feed(&transcript) {
                Some(verdict) => self.finish(verdict),
                None => StageSignal::Stay,
            }),
            StageInput::Tick { elapsed_ms } => {
                Ok(match self.run.tick(Duration::from_millis(elapsed_ms)) {
                    Some(verdict) => self.finish(verdict),
                    None => StageSignal::Stay,
                })
            }
            StageInput::Hands(_) | StageInput::Spectrum(_) => Ok(StageSignal::Stay),
            StageInput::Skip if phase != Phase::Finished => {
                let verdict = self.run.give_up();
                Ok(self.finish(verdict))
            }
            other => Err(unexpected(self.stage(), &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{SensorKind, Transcript};
    use crate::games::testing::Harness;
    use pretty_assertions::assert_eq;

    fn stage() -> ResponseToNameStage {
        ResponseToNameStage::new(&FlowConfig::default(), Some("Sam".to_string()))
    }

    #[test]
    fn test_prompt_uses_child_name() {
        assert_eq!(stage().prompt(), "If you are Sam, say yes!");
        let anonymous = ResponseToNameStage::new(&FlowConfig::default(), None);
        assert_eq!(anonymous.prompt(), "If you hear your name, say yes!");
    }

    #[test]
    fn test_yes_passes() {
        let mut harness = Harness::new();
        let mut stage = stage();
        harness.send(&mut stage, StageInput::Start).unwrap();
        assert_eq!(stage.phase(), Phase::Active);
        assert_eq!(harness.sensors.open_handles(SensorKind::SpeechRecognizer), 1);

        harness.tick_secs(&mut stage, 3);
        let signal = harness
            .send(&mut stage, StageInput::Transcript(Transcript::final_text("Yes!", 3000.0)))
            .unwrap();

        assert_eq!(signal, StageSignal::Complete(Some(ActivityResult::Score(1))));
        assert_eq!(harness.sensors.total_open(), 0);
    }

    #[test]
    fn test_transcript_before_start_is_ignored() {
        let mut harness = Harness::new();
        let mut stage = stage();
        let signal = harness
            .send(&mut stage, StageInput::Transcript(Transcript::final_text("yes", 0.0)))
            .unwrap();
        assert_eq!(signal, StageSignal::Stay);
        assert_eq!(stage.phase(), Phase::Intro);
    }

    #[test]
    fn test_silence_times_out() {
        let mut harness = Harness::new();
        let mut stage = stage();
        harness.send(&mut stage, StageInput::Start).unwrap();

        assert_eq!(harness.tick_secs(&mut stage, 19), StageSignal::Stay);
        assert_eq!(stage.seconds_left(), Some(1));
        assert_eq!(
            harness.tick_secs(&mut stage, 1),
            StageSignal::Complete(Some(ActivityResult::Score(0)))
        );
        assert_eq!(harness.sensors.total_open(), 0);
    }

    #[test]
    fn test_denied_recognizer_then_skip() {
        let mut harness = Harness::denying(SensorKind::SpeechRecognizer);
        let mut stage = stage();
        harness.send(&mut stage, StageInput::Start).unwrap();

        assert_eq!(stage.phase(), Phase::AccessNeeded);
        assert_eq!(stage.prompt(), "Please allow microphone access to play");
        // Nothing is armed, so time passing changes nothing
        assert_eq!(harness.tick_secs(&mut stage, 60), StageSignal::Stay);

        let signal = harness.send(&mut stage, StageInput::Skip).unwrap();
        assert_eq!(signal, StageSignal::Complete(Some(ActivityResult::Score(0))));
    }

    #[test]
    fn test_retry_after_granting_access() {
        let mut harness = Harness::denying(SensorKind::SpeechRecognizer);
        let mut stage = stage();
        harness.send(&mut stage, StageInput::Start).unwrap();

        harness.sensors.set_denied(SensorKind::SpeechRecognizer, false);
        harness.send(&mut stage, StageInput::Retry).unwrap();
        assert_eq!(stage.phase(), Phase::Active);
        assert_eq!(stage.seconds_left(), Some(20));
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut harness = Harness::new();
        let mut stage = stage();
        harness.send(&mut stage, StageInput::Start).unwrap();
        let result = harness.send(&mut stage, StageInput::Start);
        assert!(matches!(result, Err(FlowError::UnexpectedInput { .. })));
    }
}
