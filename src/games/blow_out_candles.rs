//! Blow out the candles
//!
//! Microphone spectra are checked for a sustained breath until the window
//! closes.

use super::windowed::WindowedDetection;
use super::{unexpected, Phase, StageController, StageEnv, StageInput, StageSignal};
use crate::config::FlowConfig;
use crate::detection::BlowDetector;
use crate::error::FlowError;
use crate::sequencer::Stage;
use crate::types::{ActivityResult, Verdict};
use log::info;
use std::time::Duration;

pub struct BlowOutCandlesStage {
    run: WindowedDetection<BlowDetector>,
}

impl BlowOutCandlesStage {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            run: WindowedDetection::new(
                BlowDetector::new(config.blow.clone()),
                Duration::from_secs(config.blow_out_candles.duration_secs),
            ),
        }
    }

    fn finish(verdict: Verdict) -> StageSignal {
        info!("Blow out candles: {}", verdict.label());
        StageSignal::Complete(Some(ActivityResult::from_verdict(verdict)))
    }
}

impl StageController for BlowOutCandlesStage {
    fn stage(&self) -> Stage {
        Stage::BlowOutCandles
    }

    fn phase(&self) -> Phase {
        self.run.phase()
    }

    fn prompt(&self) -> String {
        match self.phase() {
            Phase::Intro => "Take a big breath and blow out the candles!",
            Phase::Active => "Blow!",
            Phase::AccessNeeded => "Please allow microphone access to play",
            Phase::Finished => "All done!",
        }
        .to_string()
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
            StageInput::Spectrum(frame) => Ok(self
                .run
                .feed(&frame)
                .map_or(StageSignal::Stay, Self::finish)),
            StageInput::Tick { elapsed_ms } => Ok(self
                .run
                .tick(Duration::from_millis(elapsed_ms))
                .map_or(StageSignal::Stay, Self::finish)),
            StageInput::Transcript(_) | StageInput::Hands(_) => Ok(StageSignal::Stay),
            StageInput::Skip if phase != Phase::Finished => Ok(Self::finish(self.run.give_up())),
            other => Err(unexpected(self.stage(), &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{SensorKind, SpectrumFrame};
    use crate::games::testing::Harness;
    use pretty_assertions::assert_eq;

    fn breath(t: f64) -> SpectrumFrame {
        let mut bins = vec![0u8; 512];
        for value in &mut bins[50..160] {
            *value = 100;
        }
        SpectrumFrame {
            timestamp_ms: t,
            sample_rate: 48_000.0,
            bins,
        }
    }

    #[test]
    fn test_breath_passes() {
        let mut harness = Harness::new();
        let mut stage = BlowOutCandlesStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Start).unwrap();
        assert_eq!(harness.sensors.open_handles(SensorKind::Microphone), 1);

        let mut signal = StageSignal::Stay;
        for i in 0..3 {
            signal = harness
                .send(&mut stage, StageInput::Spectrum(breath(i as f64 * 20.0)))
                .unwrap();
        }
        assert_eq!(signal, StageSignal::Complete(Some(ActivityResult::Score(1))));
        assert_eq!(harness.sensors.total_open(), 0);
    }

    #[test]
    fn test_window_expiry_fails() {
        let mut harness = Harness::new();
        let mut stage = BlowOutCandlesStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Start).unwrap();

        for _ in 0..9 {
            assert_eq!(harness.tick_secs(&mut stage, 1), StageSignal::Stay);
        }
        assert_eq!(
            harness.tick_secs(&mut stage, 1),
            StageSignal::Complete(Some(ActivityResult::Score(0)))
        );
        assert_eq!(stage.prompt(), "All done!");
    }

    #[test]
    fn test_microphone_denied() {
        let mut harness = Harness::denying(SensorKind::Microphone);
        let mut stage = BlowOutCandlesStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Start).unwrap();
        assert_eq!(stage.phase(), Phase::AccessNeeded);

        // Frames from a denied sensor never reach the detector
        assert_eq!(
            harness.send(&mut stage, StageInput::Spectrum(breath(0.0))).unwrap(),
            StageSignal::Stay
        );
        assert_eq!(
            harness.send(&mut stage, StageInput::Skip).unwrap(),
            StageSignal::Complete(Some(ActivityResult::Score(0)))
        );
    }
}
