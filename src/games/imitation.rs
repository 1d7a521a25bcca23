//! Imitation game: wave, then peekaboo
//!
//! Two camera tasks in a row. The wave task gets one window; the peekaboo
//! (cover your eyes) task gets a few attempts. The recorded score is the
//! peekaboo outcome, with a tag saying which tasks were done.

use super::windowed::WindowedDetection;
use super::{unexpected, Phase, StageController, StageEnv, StageInput, StageSignal};
use crate::config::{FlowConfig, ImitationConfig};
use crate::detection::{CoverEyesConfig, CoverEyesDetector, WaveDetector};
use crate::error::FlowError;
use crate::sequencer::Stage;
use crate::types::{ActivityResult, Verdict};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImitationTask {
    Wave,
    CoverEyes,
}

/// Which tasks ended in success
fn tasks_tag(wave: bool, cover_eyes: bool) -> &'static str {
    match (wave, cover_eyes) {
        (true, true) => "wave-and-peekaboo",
        (true, false) => "wave-only",
        (false, true) => "peekaboo-only",
        (false, false) => "none",
    }
}

pub struct ImitationStage {
    settings: ImitationConfig,
    cover_config: CoverEyesConfig,
    task: ImitationTask,
    wave: WindowedDetection<WaveDetector>,
    cover_eyes: WindowedDetection<CoverEyesDetector>,
    wave_passed: bool,
    cover_attempts: u32,
}

impl ImitationStage {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            settings: config.imitation.clone(),
            cover_config: config.cover_eyes.clone(),
            task: ImitationTask::Wave,
            wave: WindowedDetection::new(
                WaveDetector::new(config.wave.clone()),
                Duration::from_secs(config.imitation.wave_secs),
            ),
            cover_eyes: Self::cover_eyes_run(&config.imitation, &config.cover_eyes),
            wave_passed: false,
            cover_attempts: 0,
        }
    }

    fn cover_eyes_run(
        settings: &ImitationConfig,
        cover_config: &CoverEyesConfig,
    ) -> WindowedDetection<CoverEyesDetector> {
        WindowedDetection::new(
            CoverEyesDetector::new(cover_config.clone()),
            Duration::from_secs(settings.cover_eyes_secs),
        )
    }

    pub fn task(&self) -> ImitationTask {
        self.task
    }

    /// Cover-eyes windows used so far
    pub fn cover_attempts(&self) -> u32 {
        self.cover_attempts
    }

    fn start_current(&mut self, env: &mut StageEnv<'_>) {
        match self.task {
            ImitationTask::Wave => self.wave.start(&mut *env.sensors),
            ImitationTask::CoverEyes => self.cover_eyes.start(&mut *env.sensors),
        };
    }

    fn resolve(&mut self, verdict: Verdict, now: DateTime<Utc>) -> StageSignal {
        match self.task {
            ImitationTask::Wave => {
                self.wave_passed = verdict == Verdict::Passed;
                info!("Wave task: {}", verdict.label());
                self.task = ImitationTask::CoverEyes;
                StageSignal::Stay
            }
            ImitationTask::CoverEyes => {
                self.cover_attempts += 1;
                info!(
                    "Peekaboo attempt {}/{}: {}",
                    self.cover_attempts,
                    self.settings.cover_eyes_attempts,
                    verdict.label()
                );
                if verdict == Verdict::NotPassed
                    && self.cover_attempts < self.settings.cover_eyes_attempts
                {
                    self.cover_eyes = Self::cover_eyes_run(&self.settings, &self.cover_config);
                    return StageSignal::Stay;
                }
                self.finish(verdict, now)
            }
        }
    }

    fn finish(&self, cover_eyes: Verdict, now: DateTime<Utc>) -> StageSignal {
        let tag = tasks_tag(self.wave_passed, cover_eyes == Verdict::Passed);
        let mut extra = BTreeMap::new();
        extra.insert("tasks".to_string(), Value::from(tag));
        extra.insert("completedAt".to_string(), Value::from(now.to_rfc3339()));
        StageSignal::Complete(Some(ActivityResult::detailed(cover_eyes, extra)))
    }
}

impl StageController for ImitationStage {
    fn stage(&self) -> Stage {
        Stage::Imitation
    }

    fn phase(&self) -> Phase {
        match self.task {
            ImitationTask::Wave => self.wave.phase(),
            ImitationTask::CoverEyes => self.cover_eyes.phase(),
        }
    }

    fn prompt(&self) -> String {
        match (self.task, self.phase()) {
            (_, Phase::AccessNeeded) => "Please allow camera access to play",
            (ImitationTask::Wave, Phase::Active) => "Move your hand left and right!",
            (ImitationTask::Wave, _) => "Can you wave hello?",
            (ImitationTask::CoverEyes, Phase::Active) => "Cover your eyes with your hand!",
            (ImitationTask::CoverEyes, _) => "Let's play peekaboo!",
        }
        .to_string()
    }

    fn seconds_left(&self) -> Option<u64> {
        match self.task {
            ImitationTask::Wave => self.wave.seconds_left(),
            ImitationTask::CoverEyes => self.cover_eyes.seconds_left(),
        }
    }

    fn handle(&mut self, input: StageInput, env: &mut StageEnv<'_>) -> Result<StageSignal, FlowError> {
        let phase = self.phase();
        let verdict = match input {
            StageInput::Start if phase == Phase::Intro => {
                self.start_current(env);
                None
            }
            StageInput::Retry if matches!(phase, Phase::AccessNeeded | Phase::Active) => {
                self.start_current(env);
                None
            }
            StageInput::Hands(frame) => match self.task {
                ImitationTask::Wave => self.wave.feed(&frame),
                ImitationTask::CoverEyes => self.cover_eyes.feed(&frame),
            },
            StageInput::Tick { elapsed_ms } => {
                let elapsed = Duration::from_millis(elapsed_ms);
                match self.task {
                    ImitationTask::Wave => self.wave.tick(elapsed),
                    ImitationTask::CoverEyes => self.cover_eyes.tick(elapsed),
                }
            }
            StageInput::Transcript(_) | StageInput::Spectrum(_) => None,
            StageInput::Skip if phase != Phase::Finished => {
                self.wave.give_up();
                let verdict = self.cover_eyes.give_up();
                return Ok(self.finish(verdict, env.now));
            }
            other => return Err(unexpected(self.stage(), &other)),
        };

        Ok(match verdict {
            Some(verdict) => self.resolve(verdict, env.now),
            None => StageSignal::Stay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::landmarks::fixtures::{frame, open_hand};
    use crate::detection::{HandFrame, SensorKind};
    use crate::games::testing::Harness;
    use pretty_assertions::assert_eq;

    fn waving(count: usize) -> Vec<HandFrame> {
        (0..count)
            .map(|i| {
                let t = i as f64 * 50.0;
                let phase = (t % 600.0) / 300.0;
                let x = if phase < 1.0 {
                    0.3 + 0.4 * phase
                } else {
                    0.7 - 0.4 * (phase - 1.0)
                };
                frame(t, Some(open_hand(x, 0.5)))
            })
            .collect()
    }

    fn covering(count: usize) -> Vec<HandFrame> {
        (0..count)
            .map(|i| frame(i as f64 * 33.0, Some(open_hand(0.5, 0.4))))
            .collect()
    }

    fn feed_all(harness: &mut Harness, stage: &mut ImitationStage, frames: Vec<HandFrame>) -> StageSignal {
        let mut last = StageSignal::Stay;
        for f in frames {
            last = harness.send(stage, StageInput::Hands(f)).unwrap();
            if last != StageSignal::Stay {
                break;
            }
        }
        last
    }

    fn tasks_of(signal: &StageSignal) -> (Option<u8>, String) {
        match signal {
            StageSignal::Complete(Some(ActivityResult::Detailed(detailed))) => (
                Some(detailed.score),
                detailed.extra["tasks"].as_str().unwrap_or_default().to_string(),
            ),
            other => panic!("unexpected signal {:?}", other),
        }
    }

    #[test]
    fn test_wave_then_peekaboo() {
        let mut harness = Harness::new();
        let mut stage = ImitationStage::new(&FlowConfig::default());

        harness.send(&mut stage, StageInput::Start).unwrap();
        assert_eq!(feed_all(&mut harness, &mut stage, waving(60)), StageSignal::Stay);
        assert_eq!(stage.task(), ImitationTask::CoverEyes);
        assert_eq!(stage.phase(), Phase::Intro);
        assert_eq!(harness.sensors.total_open(), 0);

        harness.send(&mut stage, StageInput::Start).unwrap();
        let signal = feed_all(&mut harness, &mut stage, covering(10));
        assert_eq!(tasks_of(&signal), (Some(1), "wave-and-peekaboo".to_string()));
        assert_eq!(harness.sensors.total_open(), 0);
    }

    #[test]
    fn test_wave_timeout_moves_to_peekaboo() {
        let mut harness = Harness::new();
        let mut stage = ImitationStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Start).unwrap();

        assert_eq!(harness.tick_secs(&mut stage, 7), StageSignal::Stay);
        assert_eq!(stage.task(), ImitationTask::CoverEyes);

        harness.send(&mut stage, StageInput::Start).unwrap();
        let signal = feed_all(&mut harness, &mut stage, covering(10));
        assert_eq!(tasks_of(&signal), (Some(1), "peekaboo-only".to_string()));
    }

    #[test]
    fn test_peekaboo_gets_a_second_attempt() {
        let mut harness = Harness::new();
        let mut stage = ImitationStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Start).unwrap();
        feed_all(&mut harness, &mut stage, waving(60));

        harness.send(&mut stage, StageInput::Start).unwrap();
        assert_eq!(harness.tick_secs(&mut stage, 15), StageSignal::Stay);
        assert_eq!(stage.cover_attempts(), 1);
        assert_eq!(stage.phase(), Phase::Intro);

        harness.send(&mut stage, StageInput::Start).unwrap();
        let signal = harness.tick_secs(&mut stage, 15);
        assert_eq!(tasks_of(&signal), (Some(0), "wave-only".to_string()));
        assert_eq!(stage.cover_attempts(), 2);
    }

    #[test]
    fn test_camera_denied_then_skip() {
        let mut harness = Harness::denying(SensorKind::Camera);
        let mut stage = ImitationStage::new(&FlowConfig::default());
        harness.send(&mut stage, StageInput::Start).unwrap();
        assert_eq!(stage.phase(), Phase::AccessNeeded);
        assert_eq!(stage.prompt(), "Please allow camera access to play");

        let signal = harness.send(&mut stage, StageInput::Skip).unwrap();
        assert_eq!(tasks_of(&signal), (Some(0), "none".to_string()));
    }

    #[test]
    fn test_result_carries_completion_time() {
        let mut harness = Harness::new();
        let mut stage = ImitationStage::new(&FlowConfig::default());
        let signal = harness.send(&mut stage, StageInput::Skip).unwrap();
        match signal {
            StageSignal::Complete(Some(ActivityResult::Detailed(detailed))) => {
                assert!(detailed.extra.contains_key("completedAt"));
            }
            other => panic!("unexpected signal {:?}", other),
        }
    }
}
