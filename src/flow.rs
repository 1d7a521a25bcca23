//! Screening flow orchestration
//!
//! `ScreeningFlow` is the stateful entry point a host drives. It owns the
//! stage sequencer, the session context, the sensor hub and exactly one live
//! stage controller. Host inputs go to that controller; when it completes,
//! the flow records its result, drops it and builds the next one.

use crate::config::FlowConfig;
use crate::detection::{SensorHub, VirtualSensorHub};
use crate::error::FlowError;
use crate::games::{controller_for, Phase, StageController, StageEnv, StageInput, StageSignal};
use crate::recorder::{ActivityRecorder, RecordOutcome};
use crate::sequencer::{Advance, Stage, StageGroup, StageSequencer};
use crate::session::{QuestionnaireForm, SessionContext};
use crate::store::SessionStore;
use crate::summary::Summary;
use crate::types::{ActivityResult, RecordPatch, SessionRecord};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

/// Where the flow is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowMode {
    /// Not started, or left with `Exit`
    Idle,
    /// A stage is live
    Running,
    /// Terminal mode; only the summary is shown
    Summary,
}

/// Snapshot of the live stage for the host UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub stage: Stage,
    pub title: String,
    /// Zero-based index into the configured stage list
    pub position: usize,
    pub total: usize,
    pub phase: Phase,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_left: Option<u64>,
}

/// Render port implemented by the host
pub trait StageHost {
    /// Called once each time a stage becomes live
    fn render(&mut self, view: &StageView);

    /// Called once on entering summary mode
    fn show_summary(&mut self, summary: &Summary);
}

/// Host that shows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHost;

impl StageHost for NoopHost {
    fn render(&mut self, _view: &StageView) {}

    fn show_summary(&mut self, _summary: &Summary) {}
}

/// Result of feeding one input to the flow
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FlowStatus {
    /// The live stage keeps going
    Stay,
    /// The live stage completed and `to` is live now
    Advanced {
        from: Stage,
        to: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        recorded: Option<RecordOutcome>,
    },
    /// The last stage completed and the summary is shown
    Finished {
        #[serde(skip_serializing_if = "Option::is_none")]
        recorded: Option<RecordOutcome>,
    },
    /// The host left the flow
    Exited,
}

struct ActiveStage {
    controller: Box<dyn StageController>,
    recorder: Option<ActivityRecorder>,
}

/// Stateful screening flow with a single live stage.
///
/// # Example
/// ```ignore
/// let mut flow = ScreeningFlow::new(FlowConfig::default(), Box::new(MemoryStore::new()))?;
/// flow.start();
/// flow.handle(StageInput::SubmitQuestionnaire(form))?;
/// flow.handle(StageInput::Continue)?;
/// ```
pub struct ScreeningFlow {
    config: FlowConfig,
    sequencer: StageSequencer<Stage>,
    session: SessionContext,
    sensors: Box<dyn SensorHub>,
    host: Box<dyn StageHost>,
    active: Option<ActiveStage>,
    mode: FlowMode,
    clock: Box<dyn Fn() -> DateTime<Utc>>,
}

impl ScreeningFlow {
    /// Create an idle flow. Sensors default to an in-process hub that grants
    /// everything and the host to [`NoopHost`].
    pub fn new(config: FlowConfig, store: Box<dyn SessionStore>) -> Result<Self, FlowError> {
        config.validate()?;
        Ok(Self {
            sequencer: StageSequencer::new(config.stages.clone()),
            config,
            session: SessionContext::new(store),
            sensors: Box::new(VirtualSensorHub::new()),
            host: Box::new(NoopHost),
            active: None,
            mode: FlowMode::Idle,
            clock: Box::new(Utc::now),
        })
    }

    pub fn with_sensors(mut self, sensors: impl SensorHub + 'static) -> Self {
        self.sensors = Box::new(sensors);
        self
    }

    pub fn with_host(mut self, host: impl StageHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    /// Replace the wall clock used for completion timestamps
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Live stage, if any
    pub fn current_stage(&self) -> Option<Stage> {
        self.active.as_ref().map(|active| active.controller.stage())
    }

    pub fn position(&self) -> usize {
        self.sequencer.position()
    }

    pub fn stages(&self) -> &[Stage] {
        self.sequencer.stages()
    }

    /// Saved record left over from an earlier run, if one is stored.
    ///
    /// The flow still starts from the first stage; the host decides whether
    /// to offer the summary instead.
    pub fn resume(&self) -> Option<SessionRecord> {
        let record = self.session.load();
        if let Some(record) = &record {
            info!(
                "Found saved screening {} for {}",
                record.submission_id, record.child_info.name
            );
        }
        record
    }

    /// Start from the first stage. An empty stage list goes straight to the
    /// summary without rendering any stage.
    pub fn start(&mut self) {
        self.active = None;
        self.sequencer.reset();
        match self.sequencer.current() {
            Some(stage) => self.activate(stage),
            None => {
                info!("No stages configured; screening is complete");
                self.enter_summary();
            }
        }
    }

    /// Feed one host input to the live stage.
    ///
    /// Stage misuse and invalid forms are returned as errors and leave the
    /// flow unchanged. Storage and sensor faults never surface here.
    pub fn handle(&mut self, input: StageInput) -> Result<FlowStatus, FlowError> {
        if input == StageInput::Exit {
            return Ok(self.exit());
        }

        let Some(active) = self.active.as_mut() else {
            return Err(FlowError::UnexpectedInput {
                stage: format!("{:?}", self.mode).to_lowercase(),
                input: input.name().to_string(),
            });
        };

        let now = (self.clock)();
        let mut env = StageEnv {
            session: &mut self.session,
            sensors: &mut *self.sensors,
            now,
        };
        match active.controller.handle(input, &mut env)? {
            StageSignal::Stay => Ok(FlowStatus::Stay),
            StageSignal::Complete(result) => Ok(self.complete(result, now)),
        }
    }

    /// Submit the questionnaire. Routed through the live questionnaire stage
    /// when there is one; an idle flow creates a new record directly.
    ///
    /// Once any other stage is live, or the summary is shown, the record's
    /// child details and answers are fixed and the call is rejected.
    pub fn submit_questionnaire(&mut self, form: QuestionnaireForm) -> Result<SessionRecord, FlowError> {
        match (self.mode, self.current_stage()) {
            (FlowMode::Running, Some(Stage::Questionnaire)) => {
                self.handle(StageInput::SubmitQuestionnaire(form))?;
            }
            (FlowMode::Idle, _) => {
                let now = (self.clock)();
                self.session.submit_questionnaire(form, now)?;
            }
            (mode, stage) => {
                return Err(FlowError::UnexpectedInput {
                    stage: stage.map_or_else(
                        || format!("{:?}", mode).to_lowercase(),
                        |stage| stage.to_string(),
                    ),
                    input: "submit_questionnaire".to_string(),
                });
            }
        }
        self.session.record().cloned().ok_or(FlowError::NoSession)
    }

    /// Record a result outside of any stage, as an operator would.
    ///
    /// Each call is a fresh activity instance, so recording the same key
    /// again overwrites it. A finished screening (summary shown, or
    /// `completedAt` stamped) is read-only.
    pub fn record(&mut self, key: &str, result: ActivityResult) -> Result<RecordOutcome, FlowError> {
        if Stage::DEFAULT_ORDER
            .iter()
            .all(|stage| stage.activity_key() != Some(key))
        {
            return Err(FlowError::UnknownActivity(key.to_string()));
        }
        let current = match self.session.load() {
            Some(stored) => stored,
            None => self.session.record().cloned().ok_or(FlowError::NoSession)?,
        };
        if self.mode == FlowMode::Summary || current.completed_at.is_some() {
            return Err(FlowError::RecordClosed(current.submission_id));
        }
        Ok(ActivityRecorder::new(key).finish(&mut self.session, result))
    }

    /// Current summary, read from the store
    pub fn summary(&self) -> Summary {
        Summary::from_record(self.session.load().as_ref())
    }

    /// Snapshot of the live stage
    pub fn view(&self) -> Option<StageView> {
        let active = self.active.as_ref()?;
        let stage = active.controller.stage();
        Some(StageView {
            stage,
            title: stage.display_name().to_string(),
            position: self.sequencer.position(),
            total: self.sequencer.len(),
            phase: active.controller.phase(),
            prompt: active.controller.prompt(),
            seconds_left: active.controller.seconds_left(),
        })
    }

    /// Delete the stored record and start over from the first stage.
    ///
    /// The flow restarts even if the store could not be cleared; the clear
    /// error is returned afterwards.
    pub fn reset(&mut self) -> Result<(), FlowError> {
        self.active = None;
        let cleared = self.session.clear();
        if let Err(e) = &cleared {
            error!("Failed to clear screening data: {}", e);
        }
        self.start();
        cleared
    }

    fn activate(&mut self, stage: Stage) {
        // The previous controller goes first so its sensors are released
        // before the next stage can ask for them.
        self.active = None;
        let controller = controller_for(stage, &self.config, &self.session);
        let recorder = stage.activity_key().map(ActivityRecorder::new);
        self.active = Some(ActiveStage {
            controller,
            recorder,
        });
        self.mode = FlowMode::Running;
        info!(
            "Stage {}/{}: {}",
            self.sequencer.position() + 1,
            self.sequencer.len(),
            stage.display_name()
        );
        if let Some(view) = self.view() {
            self.host.render(&view);
        }
    }

    fn complete(&mut self, result: Option<ActivityResult>, now: DateTime<Utc>) -> FlowStatus {
        let Some(ActiveStage {
            controller,
            recorder,
        }) = self.active.take()
        else {
            return FlowStatus::Stay;
        };
        let stage = controller.stage();
        drop(controller);

        let mut patch = RecordPatch::default();
        if self.closes_game_suite(stage) {
            patch = patch.with_suite_completed_at(now);
        }
        let is_last = self.sequencer.is_last();
        if is_last {
            patch = patch.with_completed_at(now);
        }

        let recorded = match (recorder, result) {
            (Some(mut recorder), Some(result)) => {
                Some(recorder.finish_with(&mut self.session, result, patch))
            }
            (_, result) => {
                if let Some(result) = result {
                    warn!("{} is not an activity; ignoring {:?}", stage, result);
                }
                if !patch.is_empty() && self.session.record().is_some() {
                    if let Err(e) = self.session.merge(patch) {
                        error!("Failed to stamp completion after {}: {}", stage, e);
                    }
                }
                None
            }
        };

        if is_last {
            self.enter_summary();
            return FlowStatus::Finished { recorded };
        }

        match self.sequencer.advance() {
            Advance::Moved { .. } => match self.sequencer.current() {
                Some(next) => {
                    self.activate(next);
                    FlowStatus::Advanced {
                        from: stage,
                        to: next,
                        recorded,
                    }
                }
                None => {
                    self.enter_summary();
                    FlowStatus::Finished { recorded }
                }
            },
            Advance::AtLastStage | Advance::Empty => {
                self.enter_summary();
                FlowStatus::Finished { recorded }
            }
        }
    }

    /// Whether no game suite stage is configured after `stage`
    fn closes_game_suite(&self, stage: Stage) -> bool {
        stage.group() == Some(StageGroup::GameSuite)
            && !self
                .sequencer
                .upcoming()
                .iter()
                .any(|next| next.group() == Some(StageGroup::GameSuite))
    }

    fn enter_summary(&mut self) {
        self.active = None;
        self.mode = FlowMode::Summary;
        let summary = self.summary();
        info!(
            "Showing summary ({})",
            if summary.has_data() { "ready" } else { "no data" }
        );
        self.host.show_summary(&summary);
    }

    fn exit(&mut self) -> FlowStatus {
        if let Some(active) = self.active.take() {
            info!("Leaving screening at {}", active.controller.stage());
        }
        self.mode = FlowMode::Idle;
        FlowStatus::Exited
    }
}
