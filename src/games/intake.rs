//! Questionnaire and welcome screens

use super::{unexpected, Phase, StageController, StageEnv, StageInput, StageSignal};
use crate::error::FlowError;
use crate::sequencer::Stage;

/// Parent questionnaire; creates the Session Record on submission
#[derive(Debug, Default)]
pub struct QuestionnaireStage {
    submitted: bool,
}

impl QuestionnaireStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StageController for QuestionnaireStage {
    fn stage(&self) -> Stage {
        Stage::Questionnaire
    }

    fn phase(&self) -> Phase {
        if self.submitted {
            Phase::Finished
        } else {
            Phase::Intro
        }
    }

    fn prompt(&self) -> String {
        "Tell us about your child and answer six quick questions".to_string()
    }

    fn handle(&mut self, input: StageInput, env: &mut StageEnv<'_>) -> Result<StageSignal, FlowError> {
        match input {
            StageInput::SubmitQuestionnaire(form) if !self.submitted => {
                // An invalid form leaves the stage open for corrections
                env.session.submit_questionnaire(form, env.now)?;
                self.submitted = true;
                Ok(StageSignal::Complete(None))
            }
            StageInput::Tick { .. }
            | StageInput::Transcript(_)
            | StageInput::Hands(_)
            | StageInput::Spectrum(_) => Ok(StageSignal::Stay),
            other => Err(unexpected(self.stage(), &other)),
        }
    }
}

/// Greeting screen before the games
#[derive(Debug, Default)]
pub struct WelcomeStage {
    done: bool,
}

impl WelcomeStage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StageController for WelcomeStage {
    fn stage(&self) -> Stage {
        Stage::Welcome
    }

    fn phase(&self) -> Phase {
        if self.done {
            Phase::Finished
        } else {
            Phase::Intro
        }
    }

    fn prompt(&self) -> String {
        "Hi friend! Let's play some games together".to_string()
    }

    fn handle(&mut self, input: StageInput, _env: &mut StageEnv<'_>) -> Result<StageSignal, FlowError> {
        match input {
            StageInput::Continue | StageInput::Skip if !self.done => {
                self.done = true;
                Ok(StageSignal::Complete(None))
            }
            StageInput::Tick { .. }
            | StageInput::Transcript(_)
            | StageInput::Hands(_)
            | StageInput::Spectrum(_) => Ok(StageSignal::Stay),
            other => Err(unexpected(self.stage(), &other)),
        }
    }
}
