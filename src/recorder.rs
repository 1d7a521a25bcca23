//! Activity Result Recorder
//!
//! Write path used by an activity when it completes. One recorder belongs to
//! one activity instance and lets exactly one completion through to the
//! store; later completions from the same instance are absorbed.

use crate::session::SessionContext;
use crate::types::{ActivityResult, RecordPatch};
use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;

/// What happened to a completion signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Merged record written to the store
    Written,
    /// Store write failed; the in-memory session carries on
    Dropped { reason: String },
    /// A completion already went through for this instance
    Duplicate,
}

/// One-shot recorder for a single activity instance
#[derive(Debug, Clone)]
pub struct ActivityRecorder {
    key: String,
    instance_id: Uuid,
    finished: bool,
}

impl ActivityRecorder {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            instance_id: Uuid::new_v4(),
            finished: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Record the activity's result
    pub fn finish(&mut self, context: &mut SessionContext, result: ActivityResult) -> RecordOutcome {
        self.finish_with(context, result, RecordPatch::default())
    }

    /// Record the activity's result together with extra fields, such as a
    /// group completion timestamp
    pub fn finish_with(
        &mut self,
        context: &mut SessionContext,
        result: ActivityResult,
        mut patch: RecordPatch,
    ) -> RecordOutcome {
        if self.finished {
            warn!(
                "Discarding duplicate completion for {} ({})",
                self.key, self.instance_id
            );
            return RecordOutcome::Duplicate;
        }
        // Latch before touching the store so a failed write is not retried
        self.finished = true;

        patch
            .activity_results
            .insert(self.key.clone(), result.clone());

        match context.merge(patch) {
            Ok(_) => {
                info!("Recorded {} = {:?}", self.key, result.score());
                RecordOutcome::Written
            }
            Err(e) => {
                error!("Dropped result for {}: {}", self.key, e);
                RecordOutcome::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }
}
