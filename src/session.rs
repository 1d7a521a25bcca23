//! Session context
//!
//! An explicit session object handed to every stage and recorder. It owns the
//! persistence port and a working copy of the record; every write is a
//! read-merge-write against the store.

use crate::error::FlowError;
use crate::store::SessionStore;
use crate::types::{
    Answer, ChildInfo, QuestionId, QuestionnaireAnswers, RecordPatch, SessionRecord,
};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw questionnaire form as captured from the parent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireForm {
    pub child_name: String,
    #[serde(default)]
    pub child_age: String,
    #[serde(default)]
    pub child_gender: String,
    pub parent_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub answers: BTreeMap<QuestionId, Answer>,
}

impl QuestionnaireForm {
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check required fields and split into the record's write-once parts
    pub fn validate(self) -> Result<(ChildInfo, QuestionnaireAnswers), FlowError> {
        let name = self.child_name.trim();
        if name.is_empty() {
            return Err(FlowError::InvalidForm("child name is required".to_string()));
        }
        let parent_name = self.parent_name.trim();
        if parent_name.is_empty() {
            return Err(FlowError::InvalidForm("parent name is required".to_string()));
        }

        let missing: Vec<&str> = QuestionId::ALL
            .iter()
            .filter(|q| !self.answers.contains_key(q))
            .map(|q| q.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(FlowError::InvalidForm(format!(
                "unanswered questions: {}",
                missing.join(", ")
            )));
        }

        let email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        let child = ChildInfo {
            name: name.to_string(),
            age: self.child_age.trim().to_string(),
            gender: self.child_gender.trim().to_string(),
            parent_name: parent_name.to_string(),
            email,
        };

        Ok((child, self.answers))
    }
}

/// Explicit session context backed by an injectable store
pub struct SessionContext {
    store: Box<dyn SessionStore>,
    record: Option<SessionRecord>,
}

impl SessionContext {
    /// Context with no working record; the store is not read
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self {
            store,
            record: None,
        }
    }

    /// Context that picks up a record already present in the store
    pub fn open(store: Box<dyn SessionStore>) -> Self {
        let mut context = Self::new(store);
        context.record = context.load();
        if let Some(record) = &context.record {
            info!(
                "Found saved screening {} in {}",
                record.submission_id,
                context.store.describe()
            );
        }
        context
    }

    /// Working copy of the record
    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn SessionStore {
        self.store.as_mut()
    }

    /// Read the stored record. Missing and corrupt records both read as
    /// "no session in progress".
    pub fn load(&self) -> Option<SessionRecord> {
        match self.store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring unreadable session record: {}", e);
                None
            }
        }
    }

    /// Create the Session Record from a submitted questionnaire.
    ///
    /// A failing store does not stop the screening; the record stays in
    /// memory and the failure is logged.
    pub fn submit_questionnaire(
        &mut self,
        form: QuestionnaireForm,
        now: DateTime<Utc>,
    ) -> Result<&SessionRecord, FlowError> {
        let (child, answers) = form.validate()?;
        let record = SessionRecord::new(child, answers, now);

        if let Err(e) = self.store.save(&record) {
            error!(
                "Failed to persist new screening {}: {}",
                record.submission_id, e
            );
        } else {
            info!("Created screening {}", record.submission_id);
        }

        Ok(&*self.record.insert(record))
    }

    /// Read-merge-write a patch into the record.
    ///
    /// The stored record is the merge base; when it is missing or unreadable
    /// the working copy is used instead. The working copy is updated even if
    /// the final save fails, in which case the save error is returned.
    pub fn merge(&mut self, patch: RecordPatch) -> Result<&SessionRecord, FlowError> {
        let base = match self.load() {
            Some(stored) => stored,
            None => self.record.clone().ok_or(FlowError::NoSession)?,
        };

        let mut merged = base;
        merged.apply(patch);

        let saved = self.store.save(&merged);
        let record = self.record.insert(merged);
        match saved {
            Ok(()) => Ok(&*record),
            Err(e) => Err(e),
        }
    }

    /// Delete the record from the store and forget the working copy
    pub fn clear(&mut self) -> Result<(), FlowError> {
        self.record = None;
        self.store.clear()?;
        info!("Cleared screening data in {}", self.store.describe());
        Ok(())
    }
}
