//! Core data types for the screening session
//!
//! The Session Record is the single persisted object for one screening
//! attempt. Everything in this module is JSON-serializable so the record can
//! live under one well-known storage key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Questionnaire item identifiers (fixed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QuestionId {
    A1,
    A2,
    A3,
    A4,
    A5,
    A6,
}

impl QuestionId {
    /// All questionnaire items in display order
    pub const ALL: [QuestionId; 6] = [
        QuestionId::A1,
        QuestionId::A2,
        QuestionId::A3,
        QuestionId::A4,
        QuestionId::A5,
        QuestionId::A6,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionId::A1 => "A1",
            QuestionId::A2 => "A2",
            QuestionId::A3 => "A3",
            QuestionId::A4 => "A4",
            QuestionId::A5 => "A5",
            QuestionId::A6 => "A6",
        }
    }

    /// 1-based question number shown to parents
    pub fn number(&self) -> usize {
        match self {
            QuestionId::A1 => 1,
            QuestionId::A2 => 2,
            QuestionId::A3 => 3,
            QuestionId::A4 => 4,
            QuestionId::A5 => 5,
            QuestionId::A6 => 6,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            QuestionId::A1 => "Social pointing / shared attention",
            QuestionId::A2 => "Eye contact",
            QuestionId::A3 => "Interest in peers",
            QuestionId::A4 => "Showing / sharing experiences",
            QuestionId::A5 => "Social smiling",
            QuestionId::A6 => "Overstimulation / sensory concerns",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            QuestionId::A1 => "Does the child point or gesture to direct someone's attention to something they find interesting?",
            QuestionId::A2 => "Does the child naturally make eye contact when interacting?",
            QuestionId::A3 => "Is the child curious about other children and tries to initiate interaction?",
            QuestionId::A4 => "Does the child bring or show objects to others as a way of sharing an experience?",
            QuestionId::A5 => "Does the child smile socially (in response to others, not just randomly)?",
            QuestionId::A6 => "Does the child become overly upset by everyday noises or sensory input?",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        QuestionId::ALL.into_iter().find(|q| q.as_str() == s)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Yes/no questionnaire answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
}

impl Answer {
    pub fn is_yes(&self) -> bool {
        matches!(self, Answer::Yes)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Answer::Yes => "Yes",
            Answer::No => "No",
        }
    }
}

/// Answers keyed by question, write-once at form submission
pub type QuestionnaireAnswers = BTreeMap<QuestionId, Answer>;

/// Child and parent details captured by the questionnaire form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildInfo {
    pub name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub gender: String,
    pub parent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Binary outcome of one activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    NotPassed,
}

impl Verdict {
    /// Map a detection flag onto a verdict
    pub fn from_detected(detected: bool) -> Self {
        if detected {
            Verdict::Passed
        } else {
            Verdict::NotPassed
        }
    }

    /// Persisted score: 1 for a pass, 0 otherwise
    pub fn score(&self) -> u8 {
        match self {
            Verdict::Passed => 1,
            Verdict::NotPassed => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed => "Passed",
            Verdict::NotPassed => "Not Passed",
        }
    }
}

/// A result carrying auxiliary fields next to its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResult {
    pub score: u8,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Value stored under one `activityResults` key.
///
/// Records written by older browser builds also carry sibling bookkeeping
/// keys (`waveCompletedAt`, `waveTasks`, ...) whose values are not scores;
/// those land in `Bookkeeping` instead of failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityResult {
    Score(u8),
    Detailed(DetailedResult),
    Bookkeeping(Value),
}

impl ActivityResult {
    pub fn from_verdict(verdict: Verdict) -> Self {
        ActivityResult::Score(verdict.score())
    }

    /// Verdict plus auxiliary fields (timestamps, task tags)
    pub fn detailed(verdict: Verdict, extra: BTreeMap<String, Value>) -> Self {
        ActivityResult::Detailed(DetailedResult {
            score: verdict.score(),
            extra,
        })
    }

    pub fn score(&self) -> Option<u8> {
        match self {
            ActivityResult::Score(score) => Some(*score),
            ActivityResult::Detailed(detailed) => Some(detailed.score),
            ActivityResult::Bookkeeping(_) => None,
        }
    }

    /// Only a score of exactly 1 counts as a pass
    pub fn passed(&self) -> bool {
        self.score() == Some(1)
    }
}

/// Partial update merged into a Session Record.
///
/// Write-once fields (child info, answers, identifiers) have no place here,
/// so a patch can never clobber them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub activity_results: BTreeMap<String, ActivityResult>,
    pub completed_at: Option<DateTime<Utc>>,
    pub suite_completed_at: Option<DateTime<Utc>>,
}

impl RecordPatch {
    /// Patch carrying a single activity result
    pub fn result(key: impl Into<String>, result: ActivityResult) -> Self {
        let mut activity_results = BTreeMap::new();
        activity_results.insert(key.into(), result);
        Self {
            activity_results,
            ..Default::default()
        }
    }

    pub fn with_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn with_suite_completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.suite_completed_at = Some(at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.activity_results.is_empty()
            && self.completed_at.is_none()
            && self.suite_completed_at.is_none()
    }
}

/// The persisted record of one screening attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub submission_id: String,
    pub created_at: DateTime<Utc>,
    pub child_info: ChildInfo,
    pub questionnaire_answers: QuestionnaireAnswers,
    #[serde(default)]
    pub activity_results: BTreeMap<String, ActivityResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_completed_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Create a fresh record at questionnaire submission time
    pub fn new(child_info: ChildInfo, answers: QuestionnaireAnswers, now: DateTime<Utc>) -> Self {
        Self {
            submission_id: format!("submission_{}", now.timestamp_millis()),
            created_at: now,
            child_info,
            questionnaire_answers: answers,
            activity_results: BTreeMap::new(),
            completed_at: None,
            suite_completed_at: None,
        }
    }

    /// Shallow-merge a patch: results are inserted or overwritten per key,
    /// completion timestamps are set only once.
    pub fn apply(&mut self, patch: RecordPatch) {
        self.activity_results.extend(patch.activity_results);

        if self.completed_at.is_none() {
            self.completed_at = patch.completed_at;
        }
        if self.suite_completed_at.is_none() {
            self.suite_completed_at = patch.suite_completed_at;
        }
    }

    pub fn result(&self, key: &str) -> Option<&ActivityResult> {
        self.activity_results.get(key)
    }

    pub fn answer(&self, question: QuestionId) -> Option<Answer> {
        self.questionnaire_answers.get(&question).copied()
    }

    /// Load a record from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the record to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
