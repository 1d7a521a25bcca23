//! Summary view and clean export
//!
//! Read-only projection of the final Session Record: child details, the six
//! questionnaire answers and one pass/fail row per activity. Bookkeeping
//! entries (timestamps, task tags) are filtered out before anything is shown
//! or exported.

use crate::sequencer::Stage;
use crate::types::{ActivityResult, Answer, ChildInfo, QuestionId, SessionRecord, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Shown for blank child details
pub const NOT_PROVIDED: &str = "Not provided";

/// Key fragments that mark bookkeeping rather than results
const BOOKKEEPING_FRAGMENTS: [&str; 3] = ["timestamp", "completedat", "tasks"];

/// Fields stripped from object results that carry no score
const METADATA_FIELDS: [&str; 6] = [
    "timestamp",
    "completedAt",
    "timeLeft",
    "Tasks",
    "waveTasks",
    "waveCompletedAt",
];

/// Whether an `activityResults` key is bookkeeping
pub fn is_bookkeeping_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.ends_with("timeleft")
        || BOOKKEEPING_FRAGMENTS
            .iter()
            .any(|fragment| lower.contains(fragment))
}

/// Human readable name for an activity key
pub fn display_name(key: &str) -> String {
    let known = Stage::DEFAULT_ORDER
        .into_iter()
        .find(|stage| stage.activity_key() == Some(key));
    if let Some(stage) = known {
        return stage.display_name().to_string();
    }
    if key == "imitationGame" {
        return "Imitation Game".to_string();
    }
    split_camel_case(key)
}

/// "shapeSortGame" -> "Shape Sort Game"
fn split_camel_case(key: &str) -> String {
    let mut words = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            words.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            words.push(' ');
            words.push(c);
        } else {
            words.push(c);
        }
    }
    words.trim().to_string()
}

/// Export value for one result: the score when there is one
fn clean_value(result: &ActivityResult) -> Value {
    match result {
        ActivityResult::Score(score) => Value::from(*score),
        ActivityResult::Detailed(detailed) => Value::from(detailed.score),
        ActivityResult::Bookkeeping(Value::Object(fields)) => {
            if let Some(score) = fields.get("score") {
                return score.clone();
            }
            let cleaned: Map<String, Value> = fields
                .iter()
                .filter(|(name, _)| !METADATA_FIELDS.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            Value::Object(cleaned)
        }
        ActivityResult::Bookkeeping(value) => value.clone(),
    }
}

/// Order rows the way the stages run, unknown keys last
fn row_rank(key: &str) -> usize {
    Stage::DEFAULT_ORDER
        .iter()
        .position(|stage| stage.activity_key() == Some(key))
        .unwrap_or(Stage::DEFAULT_ORDER.len())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRow {
    pub question: QuestionId,
    pub title: String,
    pub answer: Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRow {
    pub key: String,
    pub name: String,
    pub score: Option<u8>,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub submission_id: String,
    pub child: ChildInfo,
    pub answers: Vec<AnswerRow>,
    pub games: Vec<GameRow>,
    pub games_passed: usize,
    pub games_total: usize,
    pub suite_completed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Child details as exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportChild {
    pub name: String,
    pub age: String,
    pub gender: String,
}

/// Anonymizable export without bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanExport {
    pub child_info: ExportChild,
    pub questionnaire: BTreeMap<QuestionId, Answer>,
    pub games: BTreeMap<String, Value>,
}

/// What the summary screen shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Summary {
    /// Nothing stored, or the stored record could not be read
    NoData,
    Ready(SummaryReport),
}

impl Summary {
    pub fn from_record(record: Option<&SessionRecord>) -> Self {
        let Some(record) = record else {
            return Summary::NoData;
        };

        let answers = QuestionId::ALL
            .into_iter()
            .filter_map(|question| {
                record.answer(question).map(|answer| AnswerRow {
                    question,
                    title: question.title().to_string(),
                    answer,
                })
            })
            .collect();

        let mut games: Vec<GameRow> = record
            .activity_results
            .iter()
            .filter(|(key, _)| !is_bookkeeping_key(key))
            .map(|(key, result)| GameRow {
                key: key.clone(),
                name: display_name(key),
                score: result.score(),
                verdict: Verdict::from_detected(result.passed()),
            })
            .collect();
        // Stable sort keeps unknown keys in map order
        games.sort_by_key(|row| row_rank(&row.key));

        let games_passed = games
            .iter()
            .filter(|row| row.verdict == Verdict::Passed)
            .count();

        Summary::Ready(SummaryReport {
            submission_id: record.submission_id.clone(),
            child: record.child_info.clone(),
            answers,
            games_total: games.len(),
            games,
            games_passed,
            suite_completed_at: record.suite_completed_at,
            completed_at: record.completed_at,
        })
    }

    pub fn report(&self) -> Option<&SummaryReport> {
        match self {
            Summary::NoData => None,
            Summary::Ready(report) => Some(report),
        }
    }

    pub fn has_data(&self) -> bool {
        self.report().is_some()
    }

    /// Plain-text rendering of the summary screen
    pub fn render_text(&self) -> String {
        self.to_string()
    }

    /// Write the summary screen as plain text
    pub fn write_report(&self, out: &mut impl fmt::Write) -> fmt::Result {
        let Some(report) = self.report() else {
            writeln!(out, "No Data Found")?;
            return writeln!(out, "No screening data found. Start a new screening.");
        };

        let or_missing = |value: &str| {
            if value.trim().is_empty() {
                NOT_PROVIDED.to_string()
            } else {
                value.to_string()
            }
        };

        writeln!(out, "Screening Complete!")?;
        writeln!(out)?;
        writeln!(out, "Child Information")?;
        writeln!(out, "  Name: {}", or_missing(&report.child.name))?;
        writeln!(out, "  Age: {}", or_missing(&report.child.age))?;
        writeln!(out, "  Gender: {}", or_missing(&report.child.gender))?;

        if !report.answers.is_empty() {
            writeln!(out)?;
            writeln!(out, "Questionnaire Results")?;
            for row in &report.answers {
                writeln!(
                    out,
                    "  Question {}: {}",
                    row.question.number(),
                    row.answer.label()
                )?;
            }
        }

        if !report.games.is_empty() {
            writeln!(out)?;
            writeln!(out, "Game Performance")?;
            for row in &report.games {
                writeln!(out, "  {}: {}", row.name, row.verdict.label())?;
            }
            writeln!(out)?;
            writeln!(
                out,
                "Summary: Games Passed: {} out of {}",
                report.games_passed, report.games_total
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_report(f)
    }
}

impl CleanExport {
    pub fn from_record(record: &SessionRecord) -> Self {
        let games = record
            .activity_results
            .iter()
            .filter(|(key, _)| !is_bookkeeping_key(key))
            .map(|(key, result)| (key.clone(), clean_value(result)))
            .collect();

        CleanExport {
            child_info: ExportChild {
                name: record.child_info.name.clone(),
                age: record.child_info.age.clone(),
                gender: record.child_info.gender.clone(),
            },
            questionnaire: record.questionnaire_answers.clone(),
            games,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sam_record() -> SessionRecord {
        let child = ChildInfo {
            name: "Sam".to_string(),
            age: "3".to_string(),
            gender: String::new(),
            parent_name: "Jordan".to_string(),
            email: None,
        };
        let answers = QuestionId::ALL
            .into_iter()
            .map(|q| (q, if q.number() % 2 == 0 { Answer::No } else { Answer::Yes }))
            .collect();
        SessionRecord::new(child, answers, Utc::now())
    }

    #[test]
    fn test_bookkeeping_keys() {
        for key in ["waveCompletedAt", "waveTasks", "responseToNameTimestamp", "responseToNameTimeLeft"] {
            assert!(is_bookkeeping_key(key), "{}", key);
        }
        for key in ["responseToName", "waveGame", "overstim", "pointing"] {
            assert!(!is_bookkeeping_key(key), "{}", key);
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("responseToName"), "Response to Name");
        assert_eq!(display_name("overstim"), "Shape Match");
        assert_eq!(display_name("waveGame"), "Wave Game");
        assert_eq!(display_name("shapeSortGame"), "Shape Sort Game");
        assert_eq!(display_name("x"), "X");
    }

    #[test]
    fn test_no_record_is_no_data() {
        let summary = Summary::from_record(None);
        assert_eq!(summary, Summary::NoData);
        assert!(summary.render_text().starts_with("No Data Found"));
    }

    #[test]
    fn test_rows_skip_bookkeeping_and_follow_stage_order() {
        let mut record = sam_record();
        record.activity_results = serde_json::from_value(json!({
            "blowOutCandles": 0,
            "responseToName": 1,
            "waveCompletedAt": "2024-05-01T10:00:00Z",
            "waveGame": {"score": 1, "tasks": "wave-and-peekaboo"},
            "waveTasks": "wave-only"
        }))
        .unwrap();

        let summary = Summary::from_record(Some(&record));
        let report = summary.report().unwrap();
        let keys: Vec<&str> = report.games.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["responseToName", "waveGame", "blowOutCandles"]);
        assert_eq!(report.games_passed, 2);
        assert_eq!(report.games_total, 3);
        assert_eq!(report.answers.len(), 6);
    }

    #[test]
    fn test_only_exact_one_passes() {
        let mut record = sam_record();
        record.activity_results = serde_json::from_value(json!({
            "gameA": 1,
            "gameB": 2,
            "gameC": {"level": "hard"}
        }))
        .unwrap();

        let summary = Summary::from_record(Some(&record));
        let report = summary.report().unwrap();
        assert_eq!(report.games_passed, 1);
        assert_eq!(report.games[2].verdict, Verdict::NotPassed);
        assert_eq!(report.games[2].score, None);
    }

    #[test]
    fn test_render_text() {
        let mut record = sam_record();
        record.activity_results = serde_json::from_value(json!({
            "responseToName": 1,
            "blowOutCandles": 0
        }))
        .unwrap();

        let text = Summary::from_record(Some(&record)).render_text();
        assert!(text.contains("  Name: Sam\n"));
        assert!(text.contains("  Gender: Not provided\n"));
        assert!(text.contains("  Question 1: Yes\n"));
        assert!(text.contains("  Question 2: No\n"));
        assert!(text.contains("  Response to Name: Passed\n"));
        assert!(text.contains("  Blow Out Candles: Not Passed\n"));
        assert!(text.contains("Games Passed: 1 out of 2"));
    }

    #[test]
    fn test_display_matches_report_writer() {
        let summary = Summary::from_record(Some(&sam_record()));
        let mut written = String::new();
        summary.write_report(&mut written).unwrap();

        assert_eq!(format!("{}", summary), written);
        assert_eq!(summary.render_text(), written);
        assert!(written.starts_with("Screening Complete!\n"));
        assert!(!written.contains("Game Performance"));

        assert_eq!(
            Summary::NoData.to_string(),
            "No Data Found\nNo screening data found. Start a new screening.\n"
        );
    }

    #[test]
    fn test_clean_export() {
        let mut record = sam_record();
        record.activity_results = serde_json::from_value(json!({
            "waveGame": {"score": 0, "tasks": "none", "completedAt": "2024-05-01T10:00:00Z"},
            "waveTasks": "none",
            "legacy": {"note": "kept", "timestamp": 12}
        }))
        .unwrap();

        let export = CleanExport::from_record(&record);
        assert_eq!(
            serde_json::to_value(&export).unwrap(),
            json!({
                "childInfo": {"name": "Sam", "age": "3", "gender": ""},
                "questionnaire": {"A1": "yes", "A2": "no", "A3": "yes", "A4": "no", "A5": "yes", "A6": "no"},
                "games": {"legacy": {"note": "kept"}, "waveGame": 0}
            })
        );
    }

    #[test]
    fn test_summary_json_is_tagged() {
        let json = serde_json::to_value(Summary::NoData).unwrap();
        assert_eq!(json, json!({"state": "no_data"}));
    }
}
