//! Interview data model

use std::fmt;
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Average assumed before any question has been scored
pub const DEFAULT_AVERAGE: f64 = 5.0;

/// Average at or above which questions become advanced
pub const ADVANCED_THRESHOLD: f64 = 7.5;

/// Average at or above which questions become intermediate
pub const INTERMEDIATE_THRESHOLD: f64 = 4.5;

/// Highest score the oracle may award
pub const MAX_SCORE: u8 = 10;

/// Difficulty tier of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Map an average score onto a tier
    #[must_use]
    pub fn from_average(avg: f64) -> Self {
        if avg >= ADVANCED_THRESHOLD {
            Self::Advanced
        } else if avg >= INTERMEDIATE_THRESHOLD {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }

    /// Tier for the next question given everything asked so far
    #[must_use]
    pub fn for_history(history: &[QuestionResult]) -> Self {
        Self::from_average(planning_average(history))
    }

    /// Lowercase label used in prompts and reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Outcome of one completed question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question: String,
    pub transcript: String,
    pub score: u8,
    pub feedback: String,
    pub difficulty: Difficulty,
}

/// Mean score of `history`, or `None` when nothing has been scored
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_score(history: &[QuestionResult]) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let total: u64 = history.iter().map(|r| u64::from(r.score)).sum();
    Some(total as f64 / history.len() as f64)
}

/// Average used for planning: an empty history counts as [`DEFAULT_AVERAGE`]
#[must_use]
pub fn planning_average(history: &[QuestionResult]) -> f64 {
    average_score(history).unwrap_or(DEFAULT_AVERAGE)
}

/// Live state of one interview
///
/// Only the session orchestrator mutates it, one result per completed turn.
#[derive(Debug, Clone)]
pub struct SessionState {
    skill: String,
    total_questions: usize,
    history: Vec<QuestionResult>,
}

impl SessionState {
    #[must_use]
    pub fn new(skill: impl Into<String>, total_questions: usize) -> Self {
        Self {
            skill: skill.into(),
            total_questions,
            history: Vec::with_capacity(total_questions),
        }
    }

    #[must_use]
    pub fn skill(&self) -> &str {
        &self.skill
    }

    #[must_use]
    pub fn history(&self) -> &[QuestionResult] {
        &self.history
    }

    /// Index of the next turn to run
    #[must_use]
    pub fn turn_index(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub const fn total_questions(&self) -> usize {
        self.total_questions
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.history.len() >= self.total_questions
    }

    /// Append the result of the current turn
    pub fn record(&mut self, result: QuestionResult) {
        debug_assert!(!self.is_complete(), "recorded past the final turn");
        self.history.push(result);
    }

    /// Final average, 0 when no question was completed
    #[must_use]
    pub fn final_average(&self) -> f64 {
        average_score(&self.history).unwrap_or(0.0)
    }

    /// Consume the state into its results
    #[must_use]
    pub fn into_history(self) -> Vec<QuestionResult> {
        self.history
    }
}

/// What a finished interview produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: uuid::Uuid,
    pub room: String,
    pub skill: String,
    pub results: Vec<QuestionResult>,
    pub average_score: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionSummary {
    /// Plain-text report of the whole interview
    #[must_use]
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Voice Interview Complete");
        let _ = writeln!(out, "{} - {} questions", self.skill, self.results.len());
        let _ = writeln!(out, "Average score: {:.1}/10", self.average_score);

        for (i, result) in self.results.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "Q{} [{}] {}/10",
                i + 1,
                result.difficulty,
                result.score
            );
            let _ = writeln!(out, "  {}", result.question);
            if !result.transcript.is_empty() {
                let _ = writeln!(out, "  Your answer: \"{}\"", result.transcript);
            }
            let _ = writeln!(out, "  Feedback: {}", result.feedback);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score: u8) -> QuestionResult {
        QuestionResult {
            question: format!("q{score}"),
            transcript: String::new(),
            score,
            feedback: String::new(),
            difficulty: Difficulty::Intermediate,
        }
    }

    #[test]
    fn empty_history_defaults_to_intermediate() {
        assert_eq!(Difficulty::for_history(&[]), Difficulty::Intermediate);
        assert!((planning_average(&[]) - DEFAULT_AVERAGE).abs() < f64::EPSILON);
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(Difficulty::from_average(7.5), Difficulty::Advanced);
        assert_eq!(Difficulty::from_average(7.49), Difficulty::Intermediate);
        assert_eq!(Difficulty::from_average(4.5), Difficulty::Intermediate);
        assert_eq!(Difficulty::from_average(4.49), Difficulty::Beginner);
        assert_eq!(Difficulty::from_average(0.0), Difficulty::Beginner);
        assert_eq!(Difficulty::from_average(10.0), Difficulty::Advanced);
    }

    #[test]
    fn difficulty_is_monotonic_over_score_range() {
        let mut previous = Difficulty::from_average(0.0);
        for step in 0..=1000 {
            let avg = f64::from(step) / 100.0;
            let tier = Difficulty::from_average(avg);
            assert!(tier >= previous, "tier dropped at {avg}");
            previous = tier;
        }
    }

    #[test]
    fn difficulty_depends_only_on_average() {
        let a = vec![result(8), result(5)];
        let b = vec![result(6), result(7)];
        assert_eq!(Difficulty::for_history(&a), Difficulty::for_history(&b));
    }

    #[test]
    fn parses_labels() {
        assert_eq!(" Advanced ".parse::<Difficulty>(), Ok(Difficulty::Advanced));
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Difficulty::Beginner).unwrap();
        assert_eq!(json, "\"beginner\"");
    }

    #[test]
    fn final_average_is_zero_without_turns() {
        let state = SessionState::new("Rust", 3);
        assert!(state.final_average().abs() < f64::EPSILON);
        assert_eq!(state.turn_index(), 0);
    }

    #[test]
    fn record_advances_turn_index() {
        let mut state = SessionState::new("Rust", 2);
        state.record(result(4));
        assert_eq!(state.turn_index(), 1);
        assert!(!state.is_complete());
        state.record(result(6));
        assert!(state.is_complete());
        assert!((state.final_average() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn report_lists_each_question() {
        let summary = SessionSummary {
            session_id: uuid::Uuid::new_v4(),
            room: "interview-1".to_string(),
            skill: "Databases".to_string(),
            results: vec![
                QuestionResult {
                    question: "What is an index?".to_string(),
                    transcript: "A lookup structure".to_string(),
                    score: 7,
                    feedback: "Solid.".to_string(),
                    difficulty: Difficulty::Intermediate,
                },
                QuestionResult {
                    question: "Explain MVCC".to_string(),
                    transcript: String::new(),
                    score: 0,
                    feedback: "No answer.".to_string(),
                    difficulty: Difficulty::Advanced,
                },
            ],
            average_score: 3.5,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        let report = summary.render_report();
        assert!(report.contains("Databases - 2 questions"));
        assert!(report.contains("Average score: 3.5/10"));
        assert!(report.contains("Q1 [intermediate] 7/10"));
        assert!(report.contains("Your answer: \"A lookup structure\""));
        assert!(report.contains("Q2 [advanced] 0/10"));
        assert_eq!(report.matches("Your answer").count(), 1);
    }
}
