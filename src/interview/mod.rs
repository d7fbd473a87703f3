//! Adaptive voice interview
//!
//! The planner picks each question from the running score average, the
//! turn controller asks and scores it, and the session orchestrator runs
//! the whole interview against one candidate.

mod planner;
mod session;
mod turn;
mod types;

pub use planner::{PlannedQuestion, QuestionPlanner, QuestionSource, fallback_question};
pub use session::{
    SessionOrchestrator, SessionPhase, SessionServices, closing, greeting,
};
pub use turn::{
    FeedbackTone, SCORING_FALLBACK_FEEDBACK, TurnController, TurnServices, feedback_line,
};
pub use types::{
    ADVANCED_THRESHOLD, DEFAULT_AVERAGE, Difficulty, INTERMEDIATE_THRESHOLD, MAX_SCORE,
    QuestionResult, SessionState, SessionSummary, average_score, planning_average,
};
