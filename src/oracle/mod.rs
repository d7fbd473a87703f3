//! Question/scoring oracle
//!
//! The oracle is any text-completion backend. The two interview operations,
//! question generation and answer scoring, are built on top of a single
//! `complete` call so fakes only need to return raw text.

mod openai;
pub mod parse;
pub mod prompt;

use std::time::Duration;

use async_trait::async_trait;

pub use openai::ChatCompletionsOracle;
pub use parse::{AnswerScore, QuestionDraft};

use crate::config::Config;
use crate::interview::{Difficulty, QuestionResult, planning_average};
use crate::{Error, Result};

/// Which interview operation a completion serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPurpose {
    /// Generate the next question
    Question,
    /// Score a candidate answer
    Scoring,
}

/// A single completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub purpose: CompletionPurpose,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on one completion; elapsed counts as an oracle failure
    pub request_timeout: Duration,
}

/// LLM-backed text generation
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Complete a prompt and return the raw response text
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be reached or rejects the call
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Sampling settings for the two operations
#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub question_temperature: f32,
    pub scoring_temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            question_temperature: 0.7,
            scoring_temperature: 0.3,
            max_tokens: 200,
            request_timeout: crate::config::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Ask the oracle for the next question at `difficulty`
///
/// # Errors
///
/// Returns the backend error, or `Error::MalformedResponse` if the reply
/// does not contain a question
pub async fn generate_question(
    oracle: &dyn Oracle,
    settings: &OracleSettings,
    skill: &str,
    history: &[QuestionResult],
    difficulty: Difficulty,
) -> Result<QuestionDraft> {
    let request = CompletionRequest {
        purpose: CompletionPurpose::Question,
        prompt: prompt::question_prompt(
            skill,
            history.len() + 1,
            history,
            difficulty,
            planning_average(history),
        ),
        temperature: settings.question_temperature,
        max_tokens: settings.max_tokens,
        request_timeout: settings.request_timeout,
    };

    let raw = complete_within(oracle, request, settings.request_timeout).await?;
    parse::parse_question(&raw)
}

/// Ask the oracle to score `transcript` as an answer to `question`
///
/// # Errors
///
/// Returns the backend error, or `Error::MalformedResponse` if the reply
/// does not contain a valid score
pub async fn score_answer(
    oracle: &dyn Oracle,
    settings: &OracleSettings,
    question: &str,
    transcript: &str,
) -> Result<AnswerScore> {
    let request = CompletionRequest {
        purpose: CompletionPurpose::Scoring,
        prompt: prompt::scoring_prompt(question, transcript),
        temperature: settings.scoring_temperature,
        max_tokens: settings.max_tokens,
        request_timeout: settings.request_timeout,
    };

    let raw = complete_within(oracle, request, settings.request_timeout).await?;
    parse::parse_score(&raw)
}

async fn complete_within(
    oracle: &dyn Oracle,
    request: CompletionRequest,
    limit: Duration,
) -> Result<String> {
    let purpose = request.purpose;
    tokio::time::timeout(limit, oracle.complete(request))
        .await
        .map_err(|_| Error::Oracle(format!("{purpose:?} request timed out after {limit:?}")))?
}

/// Build the configured oracle client
///
/// # Errors
///
/// Returns error if no API key is configured for the oracle endpoint
pub fn build_oracle(config: &Config) -> Result<ChatCompletionsOracle> {
    let api_key = config.oracle_api_key().ok_or_else(|| {
        Error::Config("GROQ_API_KEY or OPENAI_API_KEY required for the oracle".to_string())
    })?;

    ChatCompletionsOracle::new(
        config.oracle.base_url.clone(),
        api_key.to_string(),
        config.oracle.model.clone(),
    )?
    .with_timeout(config.oracle.settings.request_timeout)
}
