//! Defensive parsing of oracle responses
//!
//! LLM output is treated as untrusted text: fences are stripped, the first
//! JSON object is extracted, and every field is validated before use.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::interview::{Difficulty, MAX_SCORE};
use crate::{Error, Result};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("valid regex"));

/// Feedback used when the oracle scores without explaining
pub const MISSING_FEEDBACK: &str = "No feedback available.";

/// Question proposed by the oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub question: String,
    /// Tier the oracle claims, if it named a known one
    pub difficulty: Option<Difficulty>,
}

/// Score and feedback for one answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerScore {
    pub score: u8,
    pub feedback: String,
}

/// Parse a question-generation response
///
/// # Errors
///
/// Returns `Error::MalformedResponse` if no JSON object is found or the
/// `question` field is missing or blank
pub fn parse_question(raw: &str) -> Result<QuestionDraft> {
    let value = extract_object(raw)?;

    let question = value
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| malformed("question field missing", raw))?
        .to_string();

    let difficulty = value
        .get("difficulty")
        .and_then(Value::as_str)
        .and_then(|d| d.parse().ok());

    Ok(QuestionDraft {
        question,
        difficulty,
    })
}

/// Parse a scoring response
///
/// # Errors
///
/// Returns `Error::MalformedResponse` if no JSON object is found or the
/// `score` field is missing, non-numeric, or outside 0..=10
pub fn parse_score(raw: &str) -> Result<AnswerScore> {
    let value = extract_object(raw)?;

    let score = value
        .get("score")
        .and_then(score_value)
        .ok_or_else(|| malformed("score field missing or out of range", raw))?;

    let feedback = value
        .get("feedback")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(MISSING_FEEDBACK)
        .to_string();

    Ok(AnswerScore { score, feedback })
}

/// Accept integers, integral floats, and numeric strings within 0..=10
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn score_value(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !number.is_finite() || number.fract() != 0.0 {
        return None;
    }
    if !(0.0..=f64::from(MAX_SCORE)).contains(&number) {
        return None;
    }
    Some(number as u8)
}

/// Strip markdown fences and parse the outermost `{...}` span
fn extract_object(raw: &str) -> Result<Value> {
    let cleaned = CODE_FENCE.replace_all(raw, "");
    let cleaned = cleaned.trim();

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(malformed("no JSON object", raw));
    };
    if end < start {
        return Err(malformed("no JSON object", raw));
    }

    let value: Value = serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| malformed(&format!("invalid JSON ({e})"), raw))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(malformed("not a JSON object", raw))
    }
}

fn malformed(reason: &str, raw: &str) -> Error {
    let snippet: String = raw.chars().take(80).collect();
    Error::MalformedResponse(format!("{reason}: {snippet}"))
}
