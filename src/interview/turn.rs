//! Turn controller
//!
//! One turn is: speak the question, listen, transcribe, score, and (unless
//! it is the last turn) speak a feedback line. Transcription and scoring
//! failures are absorbed here; speech transport failures are not.

use std::sync::Arc;
use std::time::Duration;

use super::types::{Difficulty, QuestionResult};
use crate::oracle::{self, AnswerScore, Oracle, OracleSettings};
use crate::shutdown::Shutdown;
use crate::voice::{
    AudioBuffer, AudioStream, EndReason, EndpointDetector, Speaker, SpeechRecognizer,
};
use crate::{Error, Result};

/// Feedback stored when scoring fails or returns garbage
pub const SCORING_FALLBACK_FEEDBACK: &str = "Could not evaluate.";

/// Tone of the spoken feedback between questions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTone {
    /// Score 7 and up
    Encouraging,
    /// Score 4 to 6
    Neutral,
    /// Score below 4
    DifferentAngle,
}

impl FeedbackTone {
    #[must_use]
    pub const fn for_score(score: u8) -> Self {
        match score {
            7.. => Self::Encouraging,
            4..=6 => Self::Neutral,
            _ => Self::DifferentAngle,
        }
    }

    /// Spoken line for `score` in this tone
    #[must_use]
    pub fn line(self, score: u8) -> String {
        match self {
            Self::Encouraging => format!("Good answer, {score} out of 10. Moving on."),
            Self::Neutral => format!("Decent attempt, {score} out of 10. Let's continue."),
            Self::DifferentAngle => format!("{score} out of 10. Let's try a different angle."),
        }
    }
}

/// Spoken feedback for `score`
#[must_use]
pub fn feedback_line(score: u8) -> String {
    FeedbackTone::for_score(score).line(score)
}

/// External services a turn talks to
#[derive(Clone)]
pub struct TurnServices {
    pub speaker: Speaker,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub oracle: Arc<dyn Oracle>,
    /// Upper bound on one transcription call
    pub transcribe_timeout: Duration,
}

/// Runs question/answer turns against one candidate audio stream
pub struct TurnController {
    audio: AudioStream,
    detector: EndpointDetector,
    services: TurnServices,
    settings: OracleSettings,
    total_questions: usize,
    shutdown: Shutdown,
}

impl TurnController {
    #[must_use]
    pub fn new(
        audio: AudioStream,
        detector: EndpointDetector,
        services: TurnServices,
        settings: OracleSettings,
        total_questions: usize,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            audio,
            detector,
            services,
            settings,
            total_questions,
            shutdown,
        }
    }

    /// Run turn `turn_index` (zero-based) for `question`
    ///
    /// # Errors
    ///
    /// Returns transport failures from speech output and `Error::Cancelled`;
    /// every other failure is replaced by its fallback
    pub async fn run_turn(
        &mut self,
        turn_index: usize,
        question: &str,
        difficulty: Difficulty,
    ) -> Result<QuestionResult> {
        let number = turn_index + 1;
        tracing::info!(turn = number, %difficulty, "starting turn");

        // 1. Ask
        self.services
            .speaker
            .speak(&format!("Question {number}. {question}"))
            .await?;
        tracing::debug!(turn = number, "question spoken");

        // 2. Listen, starting from the moment playback ends
        tracing::info!(turn = number, "listening for answer");
        let utterance = self
            .detector
            .detect_end_of_speech(&mut self.audio, &self.shutdown)
            .await;
        if utterance.reason == EndReason::Cancelled {
            return Err(Error::Cancelled);
        }
        tracing::info!(
            turn = number,
            reason = ?utterance.reason,
            chunks = utterance.audio.chunks.len(),
            elapsed_ms = u64::try_from(utterance.elapsed.as_millis()).unwrap_or(u64::MAX),
            "listening ended"
        );

        // 3. Transcribe
        let transcript = self.transcribe(number, &utterance.audio).await?;

        // 4. Score
        let scored = self.score(number, question, &transcript).await?;

        // 5. Record
        let result = QuestionResult {
            question: question.to_string(),
            transcript,
            score: scored.score,
            feedback: scored.feedback,
            difficulty,
        };
        tracing::info!(turn = number, score = result.score, "answer scored");

        // 6. Feedback between questions
        if number < self.total_questions {
            self.services
                .speaker
                .speak(&feedback_line(result.score))
                .await?;
        }

        Ok(result)
    }

    async fn transcribe(&self, number: usize, audio: &AudioBuffer) -> Result<String> {
        if audio.is_empty() {
            tracing::info!(turn = number, "no answer captured");
            return Ok(String::new());
        }

        let recognizer = &self.services.recognizer;
        let limit = self.services.transcribe_timeout;
        let transcription = async {
            tokio::time::timeout(limit, recognizer.transcribe(audio))
                .await
                .map_err(|_| Error::Stt(format!("transcription timed out after {limit:?}")))?
        };

        match self.shutdown.run_until(transcription).await? {
            Ok(text) => {
                let text = text.trim().to_string();
                tracing::info!(turn = number, transcript = %text, "transcription complete");
                Ok(text)
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(
                    turn = number,
                    stt = recognizer.name(),
                    error = %e,
                    "transcription failed, treating answer as empty"
                );
                Ok(String::new())
            }
        }
    }

    async fn score(&self, number: usize, question: &str, transcript: &str) -> Result<AnswerScore> {
        let scored = self
            .shutdown
            .run_until(oracle::score_answer(
                self.services.oracle.as_ref(),
                &self.settings,
                question,
                transcript,
            ))
            .await?;

        match scored {
            Ok(scored) => Ok(scored),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(
                    turn = number,
                    error = %e,
                    kind = ?e.kind(),
                    "scoring failed, using fallback score"
                );
                Ok(AnswerScore {
                    score: 0,
                    feedback: SCORING_FALLBACK_FEEDBACK.to_string(),
                })
            }
        }
    }
}
