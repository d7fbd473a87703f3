//! Adaptive question planner

use std::sync::Arc;

use super::types::{Difficulty, QuestionResult, planning_average};
use crate::oracle::{self, Oracle, OracleSettings};
use crate::shutdown::Shutdown;
use crate::{Error, Result};

/// Where a planned question came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSource {
    Oracle,
    Fallback,
}

/// Next question to ask
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedQuestion {
    pub question: String,
    /// Tier computed from history; the oracle's own label is advisory
    pub difficulty: Difficulty,
    pub source: QuestionSource,
}

/// Deterministic question used when the oracle cannot supply one
#[must_use]
pub fn fallback_question(skill: &str) -> String {
    format!("Tell me about {skill}")
}

/// Chooses the next question from the running score history
pub struct QuestionPlanner {
    oracle: Arc<dyn Oracle>,
    settings: OracleSettings,
    shutdown: Shutdown,
}

impl QuestionPlanner {
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>, settings: OracleSettings, shutdown: Shutdown) -> Self {
        Self {
            oracle,
            settings,
            shutdown,
        }
    }

    /// Plan the next question for `skill` given `history`
    ///
    /// Oracle failures and malformed replies fall back to
    /// [`fallback_question`] at the computed difficulty.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if shutdown is requested
    pub async fn plan_next(
        &self,
        skill: &str,
        history: &[QuestionResult],
    ) -> Result<PlannedQuestion> {
        let avg = planning_average(history);
        let difficulty = Difficulty::from_average(avg);

        let generated = self
            .shutdown
            .run_until(oracle::generate_question(
                self.oracle.as_ref(),
                &self.settings,
                skill,
                history,
                difficulty,
            ))
            .await?;

        let planned = match generated {
            Ok(draft) => {
                if let Some(claimed) = draft.difficulty.filter(|d| *d != difficulty) {
                    tracing::debug!(
                        %claimed,
                        %difficulty,
                        "oracle labelled question differently, keeping computed tier"
                    );
                }
                PlannedQuestion {
                    question: draft.question,
                    difficulty,
                    source: QuestionSource::Oracle,
                }
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                tracing::warn!(
                    oracle = self.oracle.name(),
                    error = %e,
                    kind = ?e.kind(),
                    "question generation failed, using fallback question"
                );
                PlannedQuestion {
                    question: fallback_question(skill),
                    difficulty,
                    source: QuestionSource::Fallback,
                }
            }
        };

        tracing::info!(
            question_number = history.len() + 1,
            %difficulty,
            avg_score = avg,
            source = ?planned.source,
            question = %planned.question,
            "question planned"
        );

        Ok(planned)
    }
}
