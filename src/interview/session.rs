//! Session orchestrator
//!
//! `INIT -> GREETING -> (QUESTION_i -> FEEDBACK_i)* -> CLOSING -> DONE`.
//! No retries at this level: a fatal error from any phase ends the session,
//! after which disconnect is still attempted.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::Instrument;

use super::planner::QuestionPlanner;
use super::turn::{TurnController, TurnServices};
use super::types::{SessionState, SessionSummary};
use crate::config::Config;
use crate::oracle::Oracle;
use crate::shutdown::Shutdown;
use crate::transport::{MediaTransport, parse_skill};
use crate::voice::{EndpointDetector, Speaker, SpeechRecognizer, SpeechSynthesizer};
use crate::{Error, Result};

/// Session state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    Greeting,
    /// Zero-based question index
    Question(usize),
    Closing,
    Done,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Greeting => f.write_str("greeting"),
            Self::Question(i) => write!(f, "question_{i}"),
            Self::Closing => f.write_str("closing"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// Opening line naming the skill and question count
#[must_use]
pub fn greeting(skill: &str, total_questions: usize) -> String {
    format!(
        "Hello! I'm your AI interviewer today. We'll be covering {skill}. \
         I'll ask you {total_questions} questions and adjust the difficulty based on \
         how you're doing. Take your time with each answer. I'll automatically detect \
         when you've finished speaking. Let's begin!"
    )
}

/// Closing line with the number answered and the average
#[must_use]
pub fn closing(answered: usize, average: f64) -> String {
    format!(
        "That concludes your interview. You answered {answered} questions \
         with an average score of {average:.1} out of 10. \
         Your detailed results are on screen. Well done, and good luck!"
    )
}

/// Collaborators injected into a session
#[derive(Clone)]
pub struct SessionServices {
    pub transport: Arc<dyn MediaTransport>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub oracle: Arc<dyn Oracle>,
}

/// Drives one interview from join to disconnect
pub struct SessionOrchestrator {
    config: Config,
    services: SessionServices,
    shutdown: Shutdown,
}

impl SessionOrchestrator {
    #[must_use]
    pub const fn new(config: Config, services: SessionServices, shutdown: Shutdown) -> Self {
        Self {
            config,
            services,
            shutdown,
        }
    }

    /// Run a full interview in `room`
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `room` fails the configured prefix filter,
    /// transport failures, and `Error::Cancelled`
    pub async fn run(&self, room: &str) -> Result<SessionSummary> {
        if let Some(prefix) = &self.config.interview.room_prefix
            && !room.starts_with(prefix.as_str())
        {
            return Err(Error::Config(format!(
                "room {room:?} does not match prefix {prefix:?}"
            )));
        }

        let session_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("session", %session_id, room);

        async {
            let outcome = self.run_phases(session_id, room).await;

            if let Err(e) = self.services.transport.disconnect().await {
                tracing::warn!(error = %e, "disconnect failed");
            }

            match &outcome {
                Ok(summary) => {
                    log_phase(SessionPhase::Done);
                    tracing::info!(
                        questions = summary.results.len(),
                        average_score = summary.average_score,
                        "interview complete"
                    );
                }
                Err(e) => tracing::error!(error = %e, kind = ?e.kind(), "session ended early"),
            }

            outcome
        }
        .instrument(span)
        .await
    }

    async fn run_phases(&self, session_id: uuid::Uuid, room: &str) -> Result<SessionSummary> {
        let started_at = Utc::now();
        let transport = &self.services.transport;
        let total = self.config.interview.total_questions;

        // INIT
        log_phase(SessionPhase::Init);
        let info = self.shutdown.run_until(transport.join(room)).await??;
        let skill = parse_skill(info.metadata.as_deref(), &self.config.interview.default_skill);
        tracing::info!(room = %info.name, %skill, "room joined");

        let participant = self
            .shutdown
            .run_until(transport.wait_for_participant())
            .await??;
        tracing::info!(identity = %participant.identity, "participant joined");

        let audio = self
            .shutdown
            .run_until(transport.subscribe_audio(&participant))
            .await??;

        let speaker = Speaker::new(
            Arc::clone(&self.services.synthesizer),
            Arc::clone(transport),
            self.config.speech.clone(),
            self.shutdown.clone(),
        );
        let planner = QuestionPlanner::new(
            Arc::clone(&self.services.oracle),
            self.config.oracle.settings.clone(),
            self.shutdown.clone(),
        );
        let mut turns = TurnController::new(
            audio,
            EndpointDetector::new(self.config.listen.clone()),
            TurnServices {
                speaker: speaker.clone(),
                recognizer: Arc::clone(&self.services.recognizer),
                oracle: Arc::clone(&self.services.oracle),
                transcribe_timeout: self.config.voice.request_timeout,
            },
            self.config.oracle.settings.clone(),
            total,
            self.shutdown.clone(),
        );
        let mut state = SessionState::new(skill, total);

        // GREETING
        log_phase(SessionPhase::Greeting);
        speaker.speak(&greeting(state.skill(), total)).await?;

        // QUESTION_i / FEEDBACK_i
        while !state.is_complete() {
            let index = state.turn_index();
            log_phase(SessionPhase::Question(index));

            let planned = planner.plan_next(state.skill(), state.history()).await?;
            let result = turns
                .run_turn(index, &planned.question, planned.difficulty)
                .await?;
            state.record(result);
        }

        // CLOSING
        log_phase(SessionPhase::Closing);
        let average_score = state.final_average();
        speaker
            .speak(&closing(state.history().len(), average_score))
            .await?;

        Ok(SessionSummary {
            session_id,
            room: info.name,
            skill: state.skill().to_string(),
            results: state.into_history(),
            average_score,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

fn log_phase(phase: SessionPhase) {
    tracing::info!(%phase, "session phase");
}
