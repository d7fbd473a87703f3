//! Agent speech output
//!
//! Synthesizes a line, publishes a short-lived track, pushes paced frames,
//! and unpublishes the track on every path once it exists.

use std::sync::Arc;
use std::time::Duration;

use super::tts::SpeechSynthesizer;
use crate::shutdown::Shutdown;
use crate::transport::{MediaTransport, TrackHandle};
use crate::{Error, Result};

/// Speech output framing
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Output sample rate (mono PCM16)
    pub sample_rate: u32,
    /// Audio carried by one frame
    pub frame_duration: Duration,
    /// Delay after each pushed frame so the transport buffer is not overrun
    pub frame_pacing: Duration,
    /// Name of the published track
    pub track_name: String,
    /// Upper bound on one synthesis call; elapsed skips the line
    pub synthesis_timeout: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            frame_duration: Duration::from_millis(100),
            frame_pacing: Duration::from_millis(80),
            track_name: "agent-voice".to_string(),
            synthesis_timeout: crate::config::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SpeechConfig {
    /// Samples per frame, never zero
    #[must_use]
    pub fn frame_samples(&self) -> usize {
        let samples = u128::from(self.sample_rate) * self.frame_duration.as_millis() / 1000;
        usize::try_from(samples).unwrap_or(usize::MAX).max(1)
    }
}

/// Speaks lines into the room
#[derive(Clone)]
pub struct Speaker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    transport: Arc<dyn MediaTransport>,
    config: SpeechConfig,
    shutdown: Shutdown,
}

impl Speaker {
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        transport: Arc<dyn MediaTransport>,
        config: SpeechConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            synthesizer,
            transport,
            config,
            shutdown,
        }
    }

    /// Speak `text` and return once every frame has been submitted
    ///
    /// Synthesis and decoding failures are logged and the line is skipped.
    ///
    /// # Errors
    ///
    /// Returns transport failures and `Error::Cancelled`
    pub async fn speak(&self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        tracing::info!(text = %preview(text), "speaking");

        let limit = self.config.synthesis_timeout;
        let synthesis = async {
            tokio::time::timeout(limit, self.synthesizer.synthesize(text))
                .await
                .map_err(|_| Error::Tts(format!("synthesis timed out after {limit:?}")))?
        };

        let speech = match self.shutdown.run_until(synthesis).await? {
            Ok(speech) => speech,
            Err(e) if !e.is_fatal() => {
                tracing::warn!(
                    provider = self.synthesizer.name(),
                    error = %e,
                    "speech synthesis failed, skipping line"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let samples = match speech.to_samples(self.config.sample_rate) {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!(error = %e, "could not decode synthesized speech, skipping line");
                return Ok(());
            }
        };
        if samples.is_empty() {
            tracing::warn!("synthesizer returned no audio, skipping line");
            return Ok(());
        }

        let track = self
            .shutdown
            .run_until(
                self.transport
                    .publish_track(&self.config.track_name, self.config.sample_rate),
            )
            .await??;
        tracing::debug!(sid = %track.sid, samples = samples.len(), "published speech track");

        let streamed = self.stream_frames(&track, &samples).await;

        // Unpublish regardless of how streaming ended
        let sid = track.sid.clone();
        let unpublished = self.transport.unpublish_track(track).await;
        if let Err(e) = &unpublished {
            tracing::error!(sid = %sid, error = %e, "failed to unpublish speech track");
        } else {
            tracing::debug!(sid = %sid, "unpublished speech track");
        }

        streamed.and(unpublished)
    }

    async fn stream_frames(&self, track: &TrackHandle, samples: &[i16]) -> Result<()> {
        let frame_samples = self.config.frame_samples();
        let mut frames = 0_usize;

        for frame in samples.chunks(frame_samples) {
            self.shutdown
                .run_until(self.transport.push_frame(track, frame.to_vec()))
                .await??;
            frames += 1;

            self.shutdown
                .run_until(tokio::time::sleep(self.config.frame_pacing))
                .await?;
        }

        tracing::debug!(frames, "speech frames submitted");
        Ok(())
    }
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX_CHARS).collect();
        format!("{head}...")
    }
}
