//! Utterance endpoint detection
//!
//! Decides when the candidate has finished answering. Any chunk arriving
//! counts as speech; the answer ends after `silence_timeout` without new
//! chunks, or unconditionally after `max_total_wait`.
//!
//! Known limitation: with no energy gate configured, background noise that
//! produces chunks keeps the window open exactly like speech does.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Instant, sleep_until};

use super::codec;
use crate::shutdown::Shutdown;

/// Listening window configuration
#[derive(Debug, Clone)]
pub struct ListenConfig {
    /// Hard cap on one listening window
    pub max_total_wait: Duration,
    /// Quiet period after speech that ends the answer
    pub silence_timeout: Duration,
    /// How often the chunk queue is inspected
    pub poll_interval: Duration,
    /// Pause between question playback and the timed window; audio that
    /// arrives during it is kept
    pub lead_in: Duration,
    /// Minimum PCM16 RMS (0.0..=1.0) for a chunk to count as speech
    pub energy_threshold: Option<f32>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            max_total_wait: Duration::from_secs(60),
            silence_timeout: Duration::from_millis(2500),
            poll_interval: Duration::from_millis(200),
            lead_in: Duration::from_millis(500),
            energy_threshold: None,
        }
    }
}

/// Live candidate audio: PCM16LE mono chunks at `sample_rate`
#[derive(Debug)]
pub struct AudioStream {
    pub sample_rate: u32,
    pub chunks: mpsc::Receiver<Vec<u8>>,
}

impl AudioStream {
    #[must_use]
    pub const fn new(sample_rate: u32, chunks: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            sample_rate,
            chunks,
        }
    }
}

/// Chunks captured during one listening window, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub chunks: Vec<Vec<u8>>,
}

impl AudioBuffer {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Vec::is_empty)
    }

    /// Total captured bytes
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Concatenate all chunks
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

/// Why a listening window closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Speech followed by `silence_timeout` of quiet
    Silence,
    /// `max_total_wait` elapsed
    MaxWait,
    /// The audio source went away before any speech
    StreamClosed,
    /// Shutdown was requested
    Cancelled,
}

/// Result of one listening window
#[derive(Debug, Clone)]
pub struct Utterance {
    pub audio: AudioBuffer,
    pub reason: EndReason,
    pub elapsed: Duration,
}

/// Fixed-threshold end-of-speech detector
#[derive(Debug, Clone)]
pub struct EndpointDetector {
    config: ListenConfig,
}

impl EndpointDetector {
    #[must_use]
    pub const fn new(config: ListenConfig) -> Self {
        Self { config }
    }

    /// Collect chunks from `stream` until the candidate stops talking
    ///
    /// Chunks already queued on entry belong to the previous phase and are
    /// discarded. Chunks arriving during the `lead_in` pause are kept and
    /// count toward the answer; the timing thresholds start after it.
    /// Never fails: an empty buffer means nothing was captured.
    pub async fn detect_end_of_speech(
        &self,
        stream: &mut AudioStream,
        shutdown: &Shutdown,
    ) -> Utterance {
        let stale = drain_stale(&mut stream.chunks);
        if stale > 0 {
            tracing::debug!(stale, "discarded chunks queued before listening");
        }

        if !self.config.lead_in.is_zero()
            && shutdown
                .run_until(tokio::time::sleep(self.config.lead_in))
                .await
                .is_err()
        {
            return Utterance {
                audio: AudioBuffer {
                    sample_rate: stream.sample_rate,
                    chunks: Vec::new(),
                },
                reason: EndReason::Cancelled,
                elapsed: Duration::ZERO,
            };
        }
        tracing::debug!("listening window open");

        let started = Instant::now();
        let deadline = started + self.config.max_total_wait;
        let mut chunks = Vec::new();
        let mut has_spoken = false;
        let mut last_activity = started;
        let mut next_tick = started;

        let reason = loop {
            next_tick = (next_tick + self.config.poll_interval).min(deadline);

            let cancelled = tokio::select! {
                biased;
                () = shutdown.triggered() => true,
                () = sleep_until(next_tick) => false,
            };
            if cancelled {
                break EndReason::Cancelled;
            }

            let (activity, closed) = self.collect(&mut stream.chunks, &mut chunks);
            let now = Instant::now();

            if activity {
                has_spoken = true;
                last_activity = now;
            }

            if has_spoken && now.duration_since(last_activity) > self.config.silence_timeout {
                break EndReason::Silence;
            }
            if now >= deadline {
                break EndReason::MaxWait;
            }
            if closed && !has_spoken {
                break EndReason::StreamClosed;
            }
        };

        let audio = AudioBuffer {
            sample_rate: stream.sample_rate,
            chunks,
        };
        let elapsed = started.elapsed();

        tracing::debug!(
            ?reason,
            chunks = audio.chunks.len(),
            bytes = audio.byte_len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "listening window closed"
        );

        Utterance {
            audio,
            reason,
            elapsed,
        }
    }

    /// Move every queued chunk into `out`; report speech activity and closure
    fn collect(&self, rx: &mut mpsc::Receiver<Vec<u8>>, out: &mut Vec<Vec<u8>>) -> (bool, bool) {
        let mut activity = false;
        loop {
            match rx.try_recv() {
                Ok(chunk) => {
                    if self.counts_as_speech(&chunk) {
                        activity = true;
                    }
                    out.push(chunk);
                }
                Err(TryRecvError::Empty) => return (activity, false),
                Err(TryRecvError::Disconnected) => return (activity, true),
            }
        }
    }

    fn counts_as_speech(&self, chunk: &[u8]) -> bool {
        match self.config.energy_threshold {
            None => true,
            Some(threshold) => codec::pcm16_rms(chunk) >= threshold,
        }
    }
}

fn drain_stale(rx: &mut mpsc::Receiver<Vec<u8>>) -> usize {
    let mut count = 0;
    while rx.try_recv().is_ok() {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_of_empty_chunks_is_empty() {
        let buffer = AudioBuffer {
            sample_rate: 16_000,
            chunks: vec![Vec::new(), Vec::new()],
        };
        assert!(buffer.is_empty());
        assert_eq!(buffer.byte_len(), 0);
    }

    #[test]
    fn buffer_concatenates_in_order() {
        let buffer = AudioBuffer {
            sample_rate: 16_000,
            chunks: vec![vec![1, 2], vec![3], vec![4, 5]],
        };
        assert_eq!(buffer.to_bytes(), vec![1, 2, 3, 4, 5]);
        assert_eq!(buffer.byte_len(), 5);
    }

    #[test]
    fn energy_gate_ignores_quiet_chunks() {
        let detector = EndpointDetector::new(ListenConfig {
            energy_threshold: Some(0.1),
            ..ListenConfig::default()
        });
        let quiet = codec::samples_to_pcm16(&[0.01; 160]);
        let loud = codec::samples_to_pcm16(&[0.5; 160]);
        assert!(!detector.counts_as_speech(&quiet));
        assert!(detector.counts_as_speech(&loud));
    }

    #[test]
    fn no_gate_treats_everything_as_speech() {
        let detector = EndpointDetector::new(ListenConfig::default());
        assert!(detector.counts_as_speech(&[0, 0]));
    }
}
