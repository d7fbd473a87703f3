//! Audio playback to speakers
//!
//! A `PlaybackQueue` is one streaming output: frames are appended while the
//! cpal callback drains them, and `drain` waits for the queue to empty.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use tokio::sync::oneshot;

use crate::{Error, Result};

/// Extra time allowed past the queued audio length when draining
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Streaming playback on the default output device
pub struct PlaybackQueue {
    sample_rate: u32,
    queue: Arc<Mutex<VecDeque<f32>>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PlaybackQueue {
    /// Open the default output device at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub async fn open(sample_rate: u32) -> Result<Self> {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_queue = Arc::clone(&queue);
        let thread_running = Arc::clone(&running);
        let thread = std::thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || {
                playback_thread(sample_rate, thread_queue, &thread_running, ready_tx);
            })
            .map_err(|e| Error::Audio(format!("failed to spawn playback thread: {e}")))?;

        let mut playback = Self {
            sample_rate,
            queue,
            running,
            thread: Some(thread),
        };

        match ready_rx.await {
            Ok(Ok(())) => Ok(playback),
            Ok(Err(e)) => {
                playback.close();
                Err(e)
            }
            Err(_) => {
                playback.close();
                Err(Error::Audio("playback thread exited during setup".to_string()))
            }
        }
    }

    /// Append PCM16 samples to the queue
    pub fn push(&self, samples: &[i16]) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(samples.iter().map(|&s| f32::from(s) / 32768.0));
        }
    }

    /// Append f32 samples to the queue
    pub fn push_f32(&self, samples: &[f32]) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(samples.iter().copied());
        }
    }

    fn queued(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Wait until every queued sample has been handed to the device
    pub async fn drain(&self) {
        let queued = u64::try_from(self.queued()).unwrap_or(u64::MAX);
        let expected = Duration::from_millis(
            queued.saturating_mul(1000) / u64::from(self.sample_rate.max(1)),
        );
        let deadline = tokio::time::Instant::now() + expected + DRAIN_GRACE;

        while self.queued() > 0 {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(remaining = self.queued(), "playback drain timed out");
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        // Let the device flush its own buffer
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Stop the output stream
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            tracing::debug!("playback stopped");
        }
    }
}

impl Drop for PlaybackQueue {
    fn drop(&mut self) {
        self.close();
    }
}

/// Play f32 samples to completion
///
/// # Errors
///
/// Returns error if the output device cannot be opened
pub async fn play_samples(samples: &[f32], sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let mut playback = PlaybackQueue::open(sample_rate).await?;
    playback.push_f32(samples);
    playback.drain().await;
    playback.close();

    tracing::debug!(samples = samples.len(), "playback complete");
    Ok(())
}

fn playback_thread(
    sample_rate: u32,
    queue: Arc<Mutex<VecDeque<f32>>>,
    running: &AtomicBool,
    ready: oneshot::Sender<Result<()>>,
) {
    let stream = match open_output(sample_rate, queue) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(Error::Audio(e.to_string())));
        return;
    }
    let _ = ready.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
}

fn open_output(sample_rate: u32, queue: Arc<Mutex<VecDeque<f32>>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = output_config(&device, sample_rate)?;
    let channels = usize::from(config.channels);

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "audio playback initialized"
    );

    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut queue) = queue.lock() else {
                    data.fill(0.0);
                    return;
                };
                for frame in data.chunks_mut(channels) {
                    let sample = queue.pop_front().unwrap_or(0.0);
                    frame.fill(sample);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}

fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels
            && c.min_sample_rate() <= SampleRate(sample_rate)
            && c.max_sample_rate() >= SampleRate(sample_rate)
    };

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| supports(c, 1))
        .or_else(|| {
            // Fallback: try stereo
            device
                .supported_output_configs()
                .ok()?
                .find(|c| supports(c, 2))
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    Ok(supported_config
        .with_sample_rate(SampleRate(sample_rate))
        .config())
}
