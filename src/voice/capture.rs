//! Audio capture from microphone
//!
//! The cpal stream lives on its own thread. Each callback block is gated on
//! RMS energy and forwarded as PCM16LE bytes over a bounded channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};
use tokio::sync::{mpsc, oneshot};

use super::codec;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Samples per forwarded chunk (20ms)
const CHUNK_SAMPLES: usize = 320;

/// Default noise gate for the local microphone
pub const DEFAULT_NOISE_GATE: f32 = 0.01;

/// Running microphone capture; stops when dropped
pub struct MicCapture {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MicCapture {
    /// Open the default input device and start forwarding chunks to `tx`
    ///
    /// Chunks quieter than `noise_gate` are dropped, as are chunks that
    /// arrive while the channel is full.
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub async fn start(tx: mpsc::Sender<Vec<u8>>, noise_gate: f32) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = oneshot::channel();

        let thread_running = Arc::clone(&running);
        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_thread(&tx, noise_gate, &thread_running, ready_tx))
            .map_err(|e| Error::Audio(format!("failed to spawn capture thread: {e}")))?;

        let mut capture = Self {
            running,
            thread: Some(thread),
        };

        match ready_rx.await {
            Ok(Ok(())) => Ok(capture),
            Ok(Err(e)) => {
                capture.stop();
                Err(e)
            }
            Err(_) => {
                capture.stop();
                Err(Error::Audio("capture thread exited during setup".to_string()))
            }
        }
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
            tracing::debug!("audio capture stopped");
        }
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_thread(
    tx: &mpsc::Sender<Vec<u8>>,
    noise_gate: f32,
    running: &AtomicBool,
    ready: oneshot::Sender<Result<()>>,
) {
    let stream = match open_input(tx.clone(), noise_gate) {
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

    tracing::debug!(sample_rate = SAMPLE_RATE, noise_gate, "audio capture started");
    let _ = ready.send(Ok(()));

    // The stream is !Send on some hosts; keep it alive on this thread
    while running.load(Ordering::SeqCst) && !tx.is_closed() {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
}

fn open_input(tx: mpsc::Sender<Vec<u8>>, noise_gate: f32) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let config = input_config(&device)?;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels = config.channels,
        "audio capture initialized"
    );

    let mut pending: Vec<f32> = Vec::with_capacity(CHUNK_SAMPLES * 2);
    let mut dropped = 0_u64;

    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                pending.extend_from_slice(data);
                while pending.len() >= CHUNK_SAMPLES {
                    let chunk: Vec<f32> = pending.drain(..CHUNK_SAMPLES).collect();
                    if codec::rms(&chunk) < noise_gate {
                        continue;
                    }
                    if tx.try_send(codec::samples_to_pcm16(&chunk)).is_err() {
                        dropped += 1;
                        if dropped.is_power_of_two() {
                            tracing::warn!(dropped, "capture channel full, dropping audio");
                        }
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}

fn input_config(device: &Device) -> Result<StreamConfig> {
    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

    Ok(supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config())
}
