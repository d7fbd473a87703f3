//! Local sound-card transport
//!
//! Runs an interview against the machine's own microphone and speakers. The
//! "room" is local, the operator is the participant, and each published
//! track is a streaming playback queue.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{MediaTransport, Participant, RoomInfo, TrackHandle};
use crate::voice::{AudioStream, DEFAULT_NOISE_GATE, MicCapture, PlaybackQueue, SAMPLE_RATE};
use crate::{Error, Result};

/// Identity reported for the local operator
pub const LOCAL_PARTICIPANT: &str = "local-operator";

/// Microphone chunks buffered before capture starts dropping audio
const CAPTURE_CHANNEL_CAPACITY: usize = 512;

#[derive(Default)]
struct LocalState {
    room: Option<String>,
    capture: Option<MicCapture>,
    tracks: HashMap<String, PlaybackQueue>,
}

/// Transport backed by the default cpal input and output devices
pub struct LocalTransport {
    metadata: Option<String>,
    next_track: AtomicU64,
    state: Mutex<LocalState>,
}

impl LocalTransport {
    /// Create a transport that reports `metadata` for any joined room
    #[must_use]
    pub fn new(metadata: Option<String>) -> Self {
        Self {
            metadata,
            next_track: AtomicU64::new(1),
            state: Mutex::new(LocalState::default()),
        }
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, LocalState>> {
        self.state
            .lock()
            .map_err(|_| Error::Transport("local transport state poisoned".to_string()))
    }
}

#[async_trait]
impl MediaTransport for LocalTransport {
    async fn join(&self, room: &str) -> Result<RoomInfo> {
        self.state()?.room = Some(room.to_string());
        tracing::info!(room, "joined local room");

        Ok(RoomInfo {
            name: room.to_string(),
            metadata: self.metadata.clone(),
        })
    }

    async fn wait_for_participant(&self) -> Result<Participant> {
        if self.state()?.room.is_none() {
            return Err(Error::Transport("not joined to a room".to_string()));
        }

        Ok(Participant {
            identity: LOCAL_PARTICIPANT.to_string(),
        })
    }

    async fn subscribe_audio(&self, participant: &Participant) -> Result<AudioStream> {
        let (tx, rx) = mpsc::channel(CAPTURE_CHANNEL_CAPACITY);
        let capture = MicCapture::start(tx, DEFAULT_NOISE_GATE)
            .await
            .map_err(|e| Error::Transport(format!("microphone unavailable: {e}")))?;

        // Replacing an earlier capture stops it
        self.state()?.capture = Some(capture);
        tracing::debug!(participant = %participant.identity, "subscribed to microphone");

        Ok(AudioStream::new(SAMPLE_RATE, rx))
    }

    async fn publish_track(&self, name: &str, sample_rate: u32) -> Result<TrackHandle> {
        let playback = PlaybackQueue::open(sample_rate)
            .await
            .map_err(|e| Error::Transport(format!("speaker unavailable: {e}")))?;

        let sid = format!("TR_local_{}", self.next_track.fetch_add(1, Ordering::Relaxed));
        self.state()?.tracks.insert(sid.clone(), playback);

        Ok(TrackHandle {
            sid,
            name: name.to_string(),
            sample_rate,
        })
    }

    async fn push_frame(&self, track: &TrackHandle, samples: Vec<i16>) -> Result<()> {
        let state = self.state()?;
        let playback = state
            .tracks
            .get(&track.sid)
            .ok_or_else(|| Error::Transport(format!("unknown track {}", track.sid)))?;
        playback.push(&samples);
        Ok(())
    }

    async fn unpublish_track(&self, track: TrackHandle) -> Result<()> {
        let playback = self
            .state()?
            .tracks
            .remove(&track.sid)
            .ok_or_else(|| Error::Transport(format!("unknown track {}", track.sid)))?;

        playback.drain().await;
        drop(playback);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let (capture, tracks) = {
            let mut state = self.state()?;
            state.room = None;
            (state.capture.take(), std::mem::take(&mut state.tracks))
        };

        drop(capture);
        drop(tracks);
        tracing::info!("left local room");
        Ok(())
    }
}
