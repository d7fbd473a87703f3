//! Media transport boundary
//!
//! A transport joins a room, hands out the candidate's audio, and carries
//! agent speech as short-lived published tracks.

pub mod local;

use async_trait::async_trait;
use serde_json::Value;

pub use local::LocalTransport;

use crate::Result;
use crate::voice::AudioStream;

/// A joined room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub name: String,
    /// Raw room metadata, expected to be a JSON object
    pub metadata: Option<String>,
}

/// The remote party being interviewed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub identity: String,
}

/// A published outbound audio track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHandle {
    pub sid: String,
    pub name: String,
    pub sample_rate: u32,
}

/// Room transport used by the session
///
/// Failures here are returned as `Error::Transport` and end the session.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Join `room` and return its metadata
    async fn join(&self, room: &str) -> Result<RoomInfo>;

    /// Block until the single remote participant is present
    async fn wait_for_participant(&self) -> Result<Participant>;

    /// Subscribe to the participant's microphone
    async fn subscribe_audio(&self, participant: &Participant) -> Result<AudioStream>;

    /// Publish a new mono PCM16 output track
    async fn publish_track(&self, name: &str, sample_rate: u32) -> Result<TrackHandle>;

    /// Push one frame of samples to a published track
    async fn push_frame(&self, track: &TrackHandle, samples: Vec<i16>) -> Result<()>;

    /// Remove a published track
    async fn unpublish_track(&self, track: TrackHandle) -> Result<()>;

    /// Leave the room
    async fn disconnect(&self) -> Result<()>;
}

/// Read the `skill` key from room metadata, falling back to `default`
///
/// Missing, non-JSON, non-object, or blank values all fall back.
#[must_use]
pub fn parse_skill(metadata: Option<&str>, default: &str) -> String {
    let skill = metadata
        .filter(|m| !m.trim().is_empty())
        .and_then(|m| match serde_json::from_str::<Value>(m) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "room metadata is not JSON, using default skill");
                None
            }
        })
        .and_then(|value| {
            value
                .get("skill")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        });

    skill.unwrap_or_else(|| default.to_string())
}
