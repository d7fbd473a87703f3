//! Interview Agent - adaptive voice interviewer
//!
//! This library provides the turn-taking core of a spoken technical
//! interview:
//! - Endpoint detection over a live candidate audio stream
//! - Adaptive question planning from the running score average
//! - Turn control: ask, listen, transcribe, score, give feedback
//! - Session orchestration from room join to disconnect
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Session Orchestrator                  │
//! │   Greeting  │  Planner  │  Turn Controller  │ Close  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Speaker  │  Endpoint Detector  │  STT  │  Oracle   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        Media Transport (room, tracks, audio)         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod interview;
pub mod oracle;
pub mod shutdown;
pub mod transport;
pub mod voice;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
