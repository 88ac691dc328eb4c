//! Remote processing API client and poller.
//!
//! This crate provides:
//! - Typed, validated parameters for every remote task kind
//! - An HTTP client with a uniform submit/status contract
//! - A fixed-interval poller that resolves a task under a deadline

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod params;
pub mod poller;

pub use client::{HttpRemoteTaskClient, RemoteTaskClient};
pub use config::RemoteConfig;
pub use error::{ConfigError, PollError, SubmitError, TaskError, TransportError, ValidationError};
pub use params::{
    BackgroundMusicParams, CaptionModel, CaptionParams, ImageParams, MergeParams, MusicParams,
    TaskParams, VideoParams, VoiceoverParams,
};
pub use poller::{Poller, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL};
