//! Client for the Hume API: the EVI voice chat, streaming inference and
//! batch jobs.
//!
//! Enable the `utils` feature for microphone capture and speaker playback.

pub mod batch;
pub mod chat;
mod client;
mod error;
#[cfg(feature = "utils")]
mod native;
pub mod retry;
pub mod session;
pub mod stream;

pub use hume_realtime_types as types;

pub use batch::{BatchClient, BatchJob, JobStatusSource};
pub use chat::{ChatClient, ChatRunner, ChatSocket};
pub use client::{connect, connect_with_config, ChatConnectOptions, ClientConfig, ClientConfigBuilder, HumeClient, Stats};
pub use error::{Error, Result};
pub use retry::{poll_until, Attempt, RetryPolicy};
pub use stream::{StreamClient, StreamOptions, StreamSocket};

#[cfg(feature = "utils")]
pub use hume_realtime_utils as utils;
