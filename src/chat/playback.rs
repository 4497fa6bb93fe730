use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

/// Called by an [`AudioSink`] around the audible part of an utterance.
pub trait PlaybackHooks: Send + Sync {
    fn on_audio_begin(&self);
    fn on_audio_end(&self);
}

/// Plays assistant audio.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Plays `chunks` as one utterance. `on_audio_begin` must run before the
    /// first sample is audible and `on_audio_end` once after the last one,
    /// also when playback fails or is stopped after it began.
    async fn play_stream(&self, chunks: BoxStream<'_, Bytes>, hooks: &dyn PlaybackHooks) -> Result<()>;

    /// Halts the current utterance. Safe to call when idle.
    fn stop(&self);
}
