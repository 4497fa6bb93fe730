//! Binds the native audio devices to the chat traits.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::chat::{AudioSink, MicrophoneSender, PlaybackHooks};
use crate::error::{Error, Result};
use crate::utils::{ChunkStream, Microphone, PlaybackError, Speaker};

#[async_trait]
impl AudioSink for Speaker {
    async fn play_stream(&self, chunks: BoxStream<'_, Bytes>, hooks: &dyn PlaybackHooks) -> Result<()> {
        self.play(chunks, || hooks.on_audio_begin(), || hooks.on_audio_end())
            .await
            .map_err(Error::from)
    }

    fn stop(&self) {
        Speaker::stop(self)
    }
}

impl From<PlaybackError> for Error {
    fn from(err: PlaybackError) -> Self {
        match err {
            PlaybackError::Codec(e) => Error::Codec(e),
            PlaybackError::Device(e) => Error::Device(e),
            PlaybackError::Io(e) => Error::Io(e),
            other => Error::Playback(other.to_string()),
        }
    }
}

impl MicrophoneSender<ChunkStream> {
    /// Forwards the microphone's captured audio in its native format.
    pub fn from_microphone(microphone: &mut Microphone) -> Result<Self> {
        let chunks = microphone
            .stream()
            .ok_or_else(|| Error::InvalidArgument("microphone stream already taken".to_string()))?;
        Ok(Self::new(chunks, microphone.audio_settings()))
    }
}
