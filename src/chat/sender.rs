use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use futures_util::StreamExt;

use crate::chat::playback::PlaybackHooks;
use crate::chat::socket::ChatSocket;
use crate::error::{Error, Result};
use crate::types::events::client::AudioSettings;

/// Where a [`Sender`] writes captured audio.
#[async_trait]
pub trait AudioTransport: Send + Sync {
    async fn send_audio(&self, pcm: &[u8]) -> Result<()>;
}

#[async_trait]
impl AudioTransport for ChatSocket {
    async fn send_audio(&self, pcm: &[u8]) -> Result<()> {
        self.send_audio_input(pcm).await
    }
}

/// The user side of a voice chat: forwards captured audio and is told when
/// assistant audio starts and stops playing.
#[async_trait]
pub trait Sender: PlaybackHooks {
    /// Format of the forwarded audio, announced in `session_settings`.
    fn audio_settings(&self) -> Option<AudioSettings>;

    /// Forwards audio until the source ends or sending fails.
    async fn send(&self, transport: &dyn AudioTransport) -> Result<()>;
}

/// Whether captured audio may be forwarded right now.
#[derive(Debug, Clone)]
pub struct SenderState(Arc<AtomicBool>);

impl SenderState {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for SenderState {
    fn default() -> Self {
        Self::new()
    }
}

/// Forwards a stream of PCM16 chunks, muted while the assistant speaks.
///
/// Chunks captured while muted are dropped, never replayed later.
pub struct MicrophoneSender<S> {
    chunks: tokio::sync::Mutex<Option<S>>,
    settings: AudioSettings,
    state: SenderState,
    allow_interrupt: bool,
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

impl<S> MicrophoneSender<S>
where
    S: Stream<Item = Bytes> + Send + Unpin,
{
    pub fn new(chunks: S, settings: AudioSettings) -> Self {
        Self {
            chunks: tokio::sync::Mutex::new(Some(chunks)),
            settings,
            state: SenderState::new(),
            allow_interrupt: false,
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Keeps forwarding while the assistant speaks, so the user can barge in.
    pub fn with_allow_interrupt(mut self, allow: bool) -> Self {
        self.allow_interrupt = allow;
        self
    }

    pub fn state(&self) -> &SenderState {
        &self.state
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<S> PlaybackHooks for MicrophoneSender<S>
where
    S: Stream<Item = Bytes> + Send + Unpin,
{
    fn on_audio_begin(&self) {
        if !self.allow_interrupt {
            self.state.close();
        }
    }

    fn on_audio_end(&self) {
        self.state.open();
    }
}

#[async_trait]
impl<S> Sender for MicrophoneSender<S>
where
    S: Stream<Item = Bytes> + Send + Unpin,
{
    fn audio_settings(&self) -> Option<AudioSettings> {
        Some(self.settings.clone())
    }

    async fn send(&self, transport: &dyn AudioTransport) -> Result<()> {
        let mut chunks = self
            .chunks
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::InvalidArgument("audio source already consumed".to_string()))?;

        while let Some(chunk) = chunks.next().await {
            if self.state.is_open() {
                transport.send_audio(&chunk).await?;
                self.forwarded.fetch_add(1, Ordering::Relaxed);
            } else {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::trace!("assistant speaking, dropped captured chunk ({} total)", dropped);
            }
        }
        tracing::info!(
            "audio source ended: {} chunks forwarded, {} dropped",
            self.forwarded(),
            self.dropped()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Vec<u8>>>);

    #[async_trait]
    impl AudioTransport for Recorder {
        async fn send_audio(&self, pcm: &[u8]) -> Result<()> {
            self.0.lock().unwrap().push(pcm.to_vec());
            Ok(())
        }
    }

    fn three_chunks() -> impl Stream<Item = Bytes> + Send + Unpin {
        futures::stream::iter(vec![
            Bytes::from_static(&[1, 0]),
            Bytes::from_static(&[2, 0]),
            Bytes::from_static(&[3, 0]),
        ])
    }

    async fn forwarded_during_playback(allow_interrupt: bool) -> usize {
        let sender = MicrophoneSender::new(three_chunks(), AudioSettings::linear16(16000, 1))
            .with_allow_interrupt(allow_interrupt);
        let transport = Recorder::default();

        sender.on_audio_begin();
        sender.send(&transport).await.unwrap();
        sender.on_audio_end();

        assert!(sender.state().is_open());
        let sent = transport.0.lock().unwrap().len();
        sent
    }

    #[tokio::test]
    async fn mutes_while_assistant_speaks() {
        assert_eq!(forwarded_during_playback(false).await, 0);
    }

    #[tokio::test]
    async fn forwards_everything_when_interrupt_allowed() {
        assert_eq!(forwarded_during_playback(true).await, 3);
    }

    #[tokio::test]
    async fn forwards_in_capture_order_when_idle() {
        let sender = MicrophoneSender::new(three_chunks(), AudioSettings::linear16(16000, 1));
        let transport = Recorder::default();
        sender.send(&transport).await.unwrap();
        assert_eq!(*transport.0.lock().unwrap(), vec![vec![1, 0], vec![2, 0], vec![3, 0]]);
        assert_eq!(sender.forwarded(), 3);
        assert_eq!(sender.dropped(), 0);
    }

    #[tokio::test]
    async fn source_is_consumed_once() {
        let sender = MicrophoneSender::new(three_chunks(), AudioSettings::linear16(16000, 1));
        let transport = Recorder::default();
        sender.send(&transport).await.unwrap();
        assert!(matches!(
            sender.send(&transport).await,
            Err(Error::InvalidArgument(_))
        ));
    }
}
