//! Runs a voice chat: receive, send and playback loops over one socket.
//!
//! Assistant audio is queued per utterance and played in order. An
//! utterance ends at `assistant_end`, or once no further audio arrived for
//! the utterance gap. A `user_interruption` stops the sink and discards the
//! rest of the utterance being played.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::chat::playback::{AudioSink, PlaybackHooks};
use crate::chat::sender::Sender;
use crate::chat::socket::ChatSocket;
use crate::chat::tools::{self, ToolHandler};
use crate::chat::ChatClient;
use crate::client::config::ChatConnectOptions;
use crate::error::{Error, Result};
use crate::types::events::client::SessionSettings;
use crate::types::events::server::{AssistantMessageEvent, UserMessageEvent};
use crate::types::ServerEvent;

/// How long playback waits for more audio before the utterance is over.
pub const DEFAULT_UTTERANCE_GAP: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Sees every server event before the runner handles it.
pub type EventObserver = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Stops a running chat and reports its state.
#[derive(Clone)]
pub struct ChatHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ChatState>,
}

impl ChatHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> ChatState {
        *self.state.borrow()
    }

    /// Waits until the runner reached [`ChatState::Closed`].
    pub async fn closed(&mut self) {
        let _ = self.state.wait_for(|state| *state == ChatState::Closed).await;
    }
}

enum Audio {
    Chunk(Bytes),
    End,
}

struct PlaybackItem {
    generation: u64,
    audio: Audio,
}

pub struct ChatRunner<S, K> {
    sender: Arc<S>,
    sink: Arc<K>,
    tools: Option<Arc<dyn ToolHandler>>,
    observer: Option<EventObserver>,
    settings: SessionSettings,
    cancel: CancellationToken,
    state: watch::Sender<ChatState>,
    generation: AtomicU64,
    utterance_gap: Duration,
}

impl<S, K> ChatRunner<S, K>
where
    S: Sender + 'static,
    K: AudioSink + 'static,
{
    pub fn new(sender: S, sink: K) -> Self {
        Self::from_arcs(Arc::new(sender), Arc::new(sink))
    }

    /// Like [`ChatRunner::new`], keeping access to sender and sink.
    pub fn from_arcs(sender: Arc<S>, sink: Arc<K>) -> Self {
        let (state, _) = watch::channel(ChatState::Connecting);
        Self {
            sender,
            sink,
            tools: None,
            observer: None,
            settings: SessionSettings::new(),
            cancel: CancellationToken::new(),
            state,
            generation: AtomicU64::new(0),
            utterance_gap: DEFAULT_UTTERANCE_GAP,
        }
    }

    pub fn with_tool_handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools = Some(handler);
        self
    }

    pub fn with_observer(mut self, observer: EventObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Settings sent when the chat starts. The sender's audio format is
    /// filled in automatically.
    pub fn with_session_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_utterance_gap(mut self, gap: Duration) -> Self {
        self.utterance_gap = gap;
        self
    }

    pub fn handle(&self) -> ChatHandle {
        ChatHandle {
            cancel: self.cancel.clone(),
            state: self.state.subscribe(),
        }
    }

    /// Connects and runs the chat until it is stopped, the server ends it
    /// or one of the loops fails.
    pub async fn run(self, chat: &ChatClient, options: &ChatConnectOptions) -> Result<()> {
        let socket = tokio::select! {
            _ = self.cancel.cancelled() => {
                self.set_state(ChatState::Closed);
                return Ok(());
            }
            socket = chat.connect_with_options(options) => socket,
        };
        match socket {
            Ok(socket) => self.run_with_socket(socket).await,
            Err(e) => {
                tracing::error!("failed to connect: {}", e);
                self.set_state(ChatState::Closed);
                Err(e)
            }
        }
    }

    /// Runs the chat over an already connected socket, closing it at the end.
    pub async fn run_with_socket(self, socket: ChatSocket) -> Result<()> {
        self.set_state(ChatState::Active);
        let result = self.drive(&socket).await;
        if let Err(e) = &result {
            tracing::error!("chat ended: {}", e);
        }

        self.set_state(ChatState::Closing);
        self.cancel.cancel();
        self.sink.stop();
        socket.close().await;
        self.set_state(ChatState::Closed);
        tracing::info!("chat closed");
        result
    }

    fn set_state(&self, state: ChatState) {
        tracing::debug!("chat state: {:?}", state);
        self.state.send_replace(state);
    }

    async fn drive(&self, socket: &ChatSocket) -> Result<()> {
        let mut settings = self.settings.clone();
        if let Some(audio) = self.sender.audio_settings() {
            settings = settings.with_audio(audio);
        }
        socket.send_session_settings(settings).await?;

        let (playback_tx, playback_rx) = mpsc::unbounded_channel();
        // An error in one loop drops the other two.
        tokio::try_join!(
            self.receive_loop(socket, playback_tx),
            self.send_loop(socket),
            self.playback_loop(playback_rx),
        )?;
        Ok(())
    }

    async fn receive_loop(&self, socket: &ChatSocket, playback: mpsc::UnboundedSender<PlaybackItem>) -> Result<()> {
        let mut events = socket.events();
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                event = events.next() => match event {
                    Some(event) => event?,
                    None => return Ok(()),
                },
            };

            if let Some(observer) = &self.observer {
                observer(&event);
            }

            match event {
                ServerEvent::ChatMetadata(meta) => {
                    tracing::info!("chat {} started (group {})", meta.chat_id(), meta.chat_group_id());
                }
                ServerEvent::UserMessage(message) => render_user(&message),
                ServerEvent::AssistantMessage(message) => render_assistant(&message),
                ServerEvent::AudioOutput(audio) => match audio.decode() {
                    Ok(bytes) => {
                        socket.record_audio_received(bytes.len());
                        let item = PlaybackItem {
                            generation: self.generation.load(Ordering::SeqCst),
                            audio: Audio::Chunk(Bytes::from(bytes)),
                        };
                        if playback.send(item).is_err() {
                            tracing::debug!("playback loop gone, dropping audio");
                        }
                    }
                    Err(e) => tracing::warn!("skipping undecodable audio output {}: {}", audio.id(), e),
                },
                ServerEvent::AssistantEnd(_) => {
                    tracing::debug!("assistant turn ended");
                    let _ = playback.send(PlaybackItem {
                        generation: self.generation.load(Ordering::SeqCst),
                        audio: Audio::End,
                    });
                }
                ServerEvent::UserInterruption(_) => {
                    tracing::info!("user interrupted the assistant");
                    self.generation.fetch_add(1, Ordering::SeqCst);
                    self.sink.stop();
                }
                ServerEvent::ToolCall(call) => {
                    tools::answer(socket, self.tools.as_deref(), &call).await?;
                }
                ServerEvent::ToolResponse(response) => {
                    tracing::debug!("tool response for {}", response.tool_call_id());
                }
                ServerEvent::ToolError(error) => {
                    tracing::debug!("tool error for {}: {}", error.tool_call_id(), error.error());
                }
                ServerEvent::Error(error) => {
                    tracing::error!("server error {} ({}): {}", error.code(), error.slug(), error.message());
                    return Err(error.into());
                }
                ServerEvent::Unknown => tracing::debug!("ignoring unknown message"),
            }
        }
    }

    async fn send_loop(&self, socket: &ChatSocket) -> Result<()> {
        tokio::select! {
            _ = self.cancel.cancelled() => Ok(()),
            result = self.sender.send(socket) => result,
        }
    }

    async fn playback_loop(&self, mut queue: mpsc::UnboundedReceiver<PlaybackItem>) -> Result<()> {
        let hooks: &dyn PlaybackHooks = self.sender.as_ref();
        let mut carry: Option<PlaybackItem> = None;
        // Generation whose remaining chunks are discarded up to its `End`.
        let mut skipping: Option<u64> = None;

        loop {
            let item = match carry.take() {
                Some(item) => item,
                None => tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    item = queue.recv() => match item {
                        Some(item) => item,
                        None => return Ok(()),
                    },
                },
            };

            if item.generation < self.generation.load(Ordering::SeqCst) {
                continue;
            }
            if skipping.is_some_and(|generation| generation != item.generation) {
                skipping = None;
            }
            let first = match item.audio {
                Audio::End => {
                    skipping = None;
                    continue;
                }
                Audio::Chunk(_) if skipping.is_some() => continue,
                Audio::Chunk(bytes) => bytes,
            };

            let generation = item.generation;
            let mut finished = false;
            let chunks = utterance(
                first,
                generation,
                self.utterance_gap,
                &mut queue,
                &mut carry,
                &self.generation,
                &mut finished,
            );
            let played = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                played = self.sink.play_stream(chunks, hooks) => played,
            };

            match played {
                Ok(()) => {}
                Err(Error::Codec(e)) => tracing::warn!("skipping utterance: {}", e),
                Err(e) => return Err(e),
            }
            if !finished {
                skipping = Some(generation);
            }
        }
    }
}

struct Utterance<'a> {
    first: Option<Bytes>,
    generation: u64,
    gap: Duration,
    queue: &'a mut mpsc::UnboundedReceiver<PlaybackItem>,
    carry: &'a mut Option<PlaybackItem>,
    current: &'a AtomicU64,
    finished: &'a mut bool,
}

/// Chunks of one utterance: `first`, then queued chunks of the same
/// generation up to its `End`, or until the queue stayed empty for `gap`.
/// Both set `finished`. An item of a newer generation ends the utterance
/// and is left in `carry`.
fn utterance<'a>(
    first: Bytes,
    generation: u64,
    gap: Duration,
    queue: &'a mut mpsc::UnboundedReceiver<PlaybackItem>,
    carry: &'a mut Option<PlaybackItem>,
    current: &'a AtomicU64,
    finished: &'a mut bool,
) -> BoxStream<'a, Bytes> {
    let state = Utterance {
        first: Some(first),
        generation,
        gap,
        queue,
        carry,
        current,
        finished,
    };
    futures::stream::unfold(state, |state| async move {
        let mut state = state;
        if let Some(first) = state.first.take() {
            return Some((first, state));
        }
        if *state.finished {
            return None;
        }
        loop {
            if state.current.load(Ordering::SeqCst) != state.generation {
                return None;
            }
            let item = match tokio::time::timeout(state.gap, state.queue.recv()).await {
                Ok(item) => item?,
                Err(_) => {
                    tracing::debug!("no audio for {:?}, utterance over", state.gap);
                    *state.finished = true;
                    return None;
                }
            };
            if item.generation != state.generation {
                *state.carry = Some(item);
                return None;
            }
            match item.audio {
                Audio::Chunk(bytes) => return Some((bytes, state)),
                Audio::End => {
                    *state.finished = true;
                    return None;
                }
            }
        }
    })
    .boxed()
}

fn render_user(message: &UserMessageEvent) {
    let content = message.message().content().unwrap_or_default();
    if message.interim() {
        tracing::debug!("user (interim): {}", content);
        return;
    }
    let emotions = message
        .models()
        .prosody()
        .map(|prosody| {
            prosody
                .scores()
                .top(3)
                .iter()
                .map(|(name, score)| format!("{} ({:.2})", name, score))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    if emotions.is_empty() {
        tracing::info!("user: {}", content);
    } else {
        tracing::info!("user: {} [{}]", content, emotions);
    }
}

fn render_assistant(message: &AssistantMessageEvent) {
    tracing::info!("assistant: {}", message.message().content().unwrap_or_default());
}
