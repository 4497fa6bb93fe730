//! One WebSocket connection carrying JSON text frames in both directions.
//!
//! A spawned I/O task owns the socket. Outbound frames reach it through a
//! bounded channel and are acknowledged once written; inbound frames are
//! parsed and queued in arrival order for whoever reads the session.
//!
//! The inbound queue ends in one of two ways: after an
//! [`Error::ConnectionClosed`] or [`Error::Connection`] item when the server
//! or the transport went away, or silently after a local [`Session::close`].

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::BoxStream;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::client::stats::Stats;
use crate::error::{Error, Result};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type Inbound<In> = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<In>>>>;

struct Outbound {
    message: Message,
    ack: oneshot::Sender<Result<()>>,
}

/// A duplex session sending `Out` frames and receiving `In` frames.
///
/// Clones share the same connection.
pub struct Session<Out, In> {
    outbound: mpsc::Sender<Outbound>,
    inbound: Inbound<In>,
    cancel: CancellationToken,
    io_task: Arc<Mutex<Option<JoinHandle<()>>>>,
    stats: Arc<Mutex<Stats>>,
    _frames: PhantomData<fn(Out)>,
}

impl<Out, In> Clone for Session<Out, In> {
    fn clone(&self) -> Self {
        Self {
            outbound: self.outbound.clone(),
            inbound: self.inbound.clone(),
            cancel: self.cancel.clone(),
            io_task: self.io_task.clone(),
            stats: self.stats.clone(),
            _frames: PhantomData,
        }
    }
}

impl<Out, In> Session<Out, In>
where
    Out: Serialize,
    In: DeserializeOwned + Send + 'static,
{
    /// Performs the handshake. A 401/403 answer is [`Error::Authentication`],
    /// any other failure [`Error::Connection`], and no answer within
    /// `timeout` is [`Error::Timeout`].
    pub async fn connect(request: Request, timeout: Duration, capacity: usize) -> Result<Self> {
        let uri = request.uri().to_string();
        let (ws_stream, _) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| Error::Timeout(timeout))?
            .map_err(Error::from_handshake)?;
        tracing::info!("connected to {}", uri);
        Ok(Self::from_stream(ws_stream, capacity))
    }

    /// Wraps an already established WebSocket.
    pub fn from_stream<S>(ws_stream: WebSocketStream<S>, capacity: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let stats = Arc::new(Mutex::new(Stats::new()));

        let io_task = tokio::spawn(run_io(
            ws_stream,
            outbound_rx,
            inbound_tx,
            cancel.clone(),
            stats.clone(),
        ));

        Self {
            outbound: outbound_tx,
            inbound: Arc::new(tokio::sync::Mutex::new(inbound_rx)),
            cancel,
            io_task: Arc::new(Mutex::new(Some(io_task))),
            stats,
            _frames: PhantomData,
        }
    }

    /// Serializes and writes one frame, returning once it is on the socket.
    pub async fn send(&self, frame: &Out) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        let (ack, written) = oneshot::channel();
        self.outbound
            .send(Outbound {
                message: Message::Text(text),
                ack,
            })
            .await
            .map_err(|_| Error::Closed)?;
        written.await.map_err(|_| Error::Closed)?
    }

    /// Sends `frame` and returns the next inbound frame as its reply.
    ///
    /// Replies are paired by position, so at most one request may be
    /// pending and nothing else may consume the inbound queue meanwhile.
    pub async fn request(&self, frame: &Out) -> Result<In> {
        let mut inbound = self.inbound.lock().await;
        self.send(frame).await?;
        match inbound.recv().await {
            Some(reply) => reply,
            None => Err(Error::Closed),
        }
    }

    /// The next inbound frame, or `None` once the session is closed.
    pub async fn recv(&self) -> Option<Result<In>> {
        self.inbound.lock().await.recv().await
    }

    /// Every inbound frame in arrival order. Single pass: frames taken by
    /// one consumer are not seen by another.
    pub fn events(&self) -> BoxStream<'static, Result<In>> {
        futures::stream::unfold(self.inbound.clone(), |inbound| async move {
            let next = inbound.lock().await.recv().await;
            next.map(|frame| (frame, inbound))
        })
        .boxed()
    }

    /// Closes the connection and waits for the I/O task. Safe to call more
    /// than once; pending readers see the end of the inbound queue.
    pub async fn close(&self) {
        self.cancel.cancel();
        let io_task = match self.io_task.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(io_task) = io_task {
            if let Err(e) = io_task.await {
                tracing::error!("session task failed: {}", e);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.outbound.is_closed()
    }

    pub fn stats(&self) -> Result<Stats> {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .map_err(|_| Error::Connection("session stats poisoned".to_string()))
    }

    pub(crate) fn record(&self, update: impl FnOnce(&mut Stats)) {
        if let Ok(mut stats) = self.stats.lock() {
            update(&mut stats);
        } else {
            tracing::error!("failed to update stats");
        }
    }
}

async fn run_io<S, In>(
    ws_stream: WebSocketStream<S>,
    mut outbound: mpsc::Receiver<Outbound>,
    inbound: mpsc::UnboundedSender<Result<In>>,
    cancel: CancellationToken,
    stats: Arc<Mutex<Stats>>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    In: DeserializeOwned + Send + 'static,
{
    let (mut write, mut read) = ws_stream.split();
    let mut open = true;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            frame = outbound.recv() => {
                let Some(Outbound { message, ack }) = frame else {
                    // Every session handle is gone.
                    break;
                };
                let len = message.len();
                match write.send(message).await {
                    Ok(()) => {
                        if let Ok(mut stats) = stats.lock() {
                            stats.update_sent(len);
                        }
                        let _ = ack.send(Ok(()));
                    }
                    Err(e) => {
                        tracing::error!("failed to send message: {}", e);
                        let _ = ack.send(Err(Error::Connection(e.to_string())));
                        let _ = inbound.send(Err(Error::Connection(e.to_string())));
                        open = false;
                        break;
                    }
                }
            }

            message = read.next() => {
                let message = match message {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = inbound.send(Err(Error::Connection(e.to_string())));
                        open = false;
                        break;
                    }
                    None => {
                        tracing::error!("connection dropped without close frame");
                        let _ = inbound.send(Err(Error::Connection("connection dropped".to_string())));
                        open = false;
                        break;
                    }
                };
                match message {
                    Message::Text(text) => {
                        if let Ok(mut stats) = stats.lock() {
                            stats.update_received(text.len());
                        }
                        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
                            let frame_type = json.get("type").and_then(|v| v.as_str());
                            tracing::debug!("received message: {}", frame_type.unwrap_or("untyped"));
                        }
                        let frame = serde_json::from_str::<In>(&text).map_err(|e| {
                            tracing::error!("failed to deserialize frame: {}, text=> {:?}", e, text);
                            Error::Serialization(e)
                        });
                        if inbound.send(frame).is_err() {
                            tracing::debug!("inbound frame dropped, no reader left");
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(frame) => {
                        tracing::info!("connection closed: {:?}", frame);
                        let (code, reason) = match frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            None => (u16::from(CloseCode::Status), String::new()),
                        };
                        let _ = inbound.send(Err(Error::ConnectionClosed { code, reason }));
                        open = false;
                        break;
                    }
                    // Pongs are queued by tungstenite and flushed on the next read.
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                }
            }
        }
    }

    drop(inbound);
    outbound.close();
    while let Ok(Outbound { ack, .. }) = outbound.try_recv() {
        let _ = ack.send(Err(Error::Closed));
    }

    if open {
        match tokio::time::timeout(CLOSE_TIMEOUT, write.send(Message::Close(None))).await {
            Ok(Ok(())) => tracing::info!("connection closed"),
            Ok(Err(e)) => tracing::debug!("close frame not sent: {}", e),
            Err(_) => tracing::debug!("close frame timed out"),
        }
    }
}
