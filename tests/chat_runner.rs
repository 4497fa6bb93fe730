mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use common::{next_of_type, send_json, wav_bytes, MockServer};
use futures::channel::mpsc as futures_mpsc;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use hume_realtime::chat::{AudioSink, ChatState, MicrophoneSender, PlaybackHooks, ToolHandler};
use hume_realtime::types::audio::encode_base64;
use hume_realtime::types::events::client::AudioSettings;
use hume_realtime::types::tools::ToolCallMessage;
use hume_realtime::{ChatConnectOptions, ChatRunner, Error};
use serde_json::json;
use tokio::sync::Notify;

#[derive(Default)]
struct RecordingSink {
    begins: AtomicUsize,
    ends: AtomicUsize,
    stops: AtomicUsize,
    utterances: Mutex<Vec<Vec<Bytes>>>,
    ended: Notify,
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play_stream(&self, mut chunks: BoxStream<'_, Bytes>, hooks: &dyn PlaybackHooks) -> hume_realtime::Result<()> {
        let mut played = Vec::new();
        while let Some(chunk) = chunks.next().await {
            if played.is_empty() {
                hooks.on_audio_begin();
                self.begins.fetch_add(1, Ordering::SeqCst);
            }
            played.push(chunk);
        }
        if !played.is_empty() {
            hooks.on_audio_end();
            self.ends.fetch_add(1, Ordering::SeqCst);
            self.utterances.lock().unwrap().push(played);
            self.ended.notify_one();
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

type Mic = MicrophoneSender<futures_mpsc::UnboundedReceiver<Bytes>>;

/// A 1 channel, 16 kHz capture source fed by the test.
fn microphone() -> (futures_mpsc::UnboundedSender<Bytes>, Arc<Mic>) {
    let (tx, rx) = futures_mpsc::unbounded();
    let sender = MicrophoneSender::new(rx, AudioSettings::linear16(16000, 1));
    (tx, Arc::new(sender))
}

#[tokio::test]
async fn plays_audio_output_and_reopens_the_microphone() {
    common::init_tracing();
    let wav = wav_bytes(&[0, 1000, -1000, 0], 24000);
    let payload = encode_base64(&wav);

    let server = MockServer::start(move |mut ws| async move {
        let settings = next_of_type(&mut ws, "session_settings").await.unwrap();
        assert_eq!(settings["audio"]["encoding"], "linear16");
        assert_eq!(settings["audio"]["sample_rate"], 16000);
        assert_eq!(settings["audio"]["channels"], 1);

        send_json(&mut ws, json!({"type": "chat_metadata", "chat_id": "c1", "chat_group_id": "g1"})).await;
        send_json(&mut ws, json!({"type": "assistant_message", "message": {"role": "assistant", "content": "Hi!"}})).await;
        send_json(&mut ws, json!({"type": "audio_output", "id": "a1", "index": 0, "data": payload})).await;
        send_json(&mut ws, json!({"type": "assistant_end"})).await;
        common::drain(&mut ws).await;
    })
    .await;

    let (_mic_tx, sender) = microphone();
    let sink = Arc::new(RecordingSink::default());
    let runner = ChatRunner::from_arcs(sender.clone(), sink.clone());
    let mut handle = runner.handle();
    assert_eq!(handle.state(), ChatState::Connecting);

    let client = server.client();
    let run = tokio::spawn(async move { runner.run(client.chat(), &ChatConnectOptions::new()).await });

    tokio::time::timeout(Duration::from_secs(5), sink.ended.notified())
        .await
        .unwrap();
    assert_eq!(handle.state(), ChatState::Active);
    assert_eq!(sink.begins.load(Ordering::SeqCst), 1);
    assert_eq!(sink.ends.load(Ordering::SeqCst), 1);
    assert!(sender.state().is_open());
    assert_eq!(sink.utterances.lock().unwrap()[0], vec![Bytes::from(wav)]);

    handle.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert!(result.is_ok(), "{:?}", result);
    handle.closed().await;
    assert_eq!(handle.state(), ChatState::Closed);
}

#[tokio::test]
async fn lone_audio_output_ends_without_assistant_end() {
    let wav = wav_bytes(&[0, 500, -500, 0], 16000);
    let payload = encode_base64(&wav);

    let server = MockServer::start(move |mut ws| async move {
        next_of_type(&mut ws, "session_settings").await.unwrap();
        send_json(&mut ws, json!({"type": "audio_output", "id": "a1", "index": 0, "data": payload})).await;
        common::drain(&mut ws).await;
    })
    .await;

    let (_mic_tx, sender) = microphone();
    let sink = Arc::new(RecordingSink::default());
    let runner = ChatRunner::from_arcs(sender.clone(), sink.clone());
    let handle = runner.handle();
    let client = server.client();
    let run = tokio::spawn(async move { runner.run(client.chat(), &ChatConnectOptions::new()).await });

    tokio::time::timeout(Duration::from_secs(3), sink.ended.notified())
        .await
        .unwrap();
    assert_eq!(sink.begins.load(Ordering::SeqCst), 1);
    assert_eq!(sink.ends.load(Ordering::SeqCst), 1);
    assert!(sender.state().is_open());
    assert_eq!(sink.utterances.lock().unwrap()[0], vec![Bytes::from(wav)]);

    handle.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert!(result.is_ok(), "{:?}", result);
}

#[tokio::test]
async fn microphone_audio_is_forwarded_while_assistant_is_silent() {
    let server = MockServer::start(|mut ws| async move {
        next_of_type(&mut ws, "session_settings").await.unwrap();
        let audio = next_of_type(&mut ws, "audio_input").await.unwrap();
        assert_eq!(audio["data"], encode_base64(&[7, 0, 8, 0]));
        send_json(&mut ws, json!({"type": "error", "code": "E0000", "slug": "done", "message": "test over"})).await;
        common::drain(&mut ws).await;
    })
    .await;

    let (mic_tx, sender) = microphone();
    mic_tx.unbounded_send(Bytes::from_static(&[7, 0, 8, 0])).unwrap();
    let runner = ChatRunner::from_arcs(sender.clone(), Arc::new(RecordingSink::default()));

    let client = server.client();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(client.chat(), &ChatConnectOptions::new()),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(Error::Protocol { .. })));
    assert_eq!(sender.dropped(), 0);
    server.task.await.unwrap();
}

#[tokio::test]
async fn error_event_ends_every_loop() {
    let server = MockServer::start(|mut ws| async move {
        next_of_type(&mut ws, "session_settings").await.unwrap();
        send_json(
            &mut ws,
            json!({"type": "error", "code": "E0718", "slug": "quota_exceeded", "message": "out of credits"}),
        )
        .await;
        common::drain(&mut ws).await;
    })
    .await;

    // The microphone never ends on its own; only the error can stop the run.
    let (_mic_tx, sender) = microphone();
    let sink = Arc::new(RecordingSink::default());
    let runner = ChatRunner::from_arcs(sender, sink.clone());
    let handle = runner.handle();

    let client = server.client();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(client.chat(), &ChatConnectOptions::new()),
    )
    .await
    .expect("runner hung after error event");

    match result {
        Err(Error::Protocol { code, slug, message }) => {
            assert_eq!(code, "E0718");
            assert_eq!(slug, "quota_exceeded");
            assert_eq!(message, "out of credits");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(handle.state(), ChatState::Closed);
    assert!(sink.stops.load(Ordering::SeqCst) >= 1);
    server.task.await.unwrap();
}

#[tokio::test]
async fn tool_call_without_handler_gets_fallback_only_when_required() {
    let server = MockServer::start(|mut ws| async move {
        next_of_type(&mut ws, "session_settings").await.unwrap();
        send_json(
            &mut ws,
            json!({"type": "tool_call", "name": "lookup", "parameters": "{}", "tool_call_id": "optional", "response_required": false}),
        )
        .await;
        send_json(
            &mut ws,
            json!({"type": "tool_call", "name": "weather", "parameters": "{}", "tool_call_id": "required", "response_required": true}),
        )
        .await;

        let reply = next_of_type(&mut ws, "tool_error").await.unwrap();
        assert_eq!(reply["tool_call_id"], "required");
        send_json(&mut ws, json!({"type": "error", "code": "E0000", "slug": "done", "message": "test over"})).await;
        common::drain(&mut ws).await;
    })
    .await;

    let (_mic_tx, sender) = microphone();
    let runner = ChatRunner::from_arcs(sender, Arc::new(RecordingSink::default()));
    let client = server.client();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(client.chat(), &ChatConnectOptions::new()),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(Error::Protocol { ref slug, .. }) if slug == "done"));
    server.task.await.unwrap();
}

struct Weather;

#[async_trait]
impl ToolHandler for Weather {
    async fn call(&self, call: &ToolCallMessage) -> Result<String, String> {
        let params = call.parameters_json().map_err(|e| e.to_string())?;
        match params["city"].as_str() {
            Some(city) => Ok(json!({"city": city, "forecast": "sunny"}).to_string()),
            None => Err("missing city".to_string()),
        }
    }
}

#[tokio::test]
async fn tool_handler_answers_calls() {
    let server = MockServer::start(|mut ws| async move {
        next_of_type(&mut ws, "session_settings").await.unwrap();
        send_json(
            &mut ws,
            json!({"type": "tool_call", "name": "weather", "parameters": "{\"city\":\"Oslo\"}", "tool_call_id": "t1", "response_required": true}),
        )
        .await;
        let response = next_of_type(&mut ws, "tool_response").await.unwrap();
        assert_eq!(response["tool_call_id"], "t1");
        assert!(response["content"].as_str().unwrap().contains("sunny"));

        send_json(
            &mut ws,
            json!({"type": "tool_call", "name": "weather", "parameters": "{}", "tool_call_id": "t2", "response_required": true}),
        )
        .await;
        let error = next_of_type(&mut ws, "tool_error").await.unwrap();
        assert_eq!(error["tool_call_id"], "t2");
        assert_eq!(error["error"], "missing city");
        send_json(&mut ws, json!({"type": "error", "code": "E0000", "slug": "done", "message": "test over"})).await;
        common::drain(&mut ws).await;
    })
    .await;

    let (_mic_tx, sender) = microphone();
    let runner = ChatRunner::from_arcs(sender, Arc::new(RecordingSink::default())).with_tool_handler(Arc::new(Weather));
    let client = server.client();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(client.chat(), &ChatConnectOptions::new()),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(Error::Protocol { .. })));
    server.task.await.unwrap();
}

#[tokio::test]
async fn interruption_stops_the_sink_and_later_audio_still_plays() {
    let first = wav_bytes(&[1, 2, 3], 24000);
    let second = wav_bytes(&[4, 5, 6], 24000);
    let (first_b64, second_b64) = (encode_base64(&first), encode_base64(&second));

    let server = MockServer::start(move |mut ws| async move {
        next_of_type(&mut ws, "session_settings").await.unwrap();
        send_json(&mut ws, json!({"type": "audio_output", "id": "a1", "data": first_b64})).await;
        send_json(&mut ws, json!({"type": "user_interruption", "time": 10})).await;
        send_json(&mut ws, json!({"type": "audio_output", "id": "a2", "data": second_b64})).await;
        send_json(&mut ws, json!({"type": "assistant_end"})).await;
        common::drain(&mut ws).await;
    })
    .await;

    let (_mic_tx, sender) = microphone();
    let sink = Arc::new(RecordingSink::default());
    let runner = ChatRunner::from_arcs(sender.clone(), sink.clone());
    let handle = runner.handle();
    let client = server.client();
    let run = tokio::spawn(async move { runner.run(client.chat(), &ChatConnectOptions::new()).await });

    let second = Bytes::from(second);
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let played_second = sink
                .utterances
                .lock()
                .unwrap()
                .iter()
                .any(|utterance| utterance.contains(&second));
            if played_second {
                break;
            }
            sink.ended.notified().await;
        }
    })
    .await
    .unwrap();

    assert!(sink.stops.load(Ordering::SeqCst) >= 1);
    assert_eq!(sink.begins.load(Ordering::SeqCst), sink.ends.load(Ordering::SeqCst));
    assert!(sender.state().is_open());

    handle.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap().unwrap();
    assert!(result.is_ok());
}
