//! Microphone capture as an async stream of little-endian PCM16 chunks.
//!
//! The cpal input stream lives on a dedicated capture thread; its callback
//! converts every buffer to PCM16 and hands it to a [`ChunkProducer`].
//! Dropping the [`Microphone`] stops that thread, which releases the device
//! and closes the chunk queue.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use bytes::Bytes;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use hume_realtime_types::events::client::AudioSettings;

use crate::audio;
use crate::device::{resolve_input, CpalCatalog, DeviceCatalog, DeviceError, DeviceInfo, DeviceSelector};
use crate::queue::{chunk_queue, ChunkProducer, ChunkStream};

const DEFAULT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct MicrophoneConfig {
    device: DeviceSelector,
    queue_capacity: usize,
}

impl MicrophoneConfig {
    pub fn new() -> Self {
        Self {
            device: DeviceSelector::Default,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_device(mut self, device: DeviceSelector) -> Self {
        self.device = device;
        self
    }

    /// Number of captured buffers held before new ones are dropped
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn device(&self) -> DeviceSelector {
        self.device
    }
}

impl Default for MicrophoneConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Microphone {
    name: String,
    sample_rate: u32,
    channels: u16,
    chunks: Option<ChunkStream>,
    shutdown: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Microphone {
    pub fn open(config: MicrophoneConfig) -> Result<Self, DeviceError> {
        Self::open_in(&CpalCatalog::new(), config)
    }

    /// Resolves the configured device in `catalog` and starts capturing from
    /// it. Nothing is opened when resolution fails.
    pub fn open_in(catalog: &dyn DeviceCatalog, config: MicrophoneConfig) -> Result<Self, DeviceError> {
        let info = resolve_input(catalog, config.device)?;
        Self::start(info, config.queue_capacity)
    }

    fn start(info: DeviceInfo, queue_capacity: usize) -> Result<Self, DeviceError> {
        tracing::info!("input device: {}", info.name);

        let (producer, chunks) = chunk_queue(queue_capacity);
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let device_info = info.clone();
        let thread = std::thread::Builder::new()
            .name("hume-capture".to_string())
            .spawn(move || {
                let opened = CpalCatalog::new()
                    .device(&device_info)
                    .and_then(|device| start_capture(&device, producer));
                match opened {
                    Ok((stream, format)) => {
                        if ready_tx.send(Ok(format)).is_err() {
                            return;
                        }
                        // Blocks until the Microphone is dropped.
                        let _ = shutdown_rx.recv();
                        drop(stream);
                        tracing::debug!("capture stream released");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| DeviceError::Backend(e.to_string()))?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| DeviceError::Backend("capture thread exited".to_string()))??;

        tracing::info!("capturing {}ch at {}hz", channels, sample_rate);
        Ok(Self {
            name: info.name,
            sample_rate,
            channels,
            chunks: Some(chunks),
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn open_default() -> Result<Self, DeviceError> {
        Self::open(MicrophoneConfig::new())
    }

    /// The captured chunks. Can be taken once; the stream ends when the
    /// microphone is dropped.
    pub fn stream(&mut self) -> Option<ChunkStream> {
        self.chunks.take()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The wire format of the captured chunks.
    pub fn audio_settings(&self) -> AudioSettings {
        AudioSettings::linear16(self.sample_rate, self.channels)
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("capture thread panicked");
            }
        }
    }
}

fn start_capture(device: &cpal::Device, producer: ChunkProducer) -> Result<(cpal::Stream, (u32, u16)), DeviceError> {
    let supported = device
        .default_input_config()
        .map_err(|e| DeviceError::Backend(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    let error_fn = |err: cpal::StreamError| tracing::error!("an error occurred on input stream: {}", err);
    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| forward(&producer, audio::f32_to_pcm16(data)),
            error_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| forward(&producer, audio::i16_to_pcm16(data)),
            error_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| forward(&producer, audio::u16_to_pcm16(data)),
            error_fn,
            None,
        ),
        other => return Err(DeviceError::UnsupportedSampleFormat(format!("{:?}", other))),
    }
    .map_err(|e| DeviceError::Backend(e.to_string()))?;

    stream.play().map_err(|e| DeviceError::Backend(e.to_string()))?;
    Ok((stream, (config.sample_rate.0, config.channels)))
}

fn forward(producer: &ChunkProducer, pcm16: Vec<u8>) {
    if !producer.push(Bytes::from(pcm16)) {
        tracing::trace!("capture queue full, dropped chunk ({} total)", producer.dropped());
    }
}

/// Resolves and describes the device [`Microphone::open`] would use.
pub fn describe_input(selector: DeviceSelector) -> Result<DeviceInfo, DeviceError> {
    resolve_input(&CpalCatalog::new(), selector)
}
