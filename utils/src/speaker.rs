//! Speaker playback of one utterance at a time.
//!
//! [`Speaker::play`] decodes the fragments of an utterance, resamples them to
//! the output device rate and feeds a ring buffer drained by the cpal output
//! callback. The output stream lives on its own thread for the duration of
//! one `play` call, so the device is held only while something is playing.
//!
//! [`Speaker::stop`] can be called from any task: the output callback goes
//! silent on its next invocation and the running `play` returns.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Sample, SampleFormat, StreamConfig};
use futures::{Stream, StreamExt};
use hume_realtime_types::audio::{EVI_DEFAULT_CHANNELS, EVI_DEFAULT_SAMPLE_RATE};
use hume_realtime_types::CodecError;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd};
use rubato::{FastFixedIn, Resampler};
use tokio::sync::{oneshot, watch};

use crate::audio;
use crate::decode::{DecoderOptions, FragmentDecoder, PcmFormat};
use crate::device::{resolve_output, CpalCatalog, DeviceError, DeviceSelector};

const DEFAULT_LATENCY_MS: u32 = 1000;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("output stream failed: {0}")]
    Stream(String),

    #[error("resampler failed: {0}")]
    Resample(String),

    #[error("decoder i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct SpeakerConfig {
    device: DeviceSelector,
    raw_format: PcmFormat,
    latency_ms: u32,
    ffmpeg: PathBuf,
}

impl SpeakerConfig {
    pub fn new() -> Self {
        Self {
            device: DeviceSelector::Default,
            raw_format: PcmFormat::new(EVI_DEFAULT_SAMPLE_RATE, EVI_DEFAULT_CHANNELS),
            latency_ms: DEFAULT_LATENCY_MS,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }

    pub fn with_device(mut self, device: DeviceSelector) -> Self {
        self.device = device;
        self
    }

    /// Format of headerless PCM input
    pub fn with_raw_format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.raw_format = PcmFormat::new(sample_rate, channels);
        self
    }

    /// Size of the output ring buffer
    pub fn with_latency_ms(mut self, latency_ms: u32) -> Self {
        self.latency_ms = latency_ms.max(1);
        self
    }

    pub fn with_ffmpeg(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg = path.into();
        self
    }
}

impl Default for SpeakerConfig {
    fn default() -> Self {
        Self::new()
    }
}

struct Interrupt {
    epoch: AtomicU64,
    changed: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct Speaker {
    config: Arc<SpeakerConfig>,
    interrupt: Arc<Interrupt>,
}

impl Speaker {
    pub fn new(config: SpeakerConfig) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            config: Arc::new(config),
            interrupt: Arc::new(Interrupt {
                epoch: AtomicU64::new(0),
                changed,
            }),
        }
    }

    pub fn default_output() -> Self {
        Self::new(SpeakerConfig::new())
    }

    /// Halts the current playback. A no-op when nothing is playing.
    pub fn stop(&self) {
        let next = self.interrupt.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.interrupt.changed.send_replace(next);
    }

    /// Plays `chunks` as one continuous utterance.
    ///
    /// `on_begin` runs right before the first samples are handed to the
    /// device and `on_end` once playback finished, failed or was stopped;
    /// neither runs for an empty stream.
    pub async fn play<S, B, E>(&self, mut chunks: S, on_begin: B, on_end: E) -> Result<(), PlaybackError>
    where
        S: Stream<Item = Bytes> + Unpin,
        B: FnOnce(),
        E: FnOnce(),
    {
        let epoch = self.interrupt.epoch.load(Ordering::SeqCst);
        let mut interrupted = self.interrupt.changed.subscribe();
        if self.is_stopped(epoch) {
            return Ok(());
        }

        let first = tokio::select! {
            chunk = chunks.next() => chunk,
            _ = interrupted.changed() => return Ok(()),
        };
        let Some(first) = first else {
            return Ok(());
        };

        let output = OutputDevice::open(&self.config, epoch, self.interrupt.clone()).await?;
        let options = DecoderOptions {
            raw_format: self.config.raw_format,
            mp3_output: PcmFormat::new(output.sample_rate, 1),
            ffmpeg: self.config.ffmpeg.clone(),
        };
        let mut decoder = FragmentDecoder::open(&first, &options).await?;
        let conversion = Conversion::new(decoder.format(), output.sample_rate)?;

        let mut playback = Playback {
            output,
            conversion,
            epoch,
            interrupt: &self.interrupt,
            hooks: Hooks::new(on_begin, on_end),
        };

        let samples = decoder.push(&first, true).await?;
        if !playback.write(samples).await? {
            return Ok(());
        }

        loop {
            let next = tokio::select! {
                chunk = chunks.next() => chunk,
                _ = interrupted.changed() => return Ok(()),
            };
            let Some(chunk) = next else {
                break;
            };
            let samples = decoder.push(&chunk, false).await?;
            if !playback.write(samples).await? {
                return Ok(());
            }
        }

        let samples = decoder.finish().await?;
        if !playback.write(samples).await? {
            return Ok(());
        }
        playback.drain().await
    }

    fn is_stopped(&self, epoch: u64) -> bool {
        self.interrupt.epoch.load(Ordering::SeqCst) != epoch
    }
}

/// Runs `on_end` when dropped, provided `on_begin` ran.
struct Hooks<B: FnOnce(), E: FnOnce()> {
    begin: Option<B>,
    end: Option<E>,
    begun: bool,
}

impl<B: FnOnce(), E: FnOnce()> Hooks<B, E> {
    fn new(begin: B, end: E) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
            begun: false,
        }
    }

    fn begin(&mut self) {
        if let Some(begin) = self.begin.take() {
            begin();
            self.begun = true;
        }
    }
}

impl<B: FnOnce(), E: FnOnce()> Drop for Hooks<B, E> {
    fn drop(&mut self) {
        if self.begun {
            if let Some(end) = self.end.take() {
                end();
            }
        }
    }
}

struct Playback<'a, B: FnOnce(), E: FnOnce()> {
    output: OutputDevice,
    conversion: Conversion,
    epoch: u64,
    interrupt: &'a Interrupt,
    hooks: Hooks<B, E>,
}

impl<B: FnOnce(), E: FnOnce()> Playback<'_, B, E> {
    fn is_stopped(&self) -> bool {
        self.interrupt.epoch.load(Ordering::SeqCst) != self.epoch
    }

    /// Converts and enqueues decoded samples. Returns false once stopped.
    async fn write(&mut self, samples: Vec<f32>) -> Result<bool, PlaybackError> {
        let samples = self.conversion.process(&samples)?;
        self.enqueue(&samples).await
    }

    async fn enqueue(&mut self, samples: &[f32]) -> Result<bool, PlaybackError> {
        if samples.is_empty() {
            return Ok(!self.is_stopped());
        }
        self.hooks.begin();
        let mut offset = 0;
        while offset < samples.len() {
            if self.is_stopped() {
                return Ok(false);
            }
            let pushed = self.output.producer.push_slice(&samples[offset..]);
            offset += pushed;
            self.output.written += pushed as u64;
            if offset < samples.len() {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
        Ok(true)
    }

    /// Flushes the resampler and waits until the device consumed everything.
    async fn drain(mut self) -> Result<(), PlaybackError> {
        let tail = self.conversion.flush()?;
        if !self.enqueue(&tail).await? {
            return Ok(());
        }
        while self.output.played.load(Ordering::Relaxed) < self.output.written {
            if self.is_stopped() {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        tracing::debug!("playback drained");
        Ok(())
    }
}

/// Downmix to mono, then resample to the device rate when the rates differ.
struct Conversion {
    channels: usize,
    resampler: Option<FastFixedIn<f32>>,
    pending: Vec<f32>,
}

impl Conversion {
    fn new(source: PcmFormat, device_rate: u32) -> Result<Self, PlaybackError> {
        let resampler = if source.sample_rate == device_rate {
            None
        } else {
            let resampler = audio::create_resampler(
                source.sample_rate as f64,
                device_rate as f64,
                audio::RESAMPLER_CHUNK_SIZE,
            )
            .map_err(|e| PlaybackError::Resample(e.to_string()))?;
            Some(resampler)
        };
        Ok(Self {
            channels: source.channels.max(1) as usize,
            resampler,
            pending: Vec::new(),
        })
    }

    fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, PlaybackError> {
        let mono = audio::downmix(samples, self.channels);
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(mono);
        };
        self.pending.extend_from_slice(&mono);
        let mut out = Vec::new();
        while self.pending.len() >= resampler.input_frames_next() {
            let chunk: Vec<f32> = self.pending.drain(..resampler.input_frames_next()).collect();
            let resampled = resampler
                .process(&[chunk.as_slice()], None)
                .map_err(|e| PlaybackError::Resample(e.to_string()))?;
            if let Some(resampled) = resampled.first() {
                out.extend_from_slice(resampled);
            }
        }
        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<f32>, PlaybackError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for chunk in audio::split_for_chunks(&self.pending, resampler.input_frames_next()) {
            let resampled = resampler
                .process(&[chunk.as_slice()], None)
                .map_err(|e| PlaybackError::Resample(e.to_string()))?;
            if let Some(resampled) = resampled.first() {
                out.extend_from_slice(resampled);
            }
        }
        self.pending.clear();
        Ok(out)
    }
}

/// An open output stream, owned by a playback thread until this is dropped.
struct OutputDevice {
    producer: HeapProd<f32>,
    sample_rate: u32,
    /// Samples pushed to the ring buffer
    written: u64,
    /// Samples the output callback took from the ring buffer
    played: Arc<AtomicU64>,
    _shutdown: std_mpsc::Sender<()>,
}

impl OutputDevice {
    async fn open(config: &SpeakerConfig, epoch: u64, interrupt: Arc<Interrupt>) -> Result<Self, PlaybackError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();
        let selector = config.device;
        let latency_ms = config.latency_ms;

        std::thread::Builder::new()
            .name("hume-playback".to_string())
            .spawn(move || match start_playback(selector, latency_ms, epoch, interrupt) {
                Ok((stream, output)) => {
                    if ready_tx.send(Ok(output)).is_err() {
                        return;
                    }
                    // Blocks until the OutputDevice is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    tracing::debug!("output stream released");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        let (producer, sample_rate, played) = ready_rx
            .await
            .map_err(|_| PlaybackError::Stream("playback thread exited".to_string()))??;
        Ok(Self {
            producer,
            sample_rate,
            written: 0,
            played,
            _shutdown: shutdown_tx,
        })
    }
}

fn start_playback(
    selector: DeviceSelector,
    latency_ms: u32,
    epoch: u64,
    interrupt: Arc<Interrupt>,
) -> Result<(cpal::Stream, (HeapProd<f32>, u32, Arc<AtomicU64>)), PlaybackError> {
    let catalog = CpalCatalog::new();
    let info = resolve_output(&catalog, selector)?;
    let device = catalog.device(&info)?;
    tracing::info!("output device: {}", info.name);

    let supported = device
        .default_output_config()
        .map_err(|e| DeviceError::Backend(e.to_string()))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();
    let sample_rate = config.sample_rate.0;

    let capacity = (sample_rate as usize * latency_ms as usize / 1000).max(audio::RESAMPLER_CHUNK_SIZE);
    let (producer, consumer) = audio::shared_buffer(capacity).split();
    let played = Arc::new(AtomicU64::new(0));
    let tap = Tap {
        consumer,
        played: played.clone(),
        epoch,
        interrupt,
    };

    let stream = match sample_format {
        SampleFormat::F32 => build_output::<f32>(&device, &config, tap),
        SampleFormat::I16 => build_output::<i16>(&device, &config, tap),
        SampleFormat::U16 => build_output::<u16>(&device, &config, tap),
        other => Err(DeviceError::UnsupportedSampleFormat(format!("{:?}", other)).into()),
    }?;
    stream.play().map_err(|e| PlaybackError::Stream(e.to_string()))?;
    Ok((stream, (producer, sample_rate, played)))
}

/// The callback side of the ring buffer.
struct Tap {
    consumer: HeapCons<f32>,
    played: Arc<AtomicU64>,
    epoch: u64,
    interrupt: Arc<Interrupt>,
}

fn build_output<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut tap: Tap,
) -> Result<cpal::Stream, PlaybackError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if tap.interrupt.epoch.load(Ordering::Relaxed) != tap.epoch {
                    tap.consumer.clear();
                    data.fill(T::EQUILIBRIUM);
                    return;
                }
                let mut popped = 0;
                // The mono signal goes to every channel of the frame.
                for frame in data.chunks_mut(channels) {
                    let sample = match tap.consumer.try_pop() {
                        Some(sample) => {
                            popped += 1;
                            sample
                        }
                        None => 0.0,
                    };
                    frame.fill(T::from_sample(sample));
                }
                tap.played.fetch_add(popped, Ordering::Relaxed);
            },
            |err| tracing::error!("an error occurred on output stream: {}", err),
            None,
        )
        .map_err(|e| PlaybackError::Stream(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn hooks_end_only_after_begin() {
        let begins = AtomicUsize::new(0);
        let ends = AtomicUsize::new(0);
        {
            let _hooks = Hooks::new(|| { begins.fetch_add(1, Ordering::SeqCst); }, || { ends.fetch_add(1, Ordering::SeqCst); });
        }
        assert_eq!(ends.load(Ordering::SeqCst), 0);
        {
            let mut hooks = Hooks::new(|| { begins.fetch_add(1, Ordering::SeqCst); }, || { ends.fetch_add(1, Ordering::SeqCst); });
            hooks.begin();
            hooks.begin();
        }
        assert_eq!(begins.load(Ordering::SeqCst), 1);
        assert_eq!(ends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn conversion_passes_matching_rate_through() {
        let mut conversion = Conversion::new(PcmFormat::new(48000, 2), 48000).unwrap();
        assert_eq!(conversion.process(&[1.0, 0.0, 0.5, 0.5]).unwrap(), vec![0.5, 0.5]);
        assert!(conversion.flush().unwrap().is_empty());
    }

    #[test]
    fn conversion_resamples_and_flushes_remainder() {
        let mut conversion = Conversion::new(PcmFormat::new(24000, 1), 48000).unwrap();
        let first = conversion.process(&vec![0.0; 1500]).unwrap();
        assert!(!first.is_empty());
        assert!(!conversion.pending.is_empty());
        let tail = conversion.flush().unwrap();
        assert!(!tail.is_empty());
        assert!(conversion.pending.is_empty());
    }

    #[tokio::test]
    async fn empty_stream_plays_nothing() {
        let speaker = Speaker::default_output();
        let mut began = false;
        let mut ended = false;
        speaker
            .play(futures::stream::empty(), || began = true, || ended = true)
            .await
            .unwrap();
        assert!(!began);
        assert!(!ended);
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_noop() {
        let speaker = Speaker::default_output();
        speaker.stop();
        speaker.stop();
        let mut began = false;
        speaker
            .play(futures::stream::empty(), || began = true, || {})
            .await
            .unwrap();
        assert!(!began);
    }
}
