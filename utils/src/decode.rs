//! Turns the fragments of one utterance into interleaved f32 samples.
//!
//! The container is sniffed from the first fragment. WAV fragments after the
//! first carry a redundant header that is stripped; headerless PCM uses the
//! configured format; MP3 is piped through an `ffmpeg` child process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use bytes::Bytes;
use hume_realtime_types::audio::{strip_wav_header, Container, WavHeader, WAV_HEADER_LEN};
use hume_realtime_types::CodecError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;

use crate::audio;
use crate::speaker::PlaybackError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels }
    }
}

/// Where to find the MP3 decoder and what to ask it for.
#[derive(Debug, Clone)]
pub struct DecoderOptions {
    /// Format assumed for headerless PCM
    pub raw_format: PcmFormat,
    /// Format `ffmpeg` is asked to produce for MP3 input
    pub mp3_output: PcmFormat,
    pub ffmpeg: PathBuf,
}

pub struct FragmentDecoder {
    kind: Kind,
    format: PcmFormat,
    carry: Option<u8>,
}

enum Kind {
    Pcm,
    Wav,
    Mp3(Ffmpeg),
}

impl FragmentDecoder {
    /// Picks the decoder for an utterance from its first fragment.
    pub async fn open(first: &[u8], options: &DecoderOptions) -> Result<Self, PlaybackError> {
        let container = Container::sniff(first);
        tracing::debug!("playback container: {:?}", container);
        let (kind, format) = match container {
            Container::Wav => {
                let header = WavHeader::parse(first)?;
                if header.bits_per_sample() != 16 {
                    return Err(CodecError::UnsupportedFormat(format!(
                        "{}-bit WAV, expected 16-bit PCM",
                        header.bits_per_sample()
                    ))
                    .into());
                }
                (Kind::Wav, PcmFormat::new(header.sample_rate(), header.channels()))
            }
            Container::Pcm => (Kind::Pcm, options.raw_format),
            Container::Mp3 => (
                Kind::Mp3(Ffmpeg::spawn(&options.ffmpeg, options.mp3_output).await?),
                options.mp3_output,
            ),
        };
        Ok(Self {
            kind,
            format,
            carry: None,
        })
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Decodes one fragment. `first` marks the fragment passed to [`FragmentDecoder::open`].
    pub async fn push(&mut self, fragment: &[u8], first: bool) -> Result<Vec<f32>, PlaybackError> {
        if let Kind::Mp3(ffmpeg) = &mut self.kind {
            let pcm = ffmpeg.write(fragment).await?;
            return Ok(self.samples(&pcm));
        }
        let body = match self.kind {
            Kind::Wav if first => &fragment[WAV_HEADER_LEN.min(fragment.len())..],
            Kind::Wav => strip_wav_header(fragment),
            _ => fragment,
        };
        Ok(self.samples(body))
    }

    /// Flushes whatever the decoder still holds after the last fragment.
    pub async fn finish(&mut self) -> Result<Vec<f32>, PlaybackError> {
        if let Kind::Mp3(ffmpeg) = &mut self.kind {
            let pcm = ffmpeg.finish().await?;
            return Ok(self.samples(&pcm));
        }
        Ok(Vec::new())
    }

    fn samples(&mut self, bytes: &[u8]) -> Vec<f32> {
        let mut joined;
        let mut bytes = bytes;
        if let Some(byte) = self.carry.take() {
            joined = Vec::with_capacity(bytes.len() + 1);
            joined.push(byte);
            joined.extend_from_slice(bytes);
            bytes = &joined;
        }
        if bytes.len() % 2 == 1 {
            self.carry = bytes.last().copied();
        }
        audio::pcm16_to_f32(bytes)
    }
}

struct Ffmpeg {
    child: Child,
    stdin: Option<ChildStdin>,
    output: mpsc::UnboundedReceiver<std::io::Result<Bytes>>,
}

impl Ffmpeg {
    async fn spawn(path: &Path, output: PcmFormat) -> Result<Self, PlaybackError> {
        let mut child = Command::new(path)
            .args(["-hide_banner", "-loglevel", "error", "-f", "mp3", "-i", "pipe:0"])
            .args(["-f", "s16le", "-acodec", "pcm_s16le"])
            .arg("-ac")
            .arg(output.channels.to_string())
            .arg("-ar")
            .arg(output.sample_rate.to_string())
            .arg("pipe:1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PlaybackError::Codec(CodecError::DecoderUnavailable(format!(
                    "{} not found; install ffmpeg to play MP3 audio",
                    path.display()
                ))),
                _ => PlaybackError::Io(e),
            })?;

        let stdin = child.stdin.take();
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| CodecError::DecoderUnavailable("ffmpeg stdout unavailable".to_string()))?;

        // Read concurrently so ffmpeg never stalls on a full stdout pipe.
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            output: rx,
        })
    }

    async fn write(&mut self, data: &[u8]) -> Result<Vec<u8>, PlaybackError> {
        if let Some(stdin) = self.stdin.as_mut() {
            stdin.write_all(data).await?;
        }
        let mut pcm = Vec::new();
        while let Ok(chunk) = self.output.try_recv() {
            pcm.extend_from_slice(&chunk?);
        }
        Ok(pcm)
    }

    async fn finish(&mut self) -> Result<Vec<u8>, PlaybackError> {
        // Closing stdin lets ffmpeg flush and exit.
        drop(self.stdin.take());
        let mut pcm = Vec::new();
        while let Some(chunk) = self.output.recv().await {
            pcm.extend_from_slice(&chunk?);
        }
        let status = self.child.wait().await?;
        if !status.success() {
            return Err(CodecError::UnsupportedFormat(format!("ffmpeg failed to decode MP3 ({})", status)).into());
        }
        Ok(pcm)
    }
}
