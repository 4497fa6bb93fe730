mod consts;
mod container;
mod wav;

use base64::Engine;

pub use consts::*;
pub use container::Container;
pub use wav::{decode_wav_header, strip_wav_header, WavHeader, WAV_HEADER_LEN};

use crate::events::client::AudioInput;
use crate::events::ClientEvent;

/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

/// Faults raised while converting media bytes to and from their wire shape.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed audio header: {0}")]
    MalformedAudioHeader(String),

    #[error("audio decoder unavailable: {0}")]
    DecoderUnavailable(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

pub fn encode_base64(bytes: &[u8]) -> Base64EncodedAudioBytes {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_base64(data: &str) -> Result<Vec<u8>, CodecError> {
    Ok(base64::engine::general_purpose::STANDARD.decode(data)?)
}

/// Wraps a captured chunk in the EVI `audio_input` envelope.
pub fn encode_audio_chunk(bytes: &[u8]) -> ClientEvent {
    ClientEvent::AudioInput(AudioInput::from_bytes(bytes))
}
