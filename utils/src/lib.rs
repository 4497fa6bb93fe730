pub mod audio;
pub mod decode;
pub mod device;
pub mod microphone;
pub mod queue;
pub mod speaker;

pub use device::{DeviceError, DeviceInfo, DeviceSelector};
pub use microphone::{Microphone, MicrophoneConfig};
pub use queue::{chunk_queue, ChunkProducer, ChunkStream};
pub use speaker::{PlaybackError, Speaker, SpeakerConfig};
