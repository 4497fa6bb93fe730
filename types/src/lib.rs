pub mod audio;
pub mod batch;
pub mod events;
pub mod stream;
pub mod tools;

pub use audio::{CodecError, Container, WavHeader};
pub use events::{ClientEvent, ServerEvent};
