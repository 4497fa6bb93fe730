/// Traffic counters of one session.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    frames_sent: u64,
    frames_received: u64,
    bytes_sent: u64,
    bytes_received: u64,
    audio_bytes_sent: u64,
    audio_bytes_received: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn update_sent(&mut self, bytes: usize) {
        self.frames_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub(crate) fn update_received(&mut self, bytes: usize) {
        self.frames_received += 1;
        self.bytes_received += bytes as u64;
    }

    pub(crate) fn update_audio_sent(&mut self, bytes: usize) {
        self.audio_bytes_sent += bytes as u64;
    }

    pub(crate) fn update_audio_received(&mut self, bytes: usize) {
        self.audio_bytes_received += bytes as u64;
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Raw PCM bytes before base64 encoding.
    pub fn audio_bytes_sent(&self) -> u64 {
        self.audio_bytes_sent
    }

    pub fn audio_bytes_received(&self) -> u64 {
        self.audio_bytes_received
    }
}
