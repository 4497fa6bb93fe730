/// Container of an audio byte stream, detected from its first chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// RIFF/WAVE wrapped PCM.
    Wav,
    /// MPEG layer III, with or without an ID3 tag.
    Mp3,
    /// Headerless PCM.
    Pcm,
}

impl Container {
    pub fn sniff(first_chunk: &[u8]) -> Self {
        if first_chunk.len() >= 12 && &first_chunk[0..4] == b"RIFF" && &first_chunk[8..12] == b"WAVE"
        {
            return Container::Wav;
        }
        if first_chunk.starts_with(b"ID3") {
            return Container::Mp3;
        }
        // MPEG frame sync: eleven set bits.
        if first_chunk.len() >= 2 && first_chunk[0] == 0xFF && first_chunk[1] & 0xE0 == 0xE0 {
            return Container::Mp3;
        }
        Container::Pcm
    }
}
