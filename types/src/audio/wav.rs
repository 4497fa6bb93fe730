use super::CodecError;

/// Length of the canonical RIFF/WAVE header.
pub const WAV_HEADER_LEN: usize = 44;

const RIFF: &[u8; 4] = b"RIFF";
const WAVE: &[u8; 4] = b"WAVE";
const FMT: &[u8; 4] = b"fmt ";
const DATA: &[u8; 4] = b"data";
const PCM_FORMAT_TAG: u16 = 1;

/// The fields of a canonical 44-byte WAV header that matter for playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
    data_len: u32,
}

impl WavHeader {
    /// Header for 16-bit little-endian PCM.
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
            data_len: 0,
        }
    }

    pub fn with_data_len(mut self, data_len: u32) -> Self {
        self.data_len = data_len;
        self
    }

    /// Parses the canonical header at the start of `bytes`.
    ///
    /// Only the RIFF and WAVE magic numbers are validated; the `fmt ` chunk is
    /// assumed to sit at its canonical offset.
    pub fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(CodecError::MalformedAudioHeader(format!(
                "expected at least {} bytes, got {}",
                WAV_HEADER_LEN,
                bytes.len()
            )));
        }
        if &bytes[0..4] != RIFF || &bytes[8..12] != WAVE {
            return Err(CodecError::MalformedAudioHeader(
                "missing RIFF/WAVE magic".to_string(),
            ));
        }

        Ok(Self {
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            bits_per_sample: read_u16(bytes, 34),
            data_len: read_u32(bytes, 40),
        })
    }

    pub fn to_bytes(&self) -> [u8; WAV_HEADER_LEN] {
        let mut out = [0u8; WAV_HEADER_LEN];
        out[0..4].copy_from_slice(RIFF);
        out[4..8].copy_from_slice(&self.data_len.saturating_add(36).to_le_bytes());
        out[8..12].copy_from_slice(WAVE);
        out[12..16].copy_from_slice(FMT);
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(DATA);
        out[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        out
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn data_len(&self) -> u32 {
        self.data_len
    }

    /// Saturates for field values no real stream carries.
    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(u32::from(self.block_align()))
    }
}

/// Returns `(sample_rate, channels, bit_depth)` from a canonical WAV header.
pub fn decode_wav_header(bytes: &[u8]) -> Result<(u32, u16, u16), CodecError> {
    let header = WavHeader::parse(bytes)?;
    Ok((header.sample_rate, header.channels, header.bits_per_sample))
}

/// Drops the leading header of a WAV fragment. Fragments without RIFF magic
/// are returned untouched.
pub fn strip_wav_header(fragment: &[u8]) -> &[u8] {
    if fragment.len() >= WAV_HEADER_LEN && &fragment[0..4] == RIFF {
        &fragment[WAV_HEADER_LEN..]
    } else {
        fragment
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn hound_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn parses_header_written_by_hound() {
        let bytes = hound_wav(16000, 1, &[1, -1, 300, -300]);
        let (rate, channels, bits) = decode_wav_header(&bytes).unwrap();
        assert_eq!(rate, 16000);
        assert_eq!(channels, 1);
        assert_eq!(bits, 16);
        assert_eq!(WavHeader::parse(&bytes).unwrap().data_len(), 8);
    }

    #[test]
    fn reencoded_header_decodes_to_same_format() {
        for (rate, channels) in [(8000, 1), (24000, 2), (44100, 1), (48000, 2)] {
            let original = hound_wav(rate, channels, &[0; 8]);
            let header = WavHeader::parse(&original).unwrap();

            let mut rebuilt = header.to_bytes().to_vec();
            rebuilt.extend_from_slice(&original[WAV_HEADER_LEN..]);

            let again = WavHeader::parse(&rebuilt).unwrap();
            assert_eq!(again.sample_rate(), rate);
            assert_eq!(again.channels(), channels);
        }
    }

    #[test]
    fn extreme_field_values_survive_reencoding() {
        let cases = [
            (u32::MAX, u16::MAX, u16::MAX, u32::MAX),
            (48000, u16::MAX, 16, 0),
            (u32::MAX, 2, 32, 1024),
            (0, 0, 0, 0),
            (44100, 1, 7, 3),
        ];
        for (rate, channels, bits, data_len) in cases {
            let mut bytes = WavHeader::pcm16(16000, 1).to_bytes();
            bytes[22..24].copy_from_slice(&channels.to_le_bytes());
            bytes[24..28].copy_from_slice(&rate.to_le_bytes());
            bytes[34..36].copy_from_slice(&bits.to_le_bytes());
            bytes[40..44].copy_from_slice(&data_len.to_le_bytes());

            let header = WavHeader::parse(&bytes).unwrap();
            let again = WavHeader::parse(&header.to_bytes()).unwrap();
            assert_eq!(again, header);
            assert_eq!(
                decode_wav_header(&header.to_bytes()).unwrap(),
                (rate, channels, bits)
            );
        }
        let loud = WavHeader::parse(&{
            let mut bytes = WavHeader::pcm16(48000, 1).to_bytes();
            bytes[22..24].copy_from_slice(&u16::MAX.to_le_bytes());
            bytes
        })
        .unwrap();
        assert_eq!(loud.block_align(), u16::MAX);
        assert_eq!(loud.byte_rate(), 48000 * u32::from(u16::MAX));
    }

    #[test]
    fn short_input_is_malformed() {
        let err = WavHeader::parse(&[0u8; 43]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedAudioHeader(_)));
    }

    #[test]
    fn wrong_magic_is_malformed() {
        let mut bytes = WavHeader::pcm16(16000, 1).to_bytes();
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            WavHeader::parse(&bytes),
            Err(CodecError::MalformedAudioHeader(_))
        ));
    }

    #[test]
    fn strip_only_touches_riff_fragments() {
        let wav = hound_wav(16000, 1, &[7, 8]);
        assert_eq!(strip_wav_header(&wav), &wav[WAV_HEADER_LEN..]);

        let raw = [1u8, 2, 3, 4];
        assert_eq!(strip_wav_header(&raw), &raw);
    }
}
