use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree};

pub const RESAMPLER_CHUNK_SIZE: usize = 1024;

pub fn create_resampler(in_sampling_rate: f64, out_sampling_rate: f64, chunk_size: usize) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1
    )?;
    Ok(resampler)
}

/// Splits `samples` into `chunk_size` pieces, zero padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples.chunks(chunk_size).map(|chunk| {
        let mut chunk = chunk.to_vec();
        chunk.resize(chunk_size, 0.0);
        chunk
    }).collect()
}

pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Little-endian PCM16 bytes to samples in `-1.0..=1.0`. A trailing odd byte is ignored.
pub fn pcm16_to_f32(pcm16: &[u8]) -> Vec<f32> {
    pcm16.chunks_exact(2).map(|chunk| {
        let v = i16::from_le_bytes([chunk[0], chunk[1]]);
        (v as f32 / i16::MAX as f32).clamp(-1.0, 1.0)
    }).collect()
}

pub fn f32_to_pcm16(pcm32: &[f32]) -> Vec<u8> {
    pcm32.iter().flat_map(|&sample| {
        ((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes()
    }).collect()
}

pub fn i16_to_pcm16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|sample| sample.to_le_bytes()).collect()
}

pub fn u16_to_pcm16(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|&sample| ((sample as i32 - 32768) as i16).to_le_bytes()).collect()
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples.chunks(channels)
        .map(|c| c.iter().sum::<f32>() / channels as f32)
        .collect()
}
