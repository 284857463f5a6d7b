//! WAV container for concatenated speech chunks.

use serde::{Deserialize, Serialize};

/// Size of the RIFF/WAVE PCM header.
pub const WAV_HEADER_LEN: usize = 44;

/// PCM stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavSpec {
    /// Samples per second.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Bits per sample.
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl WavSpec {
    /// Mono 16-bit at `sample_rate`.
    #[must_use]
    pub fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }
}

/// Prepends a PCM WAV header to `pcm`.
///
/// Streams longer than `u32::MAX` bytes are not representable in RIFF; their size
/// fields saturate.
#[must_use]
pub fn encode_wav(pcm: &[u8], spec: &WavSpec) -> Vec<u8> {
    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let block_align = spec.block_align();
    let byte_rate = spec.sample_rate * u32::from(block_align);

    let mut bytes = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&36u32.saturating_add(data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&spec.channels.to_le_bytes());
    bytes.extend_from_slice(&spec.sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&spec.bits_per_sample.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    bytes.extend_from_slice(pcm);
    bytes
}
