//! Audio capture module
//!
//! Recording runs through cpal, which works with PipeWire, PulseAudio,
//! and ALSA backends. A [`CaptureSession`](capture::CaptureSession) owns
//! one recording from trigger-start to trigger-stop and finalizes it into
//! a 16-bit mono WAV blob for the STT backend.

pub mod capture;

pub use capture::CaptureSession;

use crate::error::AudioError;
use std::io::Cursor;

/// Encode f32 mono samples as a 16-bit PCM WAV blob.
///
/// Empty input produces an empty blob, not a zero-length WAV file, so the
/// orchestrator can treat it as "nothing was recorded".
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AudioError::Encoding(e.to_string()))?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .map_err(|e| AudioError::Encoding(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::Encoding(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wav_empty_is_empty_blob() {
        let blob = encode_wav(&[], 16000).unwrap();
        assert!(blob.is_empty());
    }

    #[test]
    fn test_encode_wav_has_riff_header() {
        let samples = vec![0.0f32; 1600];
        let blob = encode_wav(&samples, 16000).unwrap();
        assert_eq!(&blob[0..4], b"RIFF");
        assert_eq!(&blob[8..12], b"WAVE");
    }

    #[test]
    fn test_encode_wav_clamps_out_of_range() {
        let samples = vec![2.0f32, -2.0];
        let blob = encode_wav(&samples, 16000).unwrap();
        // 44-byte header + 2 samples * 2 bytes
        assert_eq!(blob.len(), 44 + 4);
    }
}
