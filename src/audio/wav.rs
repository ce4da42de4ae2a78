//! WAV decoding for dataset items and encoding for persisted chunks.

use crate::audio::buffer::AudioBuffer;
use crate::error::{CuratorError, Result};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

/// Decode WAV data into a mono buffer at `target_rate`.
///
/// Supports integer and float WAVs with any channel count; channels are
/// averaged and the result is linearly resampled when the source rate differs.
pub fn decode_wav<R: Read>(reader: R, target_rate: u32) -> Result<AudioBuffer> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| CuratorError::AudioDecode {
        message: format!("Failed to parse WAV file: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err(CuratorError::AudioDecode {
            message: "WAV file declares zero channels".to_string(),
        });
    }
    if spec.sample_rate == 0 {
        return Err(CuratorError::AudioDecode {
            message: "WAV file declares a zero sample rate".to_string(),
        });
    }

    let raw_samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int if spec.bits_per_sample <= 16 => wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let shift = spec.bits_per_sample.saturating_sub(16);
            wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .map(|s| s.map(float_to_i16))
            .collect::<std::result::Result<Vec<_>, _>>(),
    }
    .map_err(|e| CuratorError::AudioDecode {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    let mono_samples = downmix(raw_samples, spec.channels as usize);

    let samples = if spec.sample_rate != target_rate {
        resample(&mono_samples, spec.sample_rate, target_rate)
    } else {
        mono_samples
    };

    Ok(AudioBuffer::new(samples, target_rate))
}

/// Open and decode a WAV file from disk.
pub fn read_wav_file(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
    let file = File::open(path).map_err(|e| CuratorError::AudioDecode {
        message: format!("Failed to open {}: {}", path.display(), e),
    })?;
    decode_wav(BufReader::new(file), target_rate)
}

/// Encode mono samples as an in-memory 16-bit PCM WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_error = |e: hound::Error| CuratorError::Persistence {
        message: format!("Failed to encode WAV: {}", e),
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
    let mut sample_writer = writer.get_i16_writer(samples.len() as u32);
    for &s in samples {
        sample_writer.write_sample(s);
    }
    sample_writer.flush().map_err(wav_error)?;
    writer.finalize().map_err(wav_error)?;
    Ok(cursor.into_inner())
}

fn float_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Average interleaved channels into one.
fn downmix(samples: Vec<i16>, channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decode_16khz_mono_matches_exactly() {
        let input_samples = vec![100i16, 200, 300, 400, 500];
        let wav_data = make_wav_data(16000, 1, &input_samples);

        let buffer = decode_wav(Cursor::new(wav_data), 16000).unwrap();

        assert_eq!(buffer.samples(), input_samples.as_slice());
        assert_eq!(buffer.sample_rate(), 16000);
    }

    #[test]
    fn decode_stereo_downmixes_to_mono() {
        let stereo_samples = vec![100i16, 200, 300, 400, -500, 500];
        let wav_data = make_wav_data(16000, 2, &stereo_samples);

        let buffer = decode_wav(Cursor::new(wav_data), 16000).unwrap();

        assert_eq!(buffer.samples(), &[150i16, 350, 0]);
    }

    #[test]
    fn decode_24khz_resamples_to_16khz() {
        // LibriTTS ships 24kHz audio
        let input_samples = vec![1000i16; 24000];
        let wav_data = make_wav_data(24000, 1, &input_samples);

        let buffer = decode_wav(Cursor::new(wav_data), 16000).unwrap();

        assert_eq!(buffer.sample_rate(), 16000);
        assert!(buffer.len() >= 15990 && buffer.len() <= 16010);
        assert!(buffer.samples().iter().all(|&s| (999..=1001).contains(&s)));
    }

    #[test]
    fn decode_float_wav() {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for s in [0.0f32, 0.5, -1.0, 2.0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = decode_wav(Cursor::new(cursor.into_inner()), 16000).unwrap();

        assert_eq!(buffer.samples(), &[0i16, 16383, -32767, 32767]);
    }

    #[test]
    fn invalid_wav_data_returns_decode_error() {
        let result = decode_wav(Cursor::new(vec![0u8, 1, 2, 3, 4, 5]), 16000);

        match result {
            Err(CuratorError::AudioDecode { message }) => {
                assert!(message.contains("Failed to parse WAV file"));
            }
            other => panic!("Expected AudioDecode error, got {:?}", other),
        }
    }

    /// PCM16 mono WAV bytes with whatever sample rate the header claims.
    fn raw_pcm16_header(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn hand_built_header_decodes() {
        let wav_data = raw_pcm16_header(16000, &[1, 2, 3, 4]);

        let buffer = decode_wav(Cursor::new(wav_data), 16000).unwrap();

        assert_eq!(buffer.samples(), &[1i16, 2, 3, 4]);
    }

    #[test]
    fn zero_sample_rate_returns_decode_error() {
        let wav_data = raw_pcm16_header(0, &[1, 2, 3, 4]);

        let result = decode_wav(Cursor::new(wav_data), 16000);

        match result {
            Err(CuratorError::AudioDecode { message }) => {
                assert!(message.contains("zero sample rate"));
            }
            other => panic!("Expected AudioDecode error, got {:?}", other),
        }
    }

    #[test]
    fn read_missing_file_returns_decode_error() {
        let result = read_wav_file(Path::new("/nonexistent/speech-curator/a.wav"), 16000);
        assert!(matches!(result, Err(CuratorError::AudioDecode { .. })));
    }

    #[test]
    fn encode_produces_16bit_pcm_mono() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let bytes = encode_wav(&samples, 16000).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn encode_empty_samples() {
        let bytes = encode_wav(&[], 16000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn resample_identity_same_rate() {
        let samples = vec![100i16, 200, 300];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn resample_upsample_interpolates() {
        let resampled = resample(&[0i16, 1000, 2000], 8000, 16000);
        assert_eq!(resampled.len(), 6);
        assert_eq!(resampled[0], 0);
        assert!(resampled[1] > 0 && resampled[1] < 1000);
        assert_eq!(resampled[2], 1000);
    }

    #[test]
    fn resample_handles_edge_cases() {
        assert!(resample(&[], 16000, 8000).is_empty());
        assert_eq!(resample(&[100i16], 16000, 8000), vec![100]);
        assert!(resample(&[100i16, 200], 0, 16000).is_empty());
        assert!(resample(&[100i16, 200], 16000, 0).is_empty());
    }
}
