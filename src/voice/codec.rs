//! PCM, MP3, and WAV conversions

use std::io::Cursor;

use crate::{Error, Result};

/// Bytes per PCM16 sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Convert f32 samples in [-1.0, 1.0] to PCM16LE bytes
#[must_use]
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Convert PCM16LE bytes to f32 samples; a trailing odd byte is ignored
#[must_use]
pub fn pcm16_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect()
}

/// RMS energy of f32 samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// RMS energy of PCM16LE bytes, normalized to 0.0..=1.0
#[must_use]
pub fn pcm16_rms(bytes: &[u8]) -> f32 {
    rms(&pcm16_to_samples(bytes))
}

/// Wrap PCM16LE mono bytes in a WAV container for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for pair in pcm.chunks_exact(BYTES_PER_SAMPLE) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
///
/// # Errors
///
/// Returns error if the data is not decodable MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0_u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate)
                    .map_err(|_| Error::Audio("negative MP3 sample rate".to_string()))?;

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Audio("MP3 stream contained no frames".to_string()));
    }

    Ok((samples, sample_rate))
}

/// Resample mono audio with rubato
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let expected =
        (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(delay + expected + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let block: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        let processed = if block.len() == chunk_size {
            resampler.process(&[block], None)
        } else {
            resampler.process_partial(Some(&[block][..]), None)
        };
        let result = processed.map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    // Flush the filter until the delayed tail is out
    while output.len() < delay + expected {
        let result = resampler
            .process_partial(None::<&[Vec<f64>]>, None)
            .map_err(|e| Error::Audio(format!("resample flush failed: {e}")))?;
        if result[0].is_empty() {
            break;
        }
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    let mut output = output.split_off(delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}
