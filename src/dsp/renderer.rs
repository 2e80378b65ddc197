//! WAV renderer — renders a Timeline to a 16-bit mono WAV.

use std::io::{Cursor, Seek, Write};
use std::path::Path;

use crate::error::Result;
use crate::scheduler::Timeline;

use super::engine::{check_sample_rate, to_i16, AudioEngine};

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

/// Render a Timeline to WAV file bytes.
pub fn render_wav(timeline: &Timeline, master_gain: f64, sample_rate: u32) -> Result<Vec<u8>> {
    check_sample_rate(sample_rate)?;
    let engine = AudioEngine::new(sample_rate as f64);
    engine.checked_len(timeline.end_time())?;
    let pcm = engine.render_pcm_i16(timeline, master_gain);

    let mut cursor = Cursor::new(Vec::new());
    encode_wav(&mut cursor, &pcm, sample_rate)?;
    Ok(cursor.into_inner())
}

/// Encode already-rendered samples as WAV file bytes.
pub fn encode_wav_bytes(samples: &[f64], sample_rate: u32) -> Result<Vec<u8>> {
    let pcm: Vec<i16> = samples.iter().map(|&s| to_i16(s)).collect();
    let mut cursor = Cursor::new(Vec::new());
    encode_wav(&mut cursor, &pcm, sample_rate)?;
    Ok(cursor.into_inner())
}

/// Write already-rendered samples to a WAV file on disk.
pub fn write_wav_file(path: impl AsRef<Path>, samples: &[f64], sample_rate: u32) -> Result<()> {
    let pcm: Vec<i16> = samples.iter().map(|&s| to_i16(s)).collect();
    let mut writer = hound::WavWriter::create(path, wav_spec(sample_rate))?;
    for &sample in &pcm {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn encode_wav<W: Write + Seek>(out: &mut W, samples: &[i16], sample_rate: u32) -> Result<()> {
    let mut writer = hound::WavWriter::new(out, wav_spec(sample_rate))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransmitConfig;
    use crate::encoder::encode;
    use crate::scheduler::schedule;

    fn hi_timeline() -> (Timeline, TransmitConfig) {
        let config = TransmitConfig::bit_fixed();
        let symbols = encode("Hi", config.mode, config.code_points).unwrap();
        (schedule(&symbols, &config).unwrap().0, config)
    }

    #[test]
    fn wav_header_valid() {
        let (timeline, config) = hi_timeline();
        let wav = render_wav(&timeline, config.master_gain, 8000).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");

        let ch = u16::from_le_bytes([wav[22], wav[23]]);
        assert_eq!(ch, 1);
        let sr = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(sr, 8000);
    }

    #[test]
    fn wav_reads_back() {
        let (timeline, config) = hi_timeline();
        let wav = render_wav(&timeline, config.master_gain, 8000).unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        // 1.48s at 8kHz
        assert_eq!(reader.duration(), 11840);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert!(samples.iter().any(|&s| s != 0), "Rendered WAV should contain non-silent audio");
    }

    #[test]
    fn rejects_unusable_sample_rate() {
        let (timeline, config) = hi_timeline();
        let err = render_wav(&timeline, config.master_gain, 0).unwrap_err();
        assert!(matches!(err, crate::error::TalkwireError::InvalidConfig(_)));
    }

    #[test]
    fn writes_file() {
        let path = std::env::temp_dir().join(format!("talkwire-render-{}.wav", std::process::id()));
        write_wav_file(&path, &[0.0, 0.5, -0.5, 0.0], 8000).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 4);
        std::fs::remove_file(&path).ok();
    }
}
