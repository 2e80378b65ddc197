//! Audio Engine — renders a Timeline to audio samples.
//!
//! Each tone event becomes a [`Voice`] mixed in at its start sample. The
//! same code backs the offline renderer, the WASM sample export and the
//! real-time device sink.

use crate::error::{Result, TalkwireError};
use crate::scheduler::Timeline;

use super::mixer::Mixer;
use super::voice::Voice;

/// Highest sample rate any render accepts.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Longest stretch of audio, in seconds, a single render may allocate.
pub const MAX_RENDER_SECONDS: f64 = 1200.0;

/// Reject sample rates no output path should be asked for.
pub fn check_sample_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == 0 || sample_rate > MAX_SAMPLE_RATE {
        return Err(TalkwireError::InvalidConfig(format!(
            "sample rate must be within 1..={MAX_SAMPLE_RATE} Hz, got {sample_rate}"
        )));
    }
    Ok(())
}

pub struct AudioEngine {
    pub sample_rate: f64,
}

impl AudioEngine {
    pub fn new(sample_rate: f64) -> Self {
        AudioEngine { sample_rate }
    }

    /// Convert seconds to a sample offset.
    pub fn samples_for(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate).round() as usize
    }

    /// Sample count for `seconds`, refusing anything past
    /// [`MAX_RENDER_SECONDS`] instead of allocating it.
    pub fn checked_len(&self, seconds: f64) -> Result<usize> {
        if !seconds.is_finite() || seconds > MAX_RENDER_SECONDS {
            return Err(TalkwireError::InvalidConfig(format!(
                "{seconds}s of audio exceeds the {MAX_RENDER_SECONDS}s render limit"
            )));
        }
        Ok(self.samples_for(seconds))
    }

    /// Render a whole timeline to mono samples in [-1, 1].
    pub fn render(&self, timeline: &Timeline, master_gain: f64) -> Vec<f64> {
        let mut mixer = Mixer::new();
        mixer.clear(self.samples_for(timeline.end_time()));
        self.mix_into(&mut mixer, timeline, 0, master_gain);
        mixer.output()
    }

    /// Add every voice of `timeline`, scaled by `gain`, to `mixer`, shifted
    /// by `offset` samples. The mixer grows as needed.
    pub fn mix_into(&self, mixer: &mut Mixer, timeline: &Timeline, offset: usize, gain: f64) {
        mixer.ensure_len(offset + self.samples_for(timeline.end_time()));
        for event in timeline.events() {
            let start = offset + self.samples_for(event.start_time);
            let mut voice = Voice::from_event(event, self.sample_rate);
            mixer.ensure_len(start + voice.length);
            for i in 0..voice.length {
                mixer.add(start + i, voice.next_sample() * gain);
            }
        }
    }

    /// Render to mono i16 PCM (for WAV export).
    pub fn render_pcm_i16(&self, timeline: &Timeline, master_gain: f64) -> Vec<i16> {
        self.render(timeline, master_gain)
            .iter()
            .map(|&s| to_i16(s))
            .collect()
    }
}

pub(crate) fn to_i16(sample: f64) -> i16 {
    (sample * 32767.0).round().clamp(-32768.0, 32767.0) as i16
}
