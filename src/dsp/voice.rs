//! Voice — one tone event realized as an oscillator shaped by its envelope.

use crate::synth::ToneEvent;

use super::envelope::GainEnvelope;
use super::oscillator::Oscillator;

/// A single sounding tone.
#[derive(Debug, Clone)]
pub struct Voice {
    pub oscillator: Oscillator,
    /// `(offset, hz)` retune points, consumed in order.
    retunes: Vec<(f64, f64)>,
    next_retune: usize,
    envelope: GainEnvelope,
    sample_rate: f64,
    elapsed: usize,
    /// Samples this voice lasts.
    pub length: usize,
}

impl Voice {
    pub fn from_event(event: &ToneEvent, sample_rate: f64) -> Self {
        let mut oscillator = Oscillator::new(event.waveform, sample_rate);
        oscillator.frequency = 0.0;
        Voice {
            oscillator,
            retunes: event.frequency.breakpoints(event.duration),
            next_retune: 0,
            envelope: event.envelope.clone(),
            sample_rate,
            elapsed: 0,
            length: (event.duration * sample_rate).round() as usize,
        }
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        if self.is_finished() {
            return 0.0;
        }

        let t = self.elapsed as f64 / self.sample_rate;
        while let Some(&(at, hz)) = self.retunes.get(self.next_retune) {
            if at > t {
                break;
            }
            self.oscillator.frequency = hz;
            self.next_retune += 1;
        }
        let osc = self.oscillator.next_sample();
        let gain = self.envelope.level_at(t);
        self.elapsed += 1;

        osc * gain
    }

    /// Has the voice reached the end of its window?
    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.length
    }
}
