//! Tone synthesizer — maps a symbol and a time window to oscillator events.
//!
//! Pure functions: the same symbol, position and window always give the
//! same events. Nothing here touches an audio device.

use serde::{Deserialize, Serialize};

use crate::config::{CharBands, EnvelopeShape, Landmark, TransmitConfig};
use crate::dsp::envelope::{Breakpoint, GainEnvelope};
use crate::dsp::oscillator::Waveform;
use crate::encoder::{bits_msb_first, LexicalClass, Symbol, BITS_PER_CHAR};

/// Frequency over the life of one tone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrequencyPlan {
    Constant { hz: f64 },
    /// `first` for the first half of the window, `second` for the rest.
    Step { first: f64, second: f64 },
    /// One value per equal sub-interval of the window.
    Curve { steps: Vec<f64> },
}

impl FrequencyPlan {
    /// `(offset, hz)` pairs at which the frequency changes, starting at 0.
    pub fn breakpoints(&self, duration: f64) -> Vec<(f64, f64)> {
        match self {
            FrequencyPlan::Constant { hz } => vec![(0.0, *hz)],
            FrequencyPlan::Step { first, second } => vec![(0.0, *first), (duration / 2.0, *second)],
            FrequencyPlan::Curve { steps } => {
                let slot = duration / steps.len() as f64;
                steps.iter().enumerate().map(|(i, &hz)| (i as f64 * slot, hz)).collect()
            }
        }
    }
}

/// Which part of the sound an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneLayer {
    Landmark,
    Bit,
    Carrier,
    Class,
    Overtone,
}

/// One scheduled oscillator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneEvent {
    /// Seconds from the start of the transmission.
    pub start_time: f64,
    pub duration: f64,
    pub waveform: Waveform,
    pub frequency: FrequencyPlan,
    /// Gain curve, timed relative to `start_time`.
    pub envelope: GainEnvelope,
    pub layer: ToneLayer,
}

impl ToneEvent {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Synthesize the events for one symbol.
///
/// `position` is the symbol's index in the whole body; bit tones alternate
/// waveform on it.
pub fn synthesize(
    symbol: &Symbol,
    position: usize,
    start_time: f64,
    duration: f64,
    config: &TransmitConfig,
) -> Vec<ToneEvent> {
    match *symbol {
        Symbol::Bit { bit, .. } => {
            vec![bit_tone(bit, position, start_time, duration, config)]
        }
        Symbol::Char { code_point, class, .. } => char_tones(
            code_point,
            class,
            start_time,
            duration,
            &config.char_bands,
            &config.envelope,
        )
        .to_vec(),
    }
}

fn bit_tone(bit: bool, position: usize, start_time: f64, duration: f64, config: &TransmitConfig) -> ToneEvent {
    let [first, second] = config.bit_frequencies.for_bit(bit);
    let shape = &config.envelope;
    ToneEvent {
        start_time,
        duration,
        waveform: Waveform::for_position(position),
        frequency: FrequencyPlan::Step { first, second },
        envelope: GainEnvelope::trapezoid(
            duration,
            shape.bit_peak,
            shape.attack_fraction,
            shape.release_fraction,
        ),
        layer: ToneLayer::Bit,
    }
}

/// Class-dependent band for the square layer.
pub fn class_frequency(bands: &CharBands, code_point: u8, class: LexicalClass) -> f64 {
    let band = match class {
        LexicalClass::Upper => bands.upper,
        LexicalClass::Lower => bands.lower,
        LexicalClass::Digit => bands.digit,
        LexicalClass::Other => bands.other,
    };
    band.frequency(code_point as u32)
}

fn char_tones(
    code_point: u8,
    class: LexicalClass,
    start_time: f64,
    duration: f64,
    bands: &CharBands,
    shape: &EnvelopeShape,
) -> [ToneEvent; 3] {
    let cp = code_point as u32;
    let trapezoid =
        |peak: f64| GainEnvelope::trapezoid(duration, peak, shape.attack_fraction, shape.release_fraction);

    let carrier = ToneEvent {
        start_time,
        duration,
        waveform: Waveform::Sine,
        frequency: FrequencyPlan::Constant { hz: bands.carrier.frequency(cp) },
        envelope: trapezoid(bands.carrier_gain),
        layer: ToneLayer::Carrier,
    };

    let (steps, envelope) = modulation(code_point, class, duration, bands, shape);
    let class_tone = ToneEvent {
        start_time,
        duration,
        waveform: Waveform::Square,
        frequency: FrequencyPlan::Curve { steps },
        envelope,
        layer: ToneLayer::Class,
    };

    let overtone = ToneEvent {
        start_time,
        duration,
        waveform: Waveform::Sawtooth,
        frequency: FrequencyPlan::Constant { hz: bands.overtone.frequency(cp) },
        envelope: trapezoid(bands.overtone_gain),
        layer: ToneLayer::Overtone,
    };

    [carrier, class_tone, overtone]
}

/// Eight-step frequency curve and stepped gain for the class layer: a `1`
/// bit raises the frequency and keeps full gain, a `0` lowers it and damps.
fn modulation(
    code_point: u8,
    class: LexicalClass,
    duration: f64,
    bands: &CharBands,
    shape: &EnvelopeShape,
) -> (Vec<f64>, GainEnvelope) {
    let base = class_frequency(bands, code_point, class);
    let slot = duration / BITS_PER_CHAR as f64;

    let (steps, gains): (Vec<f64>, Vec<f64>) = bits_msb_first(code_point)
        .map(|bit| {
            if bit {
                (base * (1.0 + bands.modulation_depth), bands.class_gain)
            } else {
                (base * (1.0 - bands.modulation_depth), bands.class_gain * bands.damped_ratio)
            }
        })
        .unzip();

    // Attack must finish inside the first slot and release start inside the last.
    let attack_end = (duration * shape.attack_fraction).min(slot);
    let release_start = (duration * shape.release_fraction).max(duration - slot);

    let mut points = Vec::with_capacity(2 * BITS_PER_CHAR + 2);
    points.push(Breakpoint { time: 0.0, gain: 0.0 });
    points.push(Breakpoint { time: attack_end, gain: gains[0] });
    for i in 1..gains.len() {
        let t = i as f64 * slot;
        points.push(Breakpoint { time: t, gain: gains[i - 1] });
        points.push(Breakpoint { time: t, gain: gains[i] });
    }
    points.push(Breakpoint { time: release_start, gain: gains[gains.len() - 1] });
    points.push(Breakpoint { time: duration, gain: 0.0 });

    (steps, GainEnvelope::new(points))
}

/// A landmark's run of sine tones, back to back from `start_time`.
pub fn landmark_tones(landmark: &Landmark, start_time: f64, shape: &EnvelopeShape) -> Vec<ToneEvent> {
    let segment = landmark.duration / landmark.frequencies.len() as f64;
    landmark
        .frequencies
        .iter()
        .enumerate()
        .map(|(i, &hz)| ToneEvent {
            start_time: start_time + i as f64 * segment,
            duration: segment,
            waveform: Waveform::Sine,
            frequency: FrequencyPlan::Constant { hz },
            envelope: GainEnvelope::trapezoid(
                segment,
                shape.landmark_peak,
                shape.attack_fraction,
                shape.release_fraction,
            ),
            layer: ToneLayer::Landmark,
        })
        .collect()
}
