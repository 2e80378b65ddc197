//! Transmission configuration.
//!
//! Every constant the sequencer uses lives here as a named parameter so a
//! host can tune the sound without touching the synthesis code. The three
//! presets reproduce the stock sounds: fixed-rate bits, typing-matched
//! bits, and layered per-character tones (the default).

use serde::{Deserialize, Serialize};

use crate::error::{Result, TalkwireError};

/// Share of the expected typing time the data body may occupy when
/// [`SymbolTiming::MatchTyping`] is used. The remainder is left for the
/// handshake and termination landmarks.
pub const DEFAULT_FILL_FACTOR: f64 = 0.85;

/// Gain applied to the sum of all oscillators.
pub const DEFAULT_MASTER_GAIN: f64 = 0.2;

/// Highest code point the 8-bit tables can represent.
pub const MAX_CODE_POINT: u32 = 0xFF;

/// Upper bound on any single duration and on a whole transmission.
pub const MAX_TRANSMISSION_SECONDS: f64 = 600.0;

/// Highest frequency any band may reach.
pub const MAX_TONE_HZ: f64 = 20_000.0;

// ── Encoding ────────────────────────────────────────────────

/// How characters are turned into symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMode {
    /// Eight binary digits per character, one tone each.
    Bit,
    /// One layered tone cluster per character.
    #[default]
    Char,
}

/// What to do with characters above U+00FF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePointPolicy {
    /// Fail with `UnsupportedCodePoint` before anything is scheduled.
    #[default]
    Reject,
    /// Fold the code point into 0..=255 (`cp % 256`).
    Wrap,
}

// ── Timing ──────────────────────────────────────────────────

/// How long each symbol of the data body lasts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolTiming {
    /// Constant window per symbol, in seconds.
    Fixed { seconds: f64 },
    /// Stretch the body so it tracks the on-screen typing speed:
    /// `chars * ms_per_char * fill_factor / symbols` milliseconds per symbol.
    MatchTyping { ms_per_char: f64, fill_factor: f64 },
}

impl SymbolTiming {
    /// Resolve the per-symbol duration in seconds. Computed once per
    /// transmission, before anything plays.
    pub fn per_symbol_seconds(&self, char_count: usize, symbol_count: usize) -> f64 {
        match *self {
            SymbolTiming::Fixed { seconds } => seconds,
            SymbolTiming::MatchTyping { ms_per_char, fill_factor } => {
                if symbol_count == 0 {
                    return 0.0;
                }
                let typing_ms = char_count as f64 * ms_per_char;
                typing_ms * fill_factor / (symbol_count as f64 * 1000.0)
            }
        }
    }
}

/// A fixed preamble/postamble: a run of sine tones of equal length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Frequencies in Hz, played in order.
    pub frequencies: Vec<f64>,
    /// Total length of the landmark in seconds.
    pub duration: f64,
}

impl Landmark {
    pub fn new(frequencies: &[f64], duration: f64) -> Self {
        Landmark {
            frequencies: frequencies.to_vec(),
            duration,
        }
    }
}

// ── Frequency tables ────────────────────────────────────────

/// Two-step carrier pairs for bit tones: low half, then high half.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitFrequencies {
    pub zero: [f64; 2],
    pub one: [f64; 2],
}

impl BitFrequencies {
    pub fn for_bit(&self, bit: bool) -> [f64; 2] {
        if bit { self.one } else { self.zero }
    }
}

impl Default for BitFrequencies {
    fn default() -> Self {
        BitFrequencies {
            zero: [1200.0, 1800.0],
            one: [2400.0, 2800.0],
        }
    }
}

/// A frequency band: `base + (code_point % modulus) * step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub base: f64,
    pub modulus: u32,
    pub step: f64,
}

impl Band {
    pub const fn new(base: f64, modulus: u32, step: f64) -> Self {
        Band { base, modulus, step }
    }

    pub fn frequency(&self, code_point: u32) -> f64 {
        self.base + (code_point % self.modulus) as f64 * self.step
    }

    /// Highest frequency this band can produce.
    pub fn ceiling(&self) -> f64 {
        self.base + (self.modulus - 1) as f64 * self.step
    }
}

/// Bands and gains for the three layers of a character tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharBands {
    pub carrier: Band,
    pub upper: Band,
    pub lower: Band,
    pub digit: Band,
    pub other: Band,
    pub overtone: Band,
    pub carrier_gain: f64,
    pub class_gain: f64,
    pub overtone_gain: f64,
    /// Relative frequency nudge applied per modulation bit (±).
    pub modulation_depth: f64,
    /// Gain multiplier for a `0` modulation bit.
    pub damped_ratio: f64,
}

impl Default for CharBands {
    fn default() -> Self {
        CharBands {
            carrier: Band::new(600.0, 26, 25.0),
            upper: Band::new(1800.0, 10, 40.0),
            lower: Band::new(1400.0, 12, 30.0),
            digit: Band::new(1200.0, 10, 60.0),
            other: Band::new(1000.0, 20, 45.0),
            overtone: Band::new(2200.0, 15, 30.0),
            carrier_gain: 0.6,
            class_gain: 0.25,
            overtone_gain: 0.15,
            modulation_depth: 0.1,
            damped_ratio: 0.6,
        }
    }
}

/// Trapezoid envelope proportions shared by every tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeShape {
    /// End of the attack ramp, as a fraction of the tone window.
    pub attack_fraction: f64,
    /// Start of the release ramp, as a fraction of the tone window.
    pub release_fraction: f64,
    /// Sustain gain of bit tones.
    pub bit_peak: f64,
    /// Sustain gain of handshake/termination tones.
    pub landmark_peak: f64,
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        EnvelopeShape {
            attack_fraction: 0.1,
            release_fraction: 0.9,
            bit_peak: 0.8,
            landmark_peak: 0.8,
        }
    }
}

// ── Reveal ──────────────────────────────────────────────────

/// Cadence of the on-screen character reveal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealPacing {
    /// `total_duration / chars` per character.
    SpreadOverTotal,
    /// The time the data body spends on one character.
    SymbolWindow,
    /// A constant interval in milliseconds.
    FixedInterval { ms: f64 },
}

// ── Top-level ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    pub mode: EncodingMode,
    pub symbol_timing: SymbolTiming,
    pub handshake: Landmark,
    pub termination: Landmark,
    pub bit_frequencies: BitFrequencies,
    pub char_bands: CharBands,
    pub envelope: EnvelopeShape,
    pub master_gain: f64,
    pub code_points: CodePointPolicy,
    pub reveal: RevealPacing,
    /// Grace period after the audio ends before the transmission counts as
    /// complete, in milliseconds.
    pub settle_ms: f64,
}

impl Default for TransmitConfig {
    fn default() -> Self {
        TransmitConfig::char_tones()
    }
}

impl TransmitConfig {
    /// Bits at a constant 30 ms each between half-second landmarks.
    pub fn bit_fixed() -> Self {
        TransmitConfig {
            mode: EncodingMode::Bit,
            symbol_timing: SymbolTiming::Fixed { seconds: 0.03 },
            handshake: Landmark::new(&[800.0, 1000.0, 1200.0], 0.5),
            termination: Landmark::new(&[900.0, 700.0, 500.0], 0.5),
            bit_frequencies: BitFrequencies::default(),
            char_bands: CharBands::default(),
            envelope: EnvelopeShape::default(),
            master_gain: DEFAULT_MASTER_GAIN,
            code_points: CodePointPolicy::Reject,
            reveal: RevealPacing::FixedInterval { ms: 100.0 },
            settle_ms: 500.0,
        }
    }

    /// Bits stretched to match a 100 ms/char typing speed.
    pub fn bit_matched() -> Self {
        TransmitConfig {
            symbol_timing: SymbolTiming::MatchTyping {
                ms_per_char: 100.0,
                fill_factor: DEFAULT_FILL_FACTOR,
            },
            handshake: Landmark::new(&[800.0, 1000.0, 1200.0], 0.3),
            termination: Landmark::new(&[900.0, 700.0, 500.0], 0.3),
            reveal: RevealPacing::SpreadOverTotal,
            settle_ms: 200.0,
            ..TransmitConfig::bit_fixed()
        }
    }

    /// Layered carrier/class/overtone tones, 80 ms per character.
    pub fn char_tones() -> Self {
        TransmitConfig {
            mode: EncodingMode::Char,
            symbol_timing: SymbolTiming::Fixed { seconds: 0.08 },
            handshake: Landmark::new(&[800.0, 1000.0, 1200.0, 1400.0], 0.4),
            termination: Landmark::new(&[1200.0, 900.0, 700.0, 500.0], 0.3),
            reveal: RevealPacing::SymbolWindow,
            settle_ms: 200.0,
            ..TransmitConfig::bit_fixed()
        }
    }

    /// Parse a JSON config. Missing fields take the default preset's values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TransmitConfig = serde_json::from_str(json)
            .map_err(|e| TalkwireError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self.symbol_timing {
            SymbolTiming::Fixed { seconds } => seconds_within("symbol_timing.seconds", seconds)?,
            SymbolTiming::MatchTyping { ms_per_char, fill_factor } => {
                seconds_within("symbol_timing.ms_per_char", ms_per_char / 1000.0)?;
                positive("symbol_timing.fill_factor", fill_factor)?;
                unit("symbol_timing.fill_factor", fill_factor)?;
            }
        }

        for (name, landmark) in [("handshake", &self.handshake), ("termination", &self.termination)] {
            if landmark.frequencies.is_empty() {
                return Err(invalid(format!("{name} needs at least one frequency")));
            }
            seconds_within(&format!("{name}.duration"), landmark.duration)?;
            for &f in &landmark.frequencies {
                positive(&format!("{name} frequency"), f)?;
            }
        }

        let env = &self.envelope;
        if !(0.0..=1.0).contains(&env.attack_fraction)
            || !(0.0..=1.0).contains(&env.release_fraction)
            || env.attack_fraction > env.release_fraction
        {
            return Err(invalid(format!(
                "envelope fractions must satisfy 0 <= attack ({}) <= release ({}) <= 1",
                env.attack_fraction, env.release_fraction
            )));
        }

        let bands = &self.char_bands;
        for (name, gain) in [
            ("master_gain", self.master_gain),
            ("envelope.bit_peak", env.bit_peak),
            ("envelope.landmark_peak", env.landmark_peak),
            ("char_bands.carrier_gain", bands.carrier_gain),
            ("char_bands.class_gain", bands.class_gain),
            ("char_bands.overtone_gain", bands.overtone_gain),
            ("char_bands.damped_ratio", bands.damped_ratio),
        ] {
            unit(name, gain)?;
        }

        for (name, band) in [
            ("carrier", bands.carrier),
            ("upper", bands.upper),
            ("lower", bands.lower),
            ("digit", bands.digit),
            ("other", bands.other),
            ("overtone", bands.overtone),
        ] {
            if band.modulus == 0 {
                return Err(invalid(format!("char_bands.{name}.modulus must be non-zero")));
            }
            positive(&format!("char_bands.{name}.base"), band.base)?;
            let ceiling = band.ceiling();
            if !(ceiling > 0.0 && ceiling <= MAX_TONE_HZ) {
                return Err(invalid(format!(
                    "char_bands.{name} reaches {ceiling} Hz, outside (0, {MAX_TONE_HZ}]"
                )));
            }
        }

        if !(0.0..=MAX_TRANSMISSION_SECONDS * 1000.0).contains(&self.settle_ms) {
            return Err(invalid(format!(
                "settle_ms must be within [0, {}], got {}",
                MAX_TRANSMISSION_SECONDS * 1000.0,
                self.settle_ms
            )));
        }
        if let RevealPacing::FixedInterval { ms } = self.reveal {
            seconds_within("reveal.ms", ms / 1000.0)?;
        }
        Ok(())
    }
}

fn invalid(reason: String) -> TalkwireError {
    TalkwireError::InvalidConfig(reason)
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be positive, got {value}")))
    }
}

fn seconds_within(name: &str, seconds: f64) -> Result<()> {
    positive(name, seconds)?;
    if seconds > MAX_TRANSMISSION_SECONDS {
        return Err(invalid(format!(
            "{name} exceeds the {MAX_TRANSMISSION_SECONDS}s limit, got {seconds}s"
        )));
    }
    Ok(())
}

fn unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        TransmitConfig::bit_fixed().validate().unwrap();
        TransmitConfig::bit_matched().validate().unwrap();
        TransmitConfig::char_tones().validate().unwrap();
    }

    #[test]
    fn default_is_char_tones() {
        assert_eq!(TransmitConfig::default(), TransmitConfig::char_tones());
    }

    #[test]
    fn match_typing_rate() {
        let timing = SymbolTiming::MatchTyping {
            ms_per_char: 100.0,
            fill_factor: DEFAULT_FILL_FACTOR,
        };
        // 2 chars * 100ms * 0.85 / 16 bits = 10.625ms
        let d = timing.per_symbol_seconds(2, 16);
        assert!((d - 0.010625).abs() < 1e-12, "got {d}");
    }

    #[test]
    fn match_typing_no_symbols() {
        let timing = SymbolTiming::MatchTyping {
            ms_per_char: 100.0,
            fill_factor: DEFAULT_FILL_FACTOR,
        };
        assert_eq!(timing.per_symbol_seconds(0, 0), 0.0);
    }

    #[test]
    fn band_frequency() {
        let band = Band::new(600.0, 26, 25.0);
        // 'H' = 72, 72 % 26 = 20
        assert_eq!(band.frequency(72), 1100.0);
        assert_eq!(band.ceiling(), 1225.0);
    }

    #[test]
    fn json_partial_override() {
        let config = TransmitConfig::from_json(r#"{ "mode": "bit", "master_gain": 0.5 }"#).unwrap();
        assert_eq!(config.mode, EncodingMode::Bit);
        assert_eq!(config.master_gain, 0.5);
        assert_eq!(config.handshake, TransmitConfig::char_tones().handshake);
    }

    #[test]
    fn json_round_trip_of_preset() {
        let preset = TransmitConfig::bit_matched();
        let json = serde_json::to_string(&preset).unwrap();
        let parsed = TransmitConfig::from_json(&json).unwrap();
        assert_eq!(parsed, preset);
    }

    #[test]
    fn json_syntax_error_is_invalid_config() {
        let err = TransmitConfig::from_json("{ mode: ").unwrap_err();
        assert!(matches!(err, TalkwireError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_inverted_envelope() {
        let mut config = TransmitConfig::default();
        config.envelope.attack_fraction = 0.95;
        assert!(matches!(config.validate(), Err(TalkwireError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_landmark() {
        let mut config = TransmitConfig::default();
        config.termination.frequencies.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_loud_master_gain() {
        let mut config = TransmitConfig::default();
        config.master_gain = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_runaway_durations() {
        let huge = [
            TransmitConfig {
                handshake: Landmark::new(&[800.0], 1e20),
                ..TransmitConfig::default()
            },
            TransmitConfig {
                symbol_timing: SymbolTiming::Fixed { seconds: 1e9 },
                ..TransmitConfig::default()
            },
            TransmitConfig { settle_ms: f64::NAN, ..TransmitConfig::default() },
            TransmitConfig { settle_ms: 1e300, ..TransmitConfig::default() },
            TransmitConfig {
                reveal: RevealPacing::FixedInterval { ms: f64::INFINITY },
                ..TransmitConfig::default()
            },
        ];
        for config in huge {
            assert!(
                matches!(config.validate(), Err(TalkwireError::InvalidConfig(_))),
                "accepted {config:?}"
            );
        }
    }

    #[test]
    fn rejects_band_above_hearing() {
        let mut config = TransmitConfig::default();
        config.char_bands.overtone = Band::new(19_000.0, 15, 300.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_symbol_duration() {
        let mut config = TransmitConfig::default();
        config.symbol_timing = SymbolTiming::Fixed { seconds: 0.0 };
        assert!(config.validate().is_err());
    }
}
