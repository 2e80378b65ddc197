//! Timeline scheduler — lays symbols out back to back between the
//! handshake and termination landmarks and derives the timing every other
//! consumer paces itself by.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::{TransmitConfig, MAX_TRANSMISSION_SECONDS};
use crate::encoder::Symbol;
use crate::error::{Result, TalkwireError};
use crate::synth::{landmark_tones, synthesize, ToneEvent};

/// A landmark placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub start_time: f64,
    pub duration: f64,
    pub tones: Vec<ToneEvent>,
}

impl Section {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// The window one symbol occupies and the tones sounding in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSlot {
    pub symbol: Symbol,
    pub start_time: f64,
    pub duration: f64,
    pub tones: Vec<ToneEvent>,
}

impl SymbolSlot {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Every tone of one transmission, in start order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub handshake: Section,
    pub body: Vec<SymbolSlot>,
    pub termination: Section,
}

impl Timeline {
    /// All tones, handshake first, termination last. Start times never
    /// decrease along the iteration.
    pub fn events(&self) -> impl Iterator<Item = &ToneEvent> {
        self.handshake
            .tones
            .iter()
            .chain(self.body.iter().flat_map(|slot| slot.tones.iter()))
            .chain(self.termination.tones.iter())
    }

    pub fn event_count(&self) -> usize {
        self.events().count()
    }

    pub fn end_time(&self) -> f64 {
        self.termination.end_time()
    }
}

/// Aggregate timing of a transmission. Computed once, before playback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingResult {
    /// End of termination minus start of handshake, in seconds.
    pub total_duration: f64,
    pub per_symbol_duration: f64,
    /// Absolute end of the termination landmark on the timeline.
    pub end_time: f64,
    pub handshake_duration: f64,
    pub body_duration: f64,
    pub termination_duration: f64,
    pub symbol_count: usize,
    pub char_count: usize,
}

/// Place `symbols` on a timeline.
pub fn schedule(symbols: &[Symbol], config: &TransmitConfig) -> Result<(Timeline, TimingResult)> {
    let Some(last) = symbols.last() else {
        return Err(TalkwireError::EmptyInput);
    };
    config.validate()?;

    let char_count = last.char_index() + 1;
    let per_symbol = config.symbol_timing.per_symbol_seconds(char_count, symbols.len());

    let projected = config.handshake.duration
        + per_symbol * symbols.len() as f64
        + config.termination.duration;
    if projected.is_nan() || projected > MAX_TRANSMISSION_SECONDS {
        return Err(TalkwireError::InvalidConfig(format!(
            "transmission would last {projected:.1}s, longer than the {MAX_TRANSMISSION_SECONDS}s limit"
        )));
    }

    let handshake = Section {
        start_time: 0.0,
        duration: config.handshake.duration,
        tones: landmark_tones(&config.handshake, 0.0, &config.envelope),
    };

    let mut cursor = handshake.end_time();
    let mut body = Vec::with_capacity(symbols.len());
    for (position, symbol) in symbols.iter().enumerate() {
        body.push(SymbolSlot {
            symbol: *symbol,
            start_time: cursor,
            duration: per_symbol,
            tones: synthesize(symbol, position, cursor, per_symbol, config),
        });
        cursor += per_symbol;
    }

    let termination = Section {
        start_time: cursor,
        duration: config.termination.duration,
        tones: landmark_tones(&config.termination, cursor, &config.envelope),
    };

    let end_time = termination.end_time();
    let timing = TimingResult {
        total_duration: end_time - handshake.start_time,
        per_symbol_duration: per_symbol,
        end_time,
        handshake_duration: handshake.duration,
        body_duration: termination.start_time - handshake.end_time(),
        termination_duration: termination.duration,
        symbol_count: symbols.len(),
        char_count,
    };

    debug!(
        "scheduled {} symbols ({} chars) at {:.4}s each, total {:.3}s",
        timing.symbol_count, timing.char_count, per_symbol, timing.total_duration
    );

    Ok((Timeline { handshake, body, termination }, timing))
}
