//! Reveal pacing — when each character of the message appears on screen.
//!
//! The plan is derived from the scheduler's [`TimingResult`] and nothing
//! else, so text and audio share one schedule. There is no feedback: if the
//! host delays audio, the two drift.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RevealPacing;
use crate::scheduler::TimingResult;

/// One character becoming visible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevealTick {
    pub index: usize,
    pub ch: char,
    /// Seconds after the transmission started.
    pub at: f64,
}

impl RevealTick {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.at.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealPlan {
    /// Delay before the first interval starts (the handshake).
    pub offset: f64,
    /// Seconds between characters.
    pub interval: f64,
    chars: Vec<char>,
}

impl RevealPlan {
    pub fn new(text: &str, timing: &TimingResult, pacing: RevealPacing) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let count = chars.len().max(1) as f64;
        let interval = match pacing {
            RevealPacing::SpreadOverTotal => timing.total_duration / count,
            RevealPacing::SymbolWindow => {
                timing.per_symbol_duration * timing.symbol_count as f64 / count
            }
            RevealPacing::FixedInterval { ms } => ms / 1000.0,
        };
        RevealPlan {
            offset: timing.handshake_duration,
            interval,
            chars,
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Ticks in emission order. Each character lands at the end of its
    /// interval.
    pub fn ticks(&self) -> impl Iterator<Item = RevealTick> + '_ {
        self.chars.iter().enumerate().map(move |(index, &ch)| RevealTick {
            index,
            ch,
            at: self.offset + (index + 1) as f64 * self.interval,
        })
    }

    /// Time the last character appears.
    pub fn finish_time(&self) -> f64 {
        self.offset + self.chars.len() as f64 * self.interval
    }

    /// Text visible `elapsed` seconds into the transmission.
    pub fn visible_at(&self, elapsed: f64) -> String {
        self.ticks().take_while(|t| t.at <= elapsed).map(|t| t.ch).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransmitConfig;
    use crate::encoder::encode;
    use crate::scheduler::schedule;

    fn plan_for(text: &str, config: &TransmitConfig) -> (RevealPlan, TimingResult) {
        let symbols = encode(text, config.mode, config.code_points).unwrap();
        let (_, timing) = schedule(&symbols, config).unwrap();
        (RevealPlan::new(text, &timing, config.reveal), timing)
    }

    #[test]
    fn symbol_window_matches_char_audio() {
        let config = TransmitConfig::char_tones();
        let (plan, _) = plan_for("Hey", &config);
        assert!((plan.offset - 0.4).abs() < 1e-12);
        assert!((plan.interval - 0.08).abs() < 1e-12);
        let ats: Vec<f64> = plan.ticks().map(|t| t.at).collect();
        let want = [0.48, 0.56, 0.64];
        for (got, want) in ats.iter().zip(want) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
    }

    #[test]
    fn symbol_window_in_bit_mode_covers_eight_bits() {
        let config = TransmitConfig {
            reveal: RevealPacing::SymbolWindow,
            ..TransmitConfig::bit_fixed()
        };
        let (plan, timing) = plan_for("ab", &config);
        assert!((plan.interval - 8.0 * timing.per_symbol_duration).abs() < 1e-12);
    }

    #[test]
    fn spread_over_total() {
        let config = TransmitConfig::bit_matched();
        let (plan, timing) = plan_for("Hello", &config);
        assert!((plan.interval - timing.total_duration / 5.0).abs() < 1e-12);
    }

    #[test]
    fn fixed_interval() {
        let (plan, _) = plan_for("Hi", &TransmitConfig::bit_fixed());
        assert!((plan.interval - 0.1).abs() < 1e-12);
        assert_eq!(plan.ticks().map(|t| t.ch).collect::<String>(), "Hi");
    }

    #[test]
    fn ticks_are_ordered_and_complete() {
        let text = "Hello World, how can I help you today?";
        let (plan, _) = plan_for(text, &TransmitConfig::char_tones());
        let ticks: Vec<RevealTick> = plan.ticks().collect();
        assert_eq!(ticks.len(), text.chars().count());
        assert!(ticks.windows(2).all(|w| w[0].at < w[1].at));
        assert!((ticks.last().unwrap().at - plan.finish_time()).abs() < 1e-9);
    }

    #[test]
    fn visible_text_grows() {
        let (plan, _) = plan_for("abc", &TransmitConfig::char_tones());
        assert_eq!(plan.visible_at(0.0), "");
        assert_eq!(plan.visible_at(0.49), "a");
        assert_eq!(plan.visible_at(10.0), "abc");
    }
}
