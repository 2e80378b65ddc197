//! Breakpoint gain envelope.

use serde::{Deserialize, Serialize};

/// One `(time, gain)` point. `time` is seconds from the tone's start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub time: f64,
    pub gain: f64,
}

/// Linear-interpolated gain curve.
///
/// Points are ordered by time. Two points may share a time to express an
/// instantaneous step; the later one wins from that instant on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainEnvelope {
    pub points: Vec<Breakpoint>,
}

impl GainEnvelope {
    pub fn new(points: Vec<Breakpoint>) -> Self {
        GainEnvelope { points }
    }

    /// Attack to `peak`, hold, release to silence.
    pub fn trapezoid(duration: f64, peak: f64, attack_fraction: f64, release_fraction: f64) -> Self {
        GainEnvelope::new(vec![
            Breakpoint { time: 0.0, gain: 0.0 },
            Breakpoint { time: duration * attack_fraction, gain: peak },
            Breakpoint { time: duration * release_fraction, gain: peak },
            Breakpoint { time: duration, gain: 0.0 },
        ])
    }

    /// Gain at `t` seconds from the tone's start.
    pub fn level_at(&self, t: f64) -> f64 {
        let count = self.points.partition_point(|p| p.time <= t);
        if count == 0 {
            return self.points.first().map_or(0.0, |p| p.gain);
        }
        let from = self.points[count - 1];
        let Some(to) = self.points.get(count) else {
            return from.gain;
        };
        let span = to.time - from.time;
        let frac = (t - from.time) / span;
        from.gain + (to.gain - from.gain) * frac
    }

    /// Highest gain reached anywhere on the curve.
    pub fn peak(&self) -> f64 {
        self.points.iter().map(|p| p.gain).fold(0.0, f64::max)
    }

    /// Non-decreasing times and gains within [0, 1].
    pub fn is_well_formed(&self) -> bool {
        self.points.windows(2).all(|w| w[0].time <= w[1].time)
            && self.points.iter().all(|p| (0.0..=1.0).contains(&p.gain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trapezoid_shape() {
        let env = GainEnvelope::trapezoid(1.0, 0.8, 0.1, 0.9);
        assert_eq!(env.level_at(0.0), 0.0);
        assert!((env.level_at(0.05) - 0.4).abs() < 1e-12, "halfway up the attack");
        assert!((env.level_at(0.5) - 0.8).abs() < 1e-12, "sustain");
        assert!((env.level_at(0.95) - 0.4).abs() < 1e-12, "halfway down the release");
        assert_eq!(env.level_at(1.0), 0.0);
    }

    #[test]
    fn holds_last_value_past_end() {
        let env = GainEnvelope::trapezoid(0.03, 0.8, 0.1, 0.9);
        assert_eq!(env.level_at(1.0), 0.0);
        assert_eq!(env.points.last().map(|p| p.time), Some(0.03));
    }

    #[test]
    fn coincident_points_step() {
        let env = GainEnvelope::new(vec![
            Breakpoint { time: 0.0, gain: 0.25 },
            Breakpoint { time: 0.5, gain: 0.25 },
            Breakpoint { time: 0.5, gain: 0.15 },
            Breakpoint { time: 1.0, gain: 0.15 },
        ]);
        assert!((env.level_at(0.49) - 0.25).abs() < 1e-12);
        assert!((env.level_at(0.5) - 0.15).abs() < 1e-12);
        assert!((env.level_at(0.75) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn peak_and_form() {
        let env = GainEnvelope::trapezoid(0.08, 0.6, 0.1, 0.9);
        assert_eq!(env.peak(), 0.6);
        assert!(env.is_well_formed());

        let broken = GainEnvelope::new(vec![
            Breakpoint { time: 0.5, gain: 0.2 },
            Breakpoint { time: 0.1, gain: 0.2 },
        ]);
        assert!(!broken.is_well_formed());
    }

    #[test]
    fn empty_envelope_is_silent() {
        let env = GainEnvelope::new(Vec::new());
        assert_eq!(env.level_at(0.3), 0.0);
        assert_eq!(env.peak(), 0.0);
    }
}
