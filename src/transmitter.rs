//! Transmission controller.
//!
//! Owns the per-process state machine
//! `Idle → Encoding → Scheduled → Playing → Complete → Idle` and hands out
//! request tokens. `Playing` lasts as long as the audio, `Complete` covers
//! the settle period after it, then the controller is `Idle` again. A
//! request while a transmission is playing or settling is rejected, never
//! queued.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::TransmitConfig;
use crate::encoder::{encode, Symbol};
use crate::error::{Result, TalkwireError};
use crate::output::{self, PlaybackSink};
use crate::reveal::RevealPlan;
use crate::scheduler::{schedule, Timeline, TimingResult};

/// Identifies one transmission request. Tokens only ever increase, so a
/// callback holding an old token can tell it has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestToken(pub u64);

impl fmt::Display for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionState {
    Idle,
    Encoding,
    Scheduled,
    Playing,
    Complete,
}

/// Everything computed for a text before any sound is made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prepared {
    /// The trimmed text that was encoded.
    pub text: String,
    pub symbols: Vec<Symbol>,
    pub timeline: Timeline,
    pub timing: TimingResult,
    pub reveal: RevealPlan,
}

/// Trim, encode and schedule `text`. Fails before anything is scheduled.
pub fn prepare(text: &str, config: &TransmitConfig) -> Result<Prepared> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TalkwireError::EmptyInput);
    }
    config.validate()?;

    let symbols = encode(text, config.mode, config.code_points)?;
    let (timeline, timing) = schedule(&symbols, config)?;
    let reveal = RevealPlan::new(text, &timing, config.reveal);

    Ok(Prepared {
        text: text.to_string(),
        symbols,
        timeline,
        timing,
        reveal,
    })
}

/// A transmission that is playing.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub token: RequestToken,
    /// Sink clock time the timeline was scheduled at.
    pub started_at: f64,
    pub prepared: Prepared,
    /// Audio length plus the settle period.
    pub hold: Duration,
}

impl Transmission {
    pub fn timing(&self) -> &TimingResult {
        &self.prepared.timing
    }

    pub fn reveal(&self) -> &RevealPlan {
        &self.prepared.reveal
    }
}

#[derive(Debug)]
struct Inner {
    state: TransmissionState,
    current: Option<RequestToken>,
    /// When the audio ends.
    audio_end: Option<Instant>,
    /// When the settle period after the audio ends.
    settled_at: Option<Instant>,
}

impl Inner {
    /// Advance along `Playing → Complete → Idle` as the deadlines pass.
    fn refresh(&mut self) {
        let now = Instant::now();
        if self.state == TransmissionState::Playing && self.audio_end.is_some_and(|t| now >= t) {
            self.state = TransmissionState::Complete;
            if let Some(token) = self.current {
                info!("transmission {token} complete");
            }
        }
        if self.state == TransmissionState::Complete && self.settled_at.is_some_and(|t| now >= t) {
            self.go_idle();
        }
    }

    fn go_idle(&mut self) {
        self.state = TransmissionState::Idle;
        self.audio_end = None;
        self.settled_at = None;
    }

    fn is_busy(&self) -> bool {
        matches!(self.state, TransmissionState::Playing | TransmissionState::Complete)
    }
}

pub struct Transmitter {
    config: TransmitConfig,
    next_token: AtomicU64,
    inner: Mutex<Inner>,
}

impl Transmitter {
    pub fn new(config: TransmitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Transmitter {
            config,
            next_token: AtomicU64::new(1),
            inner: Mutex::new(Inner {
                state: TransmissionState::Idle,
                current: None,
                audio_end: None,
                settled_at: None,
            }),
        })
    }

    pub fn config(&self) -> &TransmitConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> TransmissionState {
        let mut inner = self.lock();
        inner.refresh();
        inner.state
    }

    /// Whether `token` belongs to the most recent transmission.
    pub fn is_current(&self, token: RequestToken) -> bool {
        self.lock().current == Some(token)
    }

    /// Start transmitting `text` on `sink`.
    ///
    /// On a device error the controller returns to `Idle` and nothing is
    /// revealed.
    pub fn start(&self, text: &str, sink: &mut dyn PlaybackSink) -> Result<Transmission> {
        let mut inner = self.lock();
        inner.refresh();

        if inner.is_busy() {
            let active = inner.current.unwrap_or(RequestToken(0));
            warn!("rejecting transmission request: {active} is still {:?}", inner.state);
            return Err(TalkwireError::ConcurrentTransmission { active });
        }

        inner.state = TransmissionState::Encoding;
        let prepared = match prepare(text, &self.config) {
            Ok(prepared) => prepared,
            Err(e) => {
                inner.go_idle();
                return Err(e);
            }
        };
        inner.state = TransmissionState::Scheduled;

        let started_at = match play_on(sink, &prepared.timeline, self.config.master_gain) {
            Ok(at) => at,
            Err(e) => {
                inner.go_idle();
                warn!("playback failed: {e}");
                return Err(e);
            }
        };

        let token = RequestToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        let audio = Duration::from_secs_f64(prepared.timing.total_duration);
        let hold = audio + Duration::from_secs_f64(self.config.settle_ms / 1000.0);
        let now = Instant::now();
        inner.state = TransmissionState::Playing;
        inner.current = Some(token);
        inner.audio_end = Some(now + audio);
        inner.settled_at = Some(now + hold);

        info!(
            "transmission {token}: {} chars, {:.3}s",
            prepared.timing.char_count, prepared.timing.total_duration
        );

        Ok(Transmission {
            token,
            started_at,
            prepared,
            hold,
        })
    }

    /// Start on the process-wide output, creating it with `init` if needed.
    pub fn start_on_output(
        &self,
        text: &str,
        init: impl FnOnce() -> Result<Box<dyn PlaybackSink>>,
    ) -> Result<Transmission> {
        output::with_output(init, |sink| self.start(text, sink))
    }

    /// Finish `token`'s transmission now, skipping whatever is left of
    /// `Playing` and the settle period: `Complete → Idle`. Stale tokens and
    /// an already idle controller are ignored.
    pub fn complete(&self, token: RequestToken) -> bool {
        let mut inner = self.lock();
        if inner.current != Some(token) || !inner.is_busy() {
            return false;
        }
        if inner.state == TransmissionState::Playing {
            info!("transmission {token} complete");
        }
        inner.go_idle();
        true
    }
}

fn play_on(sink: &mut dyn PlaybackSink, timeline: &Timeline, master_gain: f64) -> Result<f64> {
    sink.resume().map_err(device_error)?;
    let at = sink.current_time();
    sink.play(timeline, at, master_gain).map_err(device_error)?;
    Ok(at)
}

fn device_error(e: TalkwireError) -> TalkwireError {
    match e {
        TalkwireError::DeviceUnavailable(_) => e,
        other => TalkwireError::DeviceUnavailable(other.to_string()),
    }
}
