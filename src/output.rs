//! Playback sinks and the process-wide output handle.
//!
//! A sink realizes a [`Timeline`] against some clock: the offline sink
//! renders into memory, the device sink (feature `device`) plays through
//! the default output device. One sink per process is kept behind
//! [`with_output`]; it is created lazily on first use and lives until
//! [`shutdown`].

use std::sync::Mutex;

use log::{debug, info};

use crate::dsp::engine::{check_sample_rate, AudioEngine};
use crate::dsp::mixer::Mixer;
use crate::dsp::renderer::encode_wav_bytes;
use crate::error::{Result, TalkwireError};
use crate::scheduler::Timeline;

/// Something that can play a timeline in real or simulated time.
pub trait PlaybackSink: Send {
    /// Seconds on the sink's clock.
    fn current_time(&self) -> f64;

    /// Make sure the clock is running. Must succeed before [`play`](Self::play).
    fn resume(&mut self) -> Result<()>;

    /// Schedule every event of `timeline` at `at + event.start_time`,
    /// scaled by `master_gain`. An `at` in the past is clamped to the
    /// current time.
    fn play(&mut self, timeline: &Timeline, at: f64, master_gain: f64) -> Result<()>;
}

// ── Offline sink ────────────────────────────────────────────

/// Renders into an in-memory buffer against a manually advanced clock.
/// Starts suspended, like a freshly created browser audio context.
pub struct OfflineSink {
    engine: AudioEngine,
    mixer: Mixer,
    clock: f64,
    running: bool,
    plays: usize,
}

impl OfflineSink {
    pub fn new(sample_rate: u32) -> Self {
        OfflineSink {
            engine: AudioEngine::new(sample_rate as f64),
            mixer: Mixer::new(),
            clock: 0.0,
            running: false,
            plays: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Move the clock forward.
    pub fn advance(&mut self, seconds: f64) {
        self.clock += seconds.max(0.0);
    }

    /// Number of timelines played so far.
    pub fn plays(&self) -> usize {
        self.plays
    }

    /// Everything rendered so far, from clock zero.
    pub fn samples(&self) -> Vec<f64> {
        self.mixer.output()
    }

    /// Everything rendered so far as a 16-bit WAV.
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        encode_wav_bytes(&self.samples(), self.sample_rate())
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate as u32
    }
}

impl PlaybackSink for OfflineSink {
    fn current_time(&self) -> f64 {
        self.clock
    }

    fn resume(&mut self) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn play(&mut self, timeline: &Timeline, at: f64, master_gain: f64) -> Result<()> {
        if !self.running {
            return Err(TalkwireError::DeviceUnavailable("offline output is suspended".to_string()));
        }
        check_sample_rate(self.sample_rate())?;
        let at = at.max(self.clock);
        self.engine.checked_len(at + timeline.end_time())?;
        self.engine
            .mix_into(&mut self.mixer, timeline, self.engine.samples_for(at), master_gain);
        self.plays += 1;
        debug!("offline sink: {} events at {at:.3}s", timeline.event_count());
        Ok(())
    }
}

// ── Process-wide handle ─────────────────────────────────────

static OUTPUT: Mutex<Option<Box<dyn PlaybackSink>>> = Mutex::new(None);

/// Run `f` against the process-wide sink, creating it with `init` if none
/// exists yet. A failing `init` leaves nothing cached so the next call
/// retries. Access is serialized: only one caller holds the sink at a time.
pub fn with_output<R>(
    init: impl FnOnce() -> Result<Box<dyn PlaybackSink>>,
    f: impl FnOnce(&mut dyn PlaybackSink) -> Result<R>,
) -> Result<R> {
    let mut guard = OUTPUT
        .lock()
        .map_err(|_| TalkwireError::DeviceUnavailable("output handle poisoned".to_string()))?;
    let sink = match guard.take() {
        Some(sink) => sink,
        None => {
            let sink = init()?;
            info!("audio output initialized");
            sink
        }
    };
    let sink = guard.insert(sink);
    f(sink.as_mut())
}

/// Whether the process-wide sink has been created.
pub fn is_initialized() -> bool {
    OUTPUT.lock().map(|g| g.is_some()).unwrap_or(false)
}

/// Tear down the process-wide sink. Returns whether one existed.
pub fn shutdown() -> bool {
    let Ok(mut guard) = OUTPUT.lock() else {
        return false;
    };
    let existed = guard.take().is_some();
    if existed {
        info!("audio output shut down");
    }
    existed
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::TransmitConfig;
    use crate::encoder::encode;
    use crate::scheduler::schedule;

    /// Serializes tests that touch the process-wide handle.
    pub(crate) static GLOBAL_OUTPUT_LOCK: Mutex<()> = Mutex::new(());

    fn timeline(text: &str) -> (Timeline, TransmitConfig) {
        let config = TransmitConfig::bit_fixed();
        let symbols = encode(text, config.mode, config.code_points).unwrap();
        (schedule(&symbols, &config).unwrap().0, config)
    }

    #[test]
    fn suspended_sink_refuses_to_play() {
        let (tl, config) = timeline("a");
        let mut sink = OfflineSink::new(8000);
        let err = sink.play(&tl, 0.0, config.master_gain).unwrap_err();
        assert!(matches!(err, TalkwireError::DeviceUnavailable(_)));
        sink.resume().unwrap();
        sink.play(&tl, 0.0, config.master_gain).unwrap();
        assert_eq!(sink.plays(), 1);
    }

    #[test]
    fn late_start_is_clamped_to_clock() {
        let (tl, config) = timeline("a");
        let mut sink = OfflineSink::new(8000);
        sink.resume().unwrap();
        sink.advance(1.0);
        sink.play(&tl, 0.25, config.master_gain).unwrap();
        let samples = sink.samples();
        assert!(samples[..8000].iter().all(|&s| s == 0.0), "nothing before the clock");
        assert_eq!(samples.len(), 8000 + AudioEngine::new(8000.0).samples_for(tl.end_time()));
    }

    #[test]
    fn global_output_is_lazy_and_reused() {
        let _lock = GLOBAL_OUTPUT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        shutdown();
        assert!(!is_initialized());

        let mut inits = 0;
        for _ in 0..3 {
            with_output(
                || {
                    inits += 1;
                    Ok(Box::new(OfflineSink::new(8000)) as Box<dyn PlaybackSink>)
                },
                |sink| sink.resume(),
            )
            .unwrap();
        }
        assert_eq!(inits, 1);
        assert!(is_initialized());
        assert!(shutdown());
        assert!(!shutdown());
    }

    #[test]
    fn failed_init_is_not_cached() {
        let _lock = GLOBAL_OUTPUT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        shutdown();

        let err = with_output(
            || Err(TalkwireError::DeviceUnavailable("no device".to_string())),
            |_| Ok(()),
        )
        .unwrap_err();
        assert_eq!(err, TalkwireError::DeviceUnavailable("no device".to_string()));
        assert!(!is_initialized());
    }

    #[test]
    fn each_play_keeps_its_own_gain() {
        let (tl, _) = timeline("a");
        let engine = AudioEngine::new(8000.0);
        let alone = engine.render(&tl, 0.1);

        let mut sink = OfflineSink::new(8000);
        sink.resume().unwrap();
        sink.play(&tl, 0.0, 0.1).unwrap();
        sink.advance(tl.end_time() + 1.0);
        sink.play(&tl, sink.current_time(), 0.9).unwrap();

        let samples = sink.samples();
        let n = alone.len() - 1;
        assert_eq!(&samples[..n], &alone[..n], "a later play must not rescale earlier audio");
    }

    #[test]
    fn oversized_play_is_refused() {
        let (tl, config) = timeline("a");
        let mut sink = OfflineSink::new(8000);
        sink.resume().unwrap();
        sink.advance(1e20);
        let err = sink.play(&tl, sink.current_time(), config.master_gain).unwrap_err();
        assert!(matches!(err, TalkwireError::InvalidConfig(_)));
        assert_eq!(sink.plays(), 0);
        assert!(sink.samples().is_empty());
    }

    #[test]
    fn offline_wav_covers_everything_played() {
        let (tl, config) = timeline("ok");
        let mut sink = OfflineSink::new(8000);
        sink.resume().unwrap();
        sink.play(&tl, 0.0, config.master_gain).unwrap();
        let wav = sink.to_wav().unwrap();
        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.duration() as usize, sink.samples().len());
    }
}
