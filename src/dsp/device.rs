//! Real-time output on the default audio device.
//!
//! The cpal stream lives on its own thread (streams are not `Send` on every
//! platform); the sink talks to it through a shared [`StreamBuffer`]. Plays
//! are rendered before the lock is taken and only spliced in under it, so
//! the callback never waits on synthesis. Frames written are the clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, info};

use crate::error::{Result, TalkwireError};
use crate::output::PlaybackSink;
use crate::scheduler::Timeline;

use super::engine::AudioEngine;
use super::mixer::{Mixer, StreamBuffer};

struct Shared {
    stream: StreamBuffer,
    frames_played: u64,
}

pub struct DeviceSink {
    shared: Arc<Mutex<Shared>>,
    running: Arc<AtomicBool>,
    engine: AudioEngine,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

fn unavailable(reason: impl std::fmt::Display) -> TalkwireError {
    TalkwireError::DeviceUnavailable(reason.to_string())
}

impl DeviceSink {
    /// Open the default output device. The stream starts paused; call
    /// `resume` before playing.
    pub fn open() -> Result<Self> {
        let shared = Arc::new(Mutex::new(Shared {
            stream: StreamBuffer::new(),
            frames_played: 0,
        }));
        let running = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<u32>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let stream_shared = Arc::clone(&shared);
        let stream_running = Arc::clone(&running);
        let thread = thread::Builder::new()
            .name("talkwire-output".to_string())
            .spawn(move || {
                let stream = match build_stream(stream_shared, stream_running) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until the sink is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(unavailable)?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| unavailable("output thread exited before reporting"))??;

        Ok(DeviceSink {
            shared,
            running,
            engine: AudioEngine::new(sample_rate as f64),
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

fn build_stream(shared: Arc<Mutex<Shared>>, running: Arc<AtomicBool>) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| unavailable("no audio output device found"))?;
    let supported = device.default_output_config().map_err(unavailable)?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;

    info!(
        "audio: {} @ {}Hz, {} channels",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate,
        channels
    );

    let stream = device
        .build_output_stream(
            &supported.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::Acquire) {
                    data.fill(0.0);
                    return;
                }
                let Ok(mut shared) = shared.lock() else {
                    data.fill(0.0);
                    return;
                };
                let frames = shared.stream.fill_interleaved(data, channels);
                shared.frames_played += frames as u64;
            },
            |err| error!("audio stream error: {err}"),
            None,
        )
        .map_err(unavailable)?;
    stream.play().map_err(unavailable)?;

    Ok((stream, sample_rate))
}

impl PlaybackSink for DeviceSink {
    fn current_time(&self) -> f64 {
        let frames = self.shared.lock().map(|s| s.frames_played).unwrap_or(0);
        frames as f64 / self.engine.sample_rate
    }

    fn resume(&mut self) -> Result<()> {
        if self.thread.as_ref().is_some_and(|t| t.is_finished()) {
            return Err(unavailable("output stream has stopped"));
        }
        self.running.store(true, Ordering::Release);
        Ok(())
    }

    fn play(&mut self, timeline: &Timeline, at: f64, master_gain: f64) -> Result<()> {
        self.engine.checked_len(timeline.end_time())?;
        let mut block = Mixer::new();
        self.engine.mix_into(&mut block, timeline, 0, master_gain);
        let block = block.into_raw();

        let mut shared = self
            .shared
            .lock()
            .map_err(|_| unavailable("output state poisoned"))?;
        let now = shared.frames_played as f64 / self.engine.sample_rate;
        // The stream front is "now". A start that passed while rendering
        // lands on the playhead.
        let offset = self.engine.checked_len(at - now)?;
        shared.stream.splice(offset, &block);
        Ok(())
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}
