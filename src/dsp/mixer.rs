//! Mixer — Sums multiple voice outputs and soft-clips the result.
//!
//! Gain is applied by the caller per voice, so timelines mixed at different
//! levels keep their own level. [`StreamBuffer`] is the real-time variant:
//! rendered blocks are spliced in ahead of the playhead and played out from
//! the front.

use std::collections::VecDeque;

/// A simple summing mixer that accumulates audio from multiple sources.
#[derive(Debug, Clone, Default)]
pub struct Mixer {
    buffer: Vec<f64>,
}

impl Mixer {
    pub fn new() -> Self {
        Mixer { buffer: Vec::new() }
    }

    /// Prepare a buffer of `num_samples` filled with zeros.
    pub fn clear(&mut self, num_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0.0);
    }

    /// Grow the buffer with silence so it holds at least `num_samples`.
    pub fn ensure_len(&mut self, num_samples: usize) {
        if self.buffer.len() < num_samples {
            self.buffer.resize(num_samples, 0.0);
        }
    }

    /// Add a sample at the given index.
    pub fn add(&mut self, index: usize, sample: f64) {
        if index < self.buffer.len() {
            self.buffer[index] += sample;
        }
    }

    /// Get the mixed output buffer with soft clipping applied.
    pub fn output(&self) -> Vec<f64> {
        self.buffer.iter().map(|&s| soft_clip(s)).collect()
    }

    /// The unclipped sums, for splicing into a [`StreamBuffer`].
    pub fn into_raw(self) -> Vec<f64> {
        self.buffer
    }

    /// Access the raw buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Is the buffer empty?
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Pending samples of a live output, front = next sample to play.
#[derive(Debug, Clone, Default)]
pub struct StreamBuffer {
    pending: VecDeque<f64>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        StreamBuffer { pending: VecDeque::new() }
    }

    /// Sum `block` into the buffer starting `offset` samples after the
    /// playhead.
    pub fn splice(&mut self, offset: usize, block: &[f64]) {
        let needed = offset + block.len();
        if self.pending.len() < needed {
            self.pending.resize(needed, 0.0);
        }
        for (slot, &sample) in self.pending.iter_mut().skip(offset).zip(block) {
            *slot += sample;
        }
    }

    /// Play out one sample per frame into interleaved `data`, writing the
    /// same value to every channel. Silence once the buffer runs dry.
    /// Returns the number of frames written.
    pub fn fill_interleaved(&mut self, data: &mut [f32], channels: usize) -> usize {
        let channels = channels.max(1);
        let mut frames = 0;
        for frame in data.chunks_mut(channels) {
            let sample = self.pending.pop_front().map_or(0.0, soft_clip);
            frame.fill(sample as f32);
            frames += 1;
        }
        frames
    }

    /// Samples still queued.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}
