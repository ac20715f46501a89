//! Column accumulation: turns a sample stream into normalized spectrogram
//! columns, one per display pixel.
//!
//! Two boundaries race against each other while samples arrive. A *chunk*
//! boundary fires every `chunk_size` samples and contributes one windowed
//! transform to the current column's accumulator. A *column* boundary fires
//! every `samples_per_column` samples, averages whatever the accumulator
//! holds (Welch's method when a column spans several chunks) and emits the
//! normalized column. When a column is shorter than one chunk, its single
//! transform reuses trailing samples from the previous column, so adjacent
//! windows overlap.

use super::SpectralColumn;
use super::complex::Complex;
use super::fft;
use super::window::WindowKind;
use std::sync::Arc;

pub struct SliceBuilder {
    chunk_size: usize,
    samples_per_column: usize,
    window: Vec<f64>,
    /// Circular buffer of the most recent `chunk_size` samples.
    recent: Vec<f64>,
    write: usize,
    accumulator: Vec<Complex>,
    scratch: Vec<Complex>,
    sample_count: usize,
    chunk_count: usize,
    emitted: usize,
}

impl SliceBuilder {
    pub fn new(chunk_size: usize, samples_per_column: usize, window: WindowKind) -> Self {
        assert!(chunk_size.is_power_of_two());
        assert!(samples_per_column > 0);
        Self {
            window: window.coefficients(chunk_size),
            recent: vec![0.0; chunk_size],
            write: 0,
            accumulator: vec![Complex::ZERO; chunk_size],
            scratch: vec![Complex::ZERO; chunk_size],
            sample_count: 0,
            chunk_count: 0,
            emitted: 0,
            chunk_size,
            samples_per_column,
        }
    }

    /// Number of columns emitted so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Feed one sample; returns a finished column when a column boundary
    /// fires. A coincident chunk boundary accumulates its transform first,
    /// then the column closes.
    pub fn push(&mut self, sample: f64) -> Option<SpectralColumn> {
        self.recent[self.write] = sample;
        self.write = (self.write + 1) % self.chunk_size;
        self.sample_count += 1;

        let column_full = self.sample_count == self.samples_per_column;
        if self.sample_count % self.chunk_size == 0 || column_full {
            self.accumulate_chunk();
        }
        column_full.then(|| self.close_column())
    }

    /// Close a trailing partial column at end of stream. Accumulates one
    /// final transform if the tail did not land on a chunk boundary.
    pub fn flush(&mut self) -> Option<SpectralColumn> {
        if self.sample_count == 0 {
            return None;
        }
        if self.sample_count % self.chunk_size != 0 {
            self.accumulate_chunk();
        }
        Some(self.close_column())
    }

    /// Window the most recent `chunk_size` samples, transform, and add the
    /// spectrum into the column accumulator.
    fn accumulate_chunk(&mut self) {
        let n = self.chunk_size;
        for i in 0..n {
            // Oldest first: the slot at `write` holds the oldest sample.
            let sample = self.recent[(self.write + i) % n];
            self.scratch[i] = Complex::real(sample * self.window[i]);
        }
        fft::transform(&mut self.scratch);
        for (acc, bin) in self.accumulator.iter_mut().zip(&self.scratch) {
            *acc = *acc + *bin;
        }
        self.chunk_count += 1;
    }

    fn close_column(&mut self) -> SpectralColumn {
        let n = self.chunk_size as f64;
        let chunks = self.chunk_count.max(1);

        let mut values = Vec::with_capacity(self.chunk_size);
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for acc in &self.accumulator {
            let mean = *acc / chunks as f64;
            let amplitude = 10.0 * (mean.abs() / n).ln();
            min = min.min(amplitude);
            max = max.max(amplitude);
            values.push(amplitude);
        }

        // Flat columns (silence gives -inf in every bin) have no dynamic
        // range to rescale; emit the floor of the scale instead of NaN.
        let range = max - min;
        if range.is_finite() && range > 0.0 {
            for value in values.iter_mut() {
                *value = (*value - min) / range;
            }
        } else {
            values.fill(0.0);
        }

        let column = SpectralColumn {
            index: self.emitted,
            chunks: self.chunk_count,
            values: Arc::new(values),
        };

        self.accumulator.fill(Complex::ZERO);
        self.sample_count = 0;
        self.chunk_count = 0;
        self.emitted += 1;
        column
    }
}
