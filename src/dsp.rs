//! Spectral analysis building blocks.

pub mod complex;
pub mod fft;
pub mod slice;
pub mod window;

use std::sync::Arc;

/// One spectrogram column: normalized log-magnitudes, low to high frequency.
///
/// Values are rescaled to `[0, 1]` per column; `chunks` records how many
/// windowed spectra were averaged into it (1 unless a column spans more
/// samples than one transform window).
#[derive(Debug, Clone)]
pub struct SpectralColumn {
    pub index: usize,
    pub chunks: usize,
    pub values: Arc<Vec<f64>>,
}
