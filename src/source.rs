//! Decode-stream boundary: the pipeline consumes raw PCM frames plus their
//! layout from here and owns all sample assembly itself.

pub mod wav;

use anyhow::Result;
use std::io::Read;

/// Format metadata for an open PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmSpec {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub bytes_per_frame: usize,
    pub big_endian: bool,
    pub total_frames: u64,
}

/// A sequential source of interleaved raw PCM frame bytes.
pub trait PcmStream: Send {
    fn spec(&self) -> PcmSpec;

    /// Read raw frame bytes; `Ok(0)` signals end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Adapts any byte reader with a declared layout into a [`PcmStream`].
pub struct RawPcmStream<R> {
    spec: PcmSpec,
    reader: R,
}

impl<R: Read + Send> RawPcmStream<R> {
    pub fn new(spec: PcmSpec, reader: R) -> Self {
        Self { spec, reader }
    }
}

impl<R: Read + Send> PcmStream for RawPcmStream<R> {
    fn spec(&self) -> PcmSpec {
        self.spec
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.reader.read(buf)?)
    }
}

/// One-line human-readable format description, e.g.
/// `track.wav: PCM_SIGNED 44100 Hz, 16 bit, stereo`.
pub fn format_summary(name: &str, spec: &PcmSpec) -> String {
    let encoding = if spec.bits_per_sample == 8 {
        "PCM_UNSIGNED"
    } else {
        "PCM_SIGNED"
    };
    let channels = match spec.channels {
        1 => "mono".to_string(),
        2 => "stereo".to_string(),
        n => format!("{n} channels"),
    };
    format!(
        "{name}: {encoding} {} Hz, {} bit, {channels}",
        spec.sample_rate, spec.bits_per_sample
    )
}
