//! RIFF/WAVE container reader serving raw PCM frame bytes.
//!
//! Only uncompressed integer PCM is supported; everything else is the job of
//! a real decoding facility and is rejected at open time.

use super::{PcmSpec, PcmStream};
use anyhow::{Context, Result, bail};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

const FORMAT_PCM: u16 = 1;

pub struct WavStream {
    reader: BufReader<File>,
    spec: PcmSpec,
    remaining: u64,
}

impl WavStream {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open audio file {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; 12];
        reader
            .read_exact(&mut header)
            .context("file too short for a RIFF header")?;
        if &header[0..4] != b"RIFF" || &header[8..12] != b"WAVE" {
            bail!("{} is not a RIFF/WAVE file", path.display());
        }

        let mut format: Option<(u16, u16, u32, u16, u16)> = None;
        loop {
            let mut chunk_header = [0u8; 8];
            if reader.read_exact(&mut chunk_header).is_err() {
                bail!("no data chunk found in {}", path.display());
            }
            let id = &chunk_header[0..4];
            let size = u32::from_le_bytes(chunk_header[4..8].try_into().expect("4-byte slice"));

            match id {
                b"fmt " => {
                    if size < 16 {
                        bail!("malformed fmt chunk ({size} bytes)");
                    }
                    let mut fmt = vec![0u8; size as usize];
                    reader.read_exact(&mut fmt).context("truncated fmt chunk")?;
                    let tag = u16::from_le_bytes([fmt[0], fmt[1]]);
                    let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
                    let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
                    let block_align = u16::from_le_bytes([fmt[12], fmt[13]]);
                    let bits = u16::from_le_bytes([fmt[14], fmt[15]]);
                    format = Some((tag, channels, sample_rate, block_align, bits));
                    Self::skip_pad(&mut reader, size)?;
                }
                b"data" => {
                    let Some((tag, channels, sample_rate, block_align, bits)) = format else {
                        bail!("data chunk precedes fmt chunk in {}", path.display());
                    };
                    if tag != FORMAT_PCM {
                        bail!("unsupported WAVE format tag {tag}; only integer PCM is readable");
                    }
                    if channels == 0 || block_align == 0 {
                        bail!("malformed fmt chunk: zero channels or block align");
                    }
                    let total_frames = u64::from(size) / u64::from(block_align);
                    let spec = PcmSpec {
                        channels,
                        sample_rate,
                        bits_per_sample: bits,
                        bytes_per_frame: block_align as usize,
                        big_endian: false, // RIFF data is little-endian by definition
                        total_frames,
                    };
                    debug!(
                        "[wav] {}: {} frames, {} Hz, {} bit, {} channel(s)",
                        path.display(),
                        total_frames,
                        sample_rate,
                        bits,
                        channels
                    );
                    return Ok(Self {
                        reader,
                        spec,
                        remaining: u64::from(size),
                    });
                }
                _ => {
                    // LIST, fact, cue … skip, honoring the odd-size pad byte.
                    let skipped = std::io::copy(
                        &mut (&mut reader).take(u64::from(size)),
                        &mut std::io::sink(),
                    )?;
                    if skipped != u64::from(size) {
                        bail!("truncated {:?} chunk", String::from_utf8_lossy(id));
                    }
                    Self::skip_pad(&mut reader, size)?;
                }
            }
        }
    }

    fn skip_pad(reader: &mut BufReader<File>, size: u32) -> Result<()> {
        if size % 2 == 1 {
            let mut pad = [0u8; 1];
            let _ = reader.read(&mut pad)?;
        }
        Ok(())
    }
}

impl PcmStream for WavStream {
    fn spec(&self) -> PcmSpec {
        self.spec
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let len = buf.len().min(self.remaining as usize);
        let read = self.reader.read(&mut buf[..len])?;
        self.remaining -= read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_wav_i16(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn reads_spec_and_raw_bytes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN, 42];
        write_wav_i16(&path, 2, &samples);

        let mut stream = WavStream::open(&path).unwrap();
        let spec = stream.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.bytes_per_frame, 4);
        assert_eq!(spec.total_frames, 3);
        assert!(!spec.big_endian);

        let mut bytes = Vec::new();
        let mut buf = [0u8; 5]; // deliberately frame-misaligned reads
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&buf[..n]);
        }
        let expected: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn rejects_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        assert!(WavStream::open(&path).is_err());
    }

    #[test]
    fn rejects_non_riff_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"definitely not a wav file")
            .unwrap();
        assert!(WavStream::open(&path).is_err());
    }
}
