//! Pipeline lifecycle: spawns the decoder and analyzer threads for one
//! stream, waits for completion, and winds them down with bounded patience.

use crate::config::{AnalysisSettings, PipelineConfig};
use crate::output::ColumnLog;
use crate::pipeline::context::SharedContext;
use crate::pipeline::{consumer, producer};
use crate::source::PcmStream;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const STOP_PATIENCE: Duration = Duration::from_secs(30);
const JOIN_POLL: Duration = Duration::from_millis(20);

pub struct Pipeline {
    settings: AnalysisSettings,
    log: Arc<ColumnLog>,
    context: Option<Arc<SharedContext>>,
    decoder: Option<JoinHandle<()>>,
    analyzer: Option<JoinHandle<()>>,
}

impl Pipeline {
    pub fn new(settings: AnalysisSettings) -> Self {
        Self {
            settings,
            log: Arc::new(ColumnLog::new()),
            context: None,
            decoder: None,
            analyzer: None,
        }
    }

    /// Shared column log; survives across runs (it is cleared on start).
    pub fn columns(&self) -> Arc<ColumnLog> {
        self.log.clone()
    }

    pub fn is_finished(&self) -> bool {
        let busy = |handle: &Option<JoinHandle<()>>| {
            handle.as_ref().is_some_and(|h| !h.is_finished())
        };
        !busy(&self.decoder) && !busy(&self.analyzer)
    }

    /// Begin analyzing a stream. Any run still in progress is stopped first
    /// and the column log is cleared.
    pub fn start(&mut self, mut source: Box<dyn PcmStream>, pixel_columns: usize) -> Result<()> {
        self.stop();
        let config = PipelineConfig::derive(&self.settings, &source.spec(), pixel_columns)?;
        debug!(
            "[pipeline] ring of {} samples, {} samples per column, {:.2} Hz per bin",
            config.ring_len(),
            config.samples_per_column(),
            config.frame_rate / config.chunk_size as f64
        );
        self.log.clear();

        let context = Arc::new(SharedContext::new(config));

        let decoder_ctx = context.clone();
        let decoder = thread::Builder::new()
            .name("spectrostream-decoder".into())
            .spawn(move || {
                if let Err(err) = producer::run(&decoder_ctx, source.as_mut()) {
                    error!("[decoder] {err:#}");
                    decoder_ctx.record_failure(err);
                }
            })
            .context("failed to spawn decoder thread")?;

        let analyzer_ctx = context.clone();
        let log = self.log.clone();
        let analyzer = match thread::Builder::new()
            .name("spectrostream-analyzer".into())
            .spawn(move || consumer::run(&analyzer_ctx, &log))
        {
            Ok(handle) => handle,
            Err(err) => {
                // The decoder blocks on its first publish until an analyzer
                // waits; release it before bailing out.
                context.request_stop();
                return Err(err).context("failed to spawn analyzer thread");
            }
        };

        self.context = Some(context);
        self.decoder = Some(decoder);
        self.analyzer = Some(analyzer);
        Ok(())
    }

    /// Block until the current run finishes. A decoder failure never
    /// publishes the end-of-stream mark, so the analyzer is released with a
    /// stop request before the failure is returned.
    pub fn wait(&mut self) -> Result<()> {
        if let Some(handle) = self.decoder.take() {
            join_logging_panic(handle, "decoder");
        }
        if let Some(context) = &self.context {
            if context.has_failure() {
                context.request_stop();
            }
        }
        if let Some(handle) = self.analyzer.take() {
            join_logging_panic(handle, "analyzer");
        }
        match self.context.take().and_then(|c| c.take_failure()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Request shutdown and join both threads, abandoning any that ignore
    /// the request past [`STOP_PATIENCE`].
    pub fn stop(&mut self) {
        if let Some(context) = &self.context {
            context.request_stop();
        }
        let deadline = Instant::now() + STOP_PATIENCE;
        if let Some(handle) = self.decoder.take() {
            join_with_patience(handle, "decoder", deadline);
        }
        if let Some(handle) = self.analyzer.take() {
            join_with_patience(handle, "analyzer", deadline);
        }
        self.context = None;
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_logging_panic(handle: JoinHandle<()>, name: &str) {
    if handle.join().is_err() {
        error!("[pipeline] {name} thread panicked");
    }
}

fn join_with_patience(handle: JoinHandle<()>, name: &str, deadline: Instant) {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("[pipeline] {name} thread ignored stop for {STOP_PATIENCE:?}, detaching");
            return;
        }
        thread::sleep(JOIN_POLL);
    }
    join_logging_panic(handle, name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::wav::WavStream;
    use crate::source::{PcmSpec, RawPcmStream};
    use std::path::Path;

    fn write_silence_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn small_settings() -> AnalysisSettings {
        AnalysisSettings {
            chunk_size: 256,
            lookahead_chunks: 4,
            ..AnalysisSettings::default()
        }
    }

    #[test]
    fn one_second_of_silence_yields_all_zero_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        write_silence_wav(&path, 44_100);

        let mut pipeline = Pipeline::new(small_settings());
        let log = pipeline.columns();
        pipeline
            .start(Box::new(WavStream::open(&path).unwrap()), 10)
            .unwrap();
        pipeline.wait().unwrap();

        assert_eq!(log.len(), 10);
        for (i, column) in log.snapshot().iter().enumerate() {
            assert_eq!(column.index, i);
            assert_eq!(column.values.len(), 256);
            assert!(column.values.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn restarting_clears_the_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        write_silence_wav(&path, 10_000);

        let mut pipeline = Pipeline::new(small_settings());
        let log = pipeline.columns();

        pipeline
            .start(Box::new(WavStream::open(&path).unwrap()), 8)
            .unwrap();
        pipeline.wait().unwrap();
        assert_eq!(log.len(), 8);

        pipeline
            .start(Box::new(WavStream::open(&path).unwrap()), 5)
            .unwrap();
        pipeline.wait().unwrap();
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn stop_returns_promptly_from_an_endless_stream() {
        let spec = PcmSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            bytes_per_frame: 2,
            big_endian: false,
            total_frames: 1 << 40,
        };
        let source = RawPcmStream::new(spec, std::io::repeat(0));

        let mut pipeline = Pipeline::new(small_settings());
        pipeline.start(Box::new(source), 100).unwrap();
        thread::sleep(Duration::from_millis(50));

        let begin = Instant::now();
        pipeline.stop();
        assert!(begin.elapsed() < Duration::from_secs(5));
        assert!(pipeline.is_finished());
    }

    #[test]
    fn decoder_failure_surfaces_from_wait() {
        struct Flaky {
            served: usize,
        }
        impl std::io::Read for Flaky {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.served >= 4096 {
                    return Err(std::io::Error::other("stream torn down"));
                }
                let n = buf.len().min(4096 - self.served);
                buf[..n].fill(0);
                self.served += n;
                Ok(n)
            }
        }

        let spec = PcmSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            bytes_per_frame: 2,
            big_endian: false,
            total_frames: 100_000,
        };
        let source = RawPcmStream::new(spec, Flaky { served: 0 });

        let mut pipeline = Pipeline::new(small_settings());
        pipeline.start(Box::new(source), 50).unwrap();
        assert!(pipeline.wait().is_err());
        assert!(pipeline.is_finished());
    }
}
