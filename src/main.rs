mod config;
mod dsp;
mod output;
mod pipeline;
mod source;

use anyhow::{Context, Result};
use config::AnalysisSettings;
use pipeline::Pipeline;
use source::PcmStream;
use source::wav::WavStream;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_COLUMNS: usize = 640;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(
        args.next()
            .context("usage: spectrostream <file.wav> [columns]")?,
    );
    let columns = match args.next() {
        Some(raw) => raw
            .parse::<usize>()
            .with_context(|| format!("invalid column count {raw:?}"))?,
        None => DEFAULT_COLUMNS,
    };

    let settings = AnalysisSettings::load_or_default();
    // Write the file back so users have something on disk to edit.
    if let Err(err) = settings.save() {
        warn!("[settings] {err:#}");
    }
    debug!(
        "[settings] chunk {} samples, lookahead {} chunks, {:?} window",
        settings.chunk_size, settings.lookahead_chunks, settings.window
    );

    let stream = WavStream::open(&path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    info!("{}", source::format_summary(&name, &stream.spec()));

    let mut pipeline = Pipeline::new(settings);
    let log = pipeline.columns();
    let events = log.subscribe();
    pipeline.start(Box::new(stream), columns)?;

    while !pipeline.is_finished() {
        match events.try_recv() {
            Ok(event) => debug!("[pipeline] {event:?}"),
            Err(async_channel::TryRecvError::Empty) => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(async_channel::TryRecvError::Closed) => break,
        }
    }
    pipeline.wait()?;

    info!(
        "[pipeline] produced {} of {} requested columns",
        log.len(),
        columns
    );
    Ok(())
}
