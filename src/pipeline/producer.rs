//! Decoder thread: reads raw PCM frames, assembles integer samples for the
//! analyzed channel, and fills the shared ring in publication-sized batches.

use crate::config::SampleLayout;
use crate::pipeline::context::{END_OF_STREAM, SharedContext};
use crate::source::PcmStream;
use anyhow::{Context, Result};
use tracing::debug;

pub fn run(ctx: &SharedContext, source: &mut dyn PcmStream) -> Result<()> {
    let layout = ctx.config.layout;
    let read_size = ctx.config.read_size();
    let ring_len = ctx.ring.len();
    let mut bytes = vec![0u8; read_size * layout.bytes_per_frame];

    let mut position = 0usize;
    let mut pending = 0usize;
    let mut total_frames = 0u64;

    while ctx.is_running() {
        // Fill the whole batch buffer; a short read must not split a frame.
        let mut filled = 0;
        while filled < bytes.len() {
            let n = source
                .read(&mut bytes[filled..])
                .context("stream read failed")?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        // A trailing partial frame from a truncated container is dropped.
        for frame in bytes[..filled].chunks_exact(layout.bytes_per_frame) {
            ctx.ring
                .store(position, f64::from(assemble_sample(frame, &layout)));
            position = (position + 1) % ring_len;
            pending += 1;
            total_frames += 1;
            if pending == read_size {
                pending = 0;
                if !ctx.signal_worker(position as i64) {
                    debug!("[decoder] stopped mid-stream after {total_frames} frames");
                    return Ok(());
                }
            }
        }
        if filled < bytes.len() {
            break;
        }
    }

    if pending > 0 && !ctx.signal_worker(position as i64) {
        debug!("[decoder] stopped before publishing the final batch");
        return Ok(());
    }
    if ctx.signal_worker(END_OF_STREAM) {
        debug!("[decoder] end of stream after {total_frames} frames");
    }
    Ok(())
}

/// Assemble the analyzed channel's sample from one interleaved frame,
/// sign-extending to the full integer range.
pub(crate) fn assemble_sample(frame: &[u8], layout: &SampleLayout) -> i32 {
    let width = layout.bytes_per_sample;
    let offset = width * layout.channel;
    let mut sample = 0i32;
    for (k, &byte) in frame[offset..offset + width].iter().enumerate() {
        let shift = if layout.big_endian {
            (width - 1 - k) * 8
        } else {
            k * 8
        };
        sample |= i32::from(byte) << shift;
    }
    let unused = 32 - 8 * width as u32;
    (sample << unused) >> unused
}
