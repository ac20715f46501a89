//! Analyzer thread: drains published sample batches from the ring into a
//! [`SliceBuilder`] and appends finished columns to the shared log.

use crate::dsp::slice::SliceBuilder;
use crate::output::ColumnLog;
use crate::pipeline::context::{END_OF_STREAM, SharedContext};
use tracing::debug;

pub fn run(ctx: &SharedContext, log: &ColumnLog) {
    let config = &ctx.config;
    let mut builder = SliceBuilder::new(
        config.chunk_size,
        config.samples_per_column(),
        config.window,
    );
    let ring_len = ctx.ring.len();
    let target = config.pixel_columns;

    let mut cursor = 0usize;
    let mut watermark = 0i64;
    // Once the target column count is reached, keep consuming batches so the
    // decoder is never left blocked on a handoff, but stop transforming.
    let mut draining = false;

    while ctx.is_running() {
        watermark = match ctx.await_work(watermark) {
            Some(mark) => mark,
            None => {
                debug!("[analyzer] stopped after {} columns", builder.emitted());
                return;
            }
        };
        if watermark == END_OF_STREAM {
            if !draining {
                if let Some(column) = builder.flush() {
                    log.push(column);
                }
            }
            debug!("[analyzer] stream ended with {} columns", log.len());
            return;
        }

        let end = watermark as usize;
        while cursor != end {
            let sample = ctx.ring.load(cursor);
            cursor = (cursor + 1) % ring_len;
            if draining {
                continue;
            }
            if let Some(column) = builder.push(sample) {
                log.push(column);
                if builder.emitted() == target {
                    draining = true;
                    debug!("[analyzer] reached {target} columns, draining remainder");
                }
            }
        }
    }
}
