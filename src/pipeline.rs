//! Two-thread streaming analysis pipeline.
//!
//! A decoder thread fills a shared sample ring and publishes watermarks; an
//! analyzer thread drains published samples into spectrogram columns. The
//! [`supervisor::Pipeline`] owns both threads and the shared context.

pub mod consumer;
pub mod context;
pub mod producer;
pub mod supervisor;

pub use supervisor::Pipeline;
