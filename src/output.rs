//! Observable column sequence shared between the analyzer thread and the
//! presentation side.
//!
//! Single writer (the analyzer), any number of readers. Appends go into a
//! locked vector; change events ride a bounded channel and are dropped when
//! no observer keeps up, so a slow reader can never backlog the analyzer.

use crate::dsp::SpectralColumn;
use async_channel::{Receiver, Sender, TrySendError};
use parking_lot::RwLock;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnEvent {
    Appended(usize),
    Cleared,
}

pub struct ColumnLog {
    columns: RwLock<Vec<SpectralColumn>>,
    events_tx: Sender<ColumnEvent>,
    events_rx: Receiver<ColumnEvent>,
}

impl ColumnLog {
    pub fn new() -> Self {
        let (events_tx, events_rx) = async_channel::bounded(EVENT_CAPACITY);
        Self {
            columns: RwLock::new(Vec::new()),
            events_tx,
            events_rx,
        }
    }

    /// Append one column and notify observers. Called only by the analyzer.
    pub fn push(&self, column: SpectralColumn) {
        let index = {
            let mut columns = self.columns.write();
            columns.push(column);
            columns.len() - 1
        };
        self.notify(ColumnEvent::Appended(index));
    }

    /// Drop all columns (a new file is being loaded).
    pub fn clear(&self) {
        self.columns.write().clear();
        self.notify(ColumnEvent::Cleared);
    }

    pub fn len(&self) -> usize {
        self.columns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.read().is_empty()
    }

    pub fn column(&self, index: usize) -> Option<SpectralColumn> {
        self.columns.read().get(index).cloned()
    }

    /// Cheap copy of the current sequence (columns share their bin storage).
    pub fn snapshot(&self) -> Vec<SpectralColumn> {
        self.columns.read().clone()
    }

    /// Change-event stream. Lossy under observer lag; readers reconcile
    /// against the log itself.
    pub fn subscribe(&self) -> Receiver<ColumnEvent> {
        self.events_rx.clone()
    }

    fn notify(&self, event: ColumnEvent) {
        match self.events_tx.try_send(event) {
            Ok(()) | Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {}
        }
    }
}

impl Default for ColumnLog {
    fn default() -> Self {
        Self::new()
    }
}
