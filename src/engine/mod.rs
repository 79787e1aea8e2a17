//! Backup and restore engines.
//!
//! Both engines process entries strictly in the order given, one at a time,
//! and emit a `Started` event followed by exactly one terminal `Finished`
//! event per entry. A failing entry never aborts the batch.

mod backup;
mod restore;

pub use backup::BackupEngine;
pub use restore::RestoreEngine;

use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use crate::copy::CopyStats;
use crate::entry::TrackedEntry;

/// Explicit inputs shared by every engine and analysis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    /// Directory `~` expands to
    pub home: PathBuf,
    /// Local clone of the sync repository
    pub repo_path: PathBuf,
    pub profile: Option<String>,
}

impl SyncContext {
    pub fn new(
        home: impl Into<PathBuf>,
        repo_path: impl Into<PathBuf>,
        profile: Option<&str>,
    ) -> Self {
        SyncContext {
            home: home.into(),
            repo_path: repo_path.into(),
            profile: profile.map(str::to_string),
        }
    }

    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }
}

/// Terminal result for one entry
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntryOutcome {
    /// Position in the submitted batch
    pub index: usize,
    pub total: usize,
    pub path: String,
    pub name: String,
    pub stats: CopyStats,
    /// Set when the entry as a whole failed
    pub error: Option<String>,
    /// Hash of the local source after a backup
    pub content_hash: Option<String>,
    pub warning: Option<String>,
}

impl EntryOutcome {
    fn for_entry(entry: &TrackedEntry, index: usize, total: usize) -> Self {
        EntryOutcome {
            index,
            total,
            path: entry.path.clone(),
            name: entry.label().to_string(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum ProgressEvent {
    Started {
        index: usize,
        total: usize,
        path: String,
    },
    Finished(EntryOutcome),
}

/// Events from a batch running on a background thread.
///
/// Dropping the stream early discards pending events; the batch itself still
/// runs to completion.
pub struct ProgressStream {
    rx: Receiver<ProgressEvent>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressStream {
    fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(&mut dyn FnMut(&ProgressEvent)) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let mut send = |event: &ProgressEvent| {
                // Receiver gone: nobody is watching anymore
                let _ = tx.send(event.clone());
            };
            work(&mut send);
        });
        ProgressStream {
            rx,
            handle: Some(handle),
        }
    }

    /// Drain the stream, keeping only terminal outcomes
    pub fn outcomes(self) -> Vec<EntryOutcome> {
        self.filter_map(|event| match event {
            ProgressEvent::Finished(outcome) => Some(outcome),
            ProgressEvent::Started { .. } => None,
        })
        .collect()
    }
}

impl Iterator for ProgressStream {
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rx.recv() {
            Ok(event) => Some(event),
            Err(_) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        log::error!("Sync worker thread panicked");
                    }
                }
                None
            }
        }
    }
}

/// Run `work` for each entry in order, emitting events around it
fn run_batch<F>(
    entries: &[TrackedEntry],
    on_event: &mut dyn FnMut(&ProgressEvent),
    mut work: F,
) -> Vec<EntryOutcome>
where
    F: FnMut(&TrackedEntry, &mut EntryOutcome),
{
    let total = entries.len();
    let mut outcomes = Vec::with_capacity(total);

    for (index, entry) in entries.iter().enumerate() {
        on_event(&ProgressEvent::Started {
            index,
            total,
            path: entry.path.clone(),
        });

        let mut outcome = EntryOutcome::for_entry(entry, index, total);
        work(entry, &mut outcome);

        if let Some(err) = &outcome.error {
            log::warn!("{} failed: {}", entry.path, err);
        } else if outcome.stats.skipped > 0 {
            log::info!("{}: {} file(s) skipped", entry.path, outcome.stats.skipped);
        }

        on_event(&ProgressEvent::Finished(outcome.clone()));
        outcomes.push(outcome);
    }

    outcomes
}
