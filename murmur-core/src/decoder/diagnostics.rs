//! Running counters for a decoder session.
//!
//! The decoder bumps these as pipeline stages finish, optional resources
//! fall back and audio is consumed. Counters only grow until [`reset`] is
//! called; [`Decoder::diagnostics_handle`] shares them with other threads.
//!
//! [`reset`]: DecoderDiagnostics::reset
//! [`Decoder::diagnostics_handle`]: crate::Decoder::diagnostics_handle

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Lock-free counters describing what the decoder has done so far.
#[derive(Debug, Default)]
pub struct DecoderDiagnostics {
    pub stages_completed: AtomicUsize,
    pub fallbacks_taken: AtomicUsize,
    pub params_applied: AtomicUsize,
    pub params_ignored: AtomicUsize,
    pub utterances: AtomicUsize,
    pub frames: AtomicUsize,
}

impl DecoderDiagnostics {
    pub(crate) fn bump(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.stages_completed.store(0, Ordering::Relaxed);
        self.fallbacks_taken.store(0, Ordering::Relaxed);
        self.params_applied.store(0, Ordering::Relaxed);
        self.params_ignored.store(0, Ordering::Relaxed);
        self.utterances.store(0, Ordering::Relaxed);
        self.frames.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            stages_completed: self.stages_completed.load(Ordering::Relaxed),
            fallbacks_taken: self.fallbacks_taken.load(Ordering::Relaxed),
            params_applied: self.params_applied.load(Ordering::Relaxed),
            params_ignored: self.params_ignored.load(Ordering::Relaxed),
            utterances: self.utterances.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub stages_completed: usize,
    pub fallbacks_taken: usize,
    pub params_applied: usize,
    pub params_ignored: usize,
    pub utterances: usize,
    pub frames: usize,
}
