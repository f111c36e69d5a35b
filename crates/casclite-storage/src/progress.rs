//! Load progress notifications
//!
//! Each table build reports integer percentages for its phase. Values
//! within a phase start at 0, never decrease, and end at 100.

use std::fmt;

/// Table being loaded when progress is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadPhase {
    /// `.idx` shard files
    LocalIndex,
    /// Encoding table
    Encoding,
    /// Root table
    Root,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocalIndex => "local index",
            Self::Encoding => "encoding",
            Self::Root => "root",
        };
        f.write_str(name)
    }
}

/// Receives `(phase, percent)` notifications while tables load.
///
/// Any `Fn(LoadPhase, u8)` closure is an observer.
pub trait ProgressObserver: Send + Sync {
    /// Called with a percentage in `0..=100`
    fn report(&self, phase: LoadPhase, percent: u8);
}

impl<F> ProgressObserver for F
where
    F: Fn(LoadPhase, u8) + Send + Sync,
{
    fn report(&self, phase: LoadPhase, percent: u8) {
        self(phase, percent);
    }
}

/// Observer that discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn report(&self, _phase: LoadPhase, _percent: u8) {}
}

/// Per-phase tracker that forwards only strictly increasing percentages
pub(crate) struct PhaseProgress<'a> {
    observer: &'a dyn ProgressObserver,
    phase: LoadPhase,
    last: Option<u8>,
}

impl<'a> PhaseProgress<'a> {
    /// Begin a phase and report 0
    pub(crate) fn start(observer: &'a dyn ProgressObserver, phase: LoadPhase) -> Self {
        let mut progress = Self {
            observer,
            phase,
            last: None,
        };
        progress.emit(0);
        progress
    }

    /// Report `done / total` as a percentage
    pub(crate) fn update(&mut self, done: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total).saturating_mul(100) / total) as u8
        };
        self.emit(percent);
    }

    /// Report 100 and end the phase
    pub(crate) fn finish(mut self) {
        self.emit(100);
    }

    fn emit(&mut self, percent: u8) {
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        self.observer.report(self.phase, percent);
    }
}
