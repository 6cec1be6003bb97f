use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lets exactly one caller through.
///
/// Callback routes can be mounted more than once per navigation; an authorization
/// code is single-use, so each redirect must be processed by one caller only.
#[derive(Debug, Default)]
pub struct OnceGate {
    entered: AtomicBool,
}

impl OnceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller and `false` for every later one.
    pub fn try_enter(&self) -> bool {
        !self.entered.swap(true, Ordering::SeqCst)
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }
}

/// Shared flag telling an in-flight flow whether its results are still wanted.
///
/// Abandoning does not cancel network calls; flows check [`TaskLiveness::is_live`]
/// after each await point and drop their results once the owner has gone away.
#[derive(Clone, Debug)]
pub struct TaskLiveness {
    live: Arc<AtomicBool>,
}

impl Default for TaskLiveness {
    fn default() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl TaskLiveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Marks the owning view as gone. Irreversible.
    pub fn abandon(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}
