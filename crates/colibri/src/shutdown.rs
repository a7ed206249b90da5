//! Process-wide graceful-shutdown flag. Schedule entry points check it and
//! return silently; in-flight callbacks check it before posting follow-up
//! work.

use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

pub fn begin() {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

pub fn in_progress() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

/// Test hook: clear the flag so independent tests see a running process.
#[doc(hidden)]
pub fn reset() {
    SHUTDOWN.store(false, Ordering::SeqCst);
}
