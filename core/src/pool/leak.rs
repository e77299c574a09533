//! Leak tracking for leased pool instances.
//!
//! Every lease handed out by a pool with leak tracking enabled carries a
//! [`LeakTracker`]. Returning the lease defuses the tracker. If the lease is
//! dropped instead, the tracker's `Drop` fires and reports the leak together
//! with the call stack that leased the instance.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use backtrace::Backtrace;

/// Log target used for leak reports.
pub const LEAK_LOG_TARGET: &str = "lilium::pool::leak";

/// Callback invoked for every detected leak.
pub type LeakHandler = Arc<dyn Fn(&LeakReport) + Send + Sync>;

/// Description of an instance that was leased and never returned.
#[derive(Debug, Clone)]
pub struct LeakReport {
    /// Name of the pool the instance was leased from.
    pub pool_name: String,
    /// Type name of the leaked instance.
    pub type_name: &'static str,
    /// Resolved call stack of the lease site.
    pub backtrace: String,
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' instance leaked from pool '{}'! Leased from:\n{}",
            self.type_name, self.pool_name, self.backtrace
        )
    }
}

/// Pool state shared with outstanding leak trackers.
///
/// Trackers only hold a [`Weak`] reference to this, so a pool that has been
/// dropped entirely never receives reports.
pub(crate) struct LeakDiagnostics {
    pub(crate) pool_name: String,
    pub(crate) disposed: AtomicBool,
    pub(crate) leaked: AtomicUsize,
    handler: Option<LeakHandler>,
}

impl LeakDiagnostics {
    pub(crate) fn new(pool_name: String, handler: Option<LeakHandler>) -> Self {
        Self {
            pool_name,
            disposed: AtomicBool::new(false),
            leaked: AtomicUsize::new(0),
            handler,
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn report(&self, type_name: &'static str, mut backtrace: Backtrace) {
        backtrace.resolve();
        let report = LeakReport {
            pool_name: self.pool_name.clone(),
            type_name,
            backtrace: format_backtrace(&backtrace),
        };

        self.leaked.fetch_add(1, Ordering::Relaxed);
        log::warn!(target: LEAK_LOG_TARGET, "{report}");

        if let Some(handler) = &self.handler {
            handler(&report);
        }
    }
}

/// Drop guard armed when an instance is leased.
pub(crate) struct LeakTracker {
    diagnostics: Weak<LeakDiagnostics>,
    type_name: &'static str,
    backtrace: Option<Backtrace>,
}

impl LeakTracker {
    /// Arm a tracker for an instance leased right now.
    pub(crate) fn arm(diagnostics: &Arc<LeakDiagnostics>, type_name: &'static str) -> Self {
        Self {
            diagnostics: Arc::downgrade(diagnostics),
            type_name,
            backtrace: Some(Backtrace::new_unresolved()),
        }
    }

    /// Disarm the tracker. The instance made it back to its pool (or the
    /// pool is gone), so nothing is reported.
    pub(crate) fn defuse(mut self) {
        self.backtrace = None;
    }
}

impl Drop for LeakTracker {
    fn drop(&mut self) {
        let Some(backtrace) = self.backtrace.take() else {
            return;
        };

        // Unwinding is teardown, not a leak.
        if std::thread::panicking() {
            return;
        }

        let Some(diagnostics) = self.diagnostics.upgrade() else {
            return;
        };

        if diagnostics.is_disposed() {
            return;
        }

        diagnostics.report(self.type_name, backtrace);
    }
}

/// Trim the frames belonging to the pool itself and the thread entry point.
fn format_backtrace(backtrace: &Backtrace) -> String {
    let stack = format!("{backtrace:?}");
    let mut stack = stack.as_str();

    if let Some(start_offset) = stack.find("Pool<T>::lease") {
        if let Some(line_end) = stack[start_offset..].find('\n') {
            stack = &stack[start_offset + line_end + 1..];
        }
    }

    if let Some(end_offset) = stack.find("std::sys::backtrace::__rust_begin_short_backtrace") {
        stack = &stack[..end_offset];
    }

    stack.to_owned()
}
