//! Session identity allocation.
//!
//! A session is not a record — it is a string id threaded through file
//! paths, prompt text, and log lines. Every artifact a run produces
//! (frames, GIF, report) is namespaced by this id, which is all the
//! isolation concurrent runs need.

use std::sync::atomic::{AtomicI64, Ordering};

const SESSION_PREFIX: &str = "run_";

/// Last issued clock value. Forces ids to be strictly increasing even
/// when two requests land in the same millisecond.
static LAST_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Allocate a process-unique session id: `run_{unix_millis}`.
pub fn allocate() -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let unique = LAST_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .map(|last| now.max(last + 1))
        .unwrap_or(now);
    format!("{SESSION_PREFIX}{unique}")
}
