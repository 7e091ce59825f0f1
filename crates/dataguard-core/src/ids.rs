//! Id and timestamp utilities shared across the workspace.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

static NEXT_ORDINAL: AtomicU64 = AtomicU64::new(1);

/// A fresh random decision/proposal identifier.
#[must_use]
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

/// Current wall-clock time.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// A monotonically increasing ordinal, scoped to the current process.
///
/// Used only to give an in-process, causally ordered tie-break for audit
/// correlation; it is not part of any persisted identifier.
pub fn next_ordinal() -> u64 {
    NEXT_ORDINAL.fetch_add(1, Ordering::Relaxed)
}
