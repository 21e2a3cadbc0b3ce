//! Workflow kinds and their status vocabularies.
//!
//! Each workflow (fork, status, test, triage) supplies its own status enum and
//! its own strongly typed extra fields. The [`Tracker`](crate::Tracker) and the
//! renderers only see the shared contract defined here.

use serde::Serialize;
use std::fmt;

/// Glyph shown for a status that has no entry in its icon table.
pub const DEFAULT_ICON: &str = "•";

/// Display tone of a status, mapped to a colour by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Muted,
    Active,
    Waiting,
    Success,
    Warning,
    Error,
}

/// A workflow-specific finite set of statuses.
pub trait StatusKind: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Status every record starts in.
    const PENDING: Self;

    /// Stable machine name (`"test_success"`).
    fn as_str(self) -> &'static str;

    /// Single-word label for tables (`"Complete"`).
    fn label(self) -> &'static str;

    /// Icon table lookup. `None` falls back to [`DEFAULT_ICON`].
    fn icon(self) -> Option<&'static str>;

    fn tone(self) -> Tone;

    /// Terminal statuses are not replaced by in-progress statuses arriving late.
    fn is_terminal(self) -> bool;

    /// Settled services are skipped when choosing the active service.
    fn is_settled(self) -> bool;

    /// Whether a record in `self` may move to `next`.
    fn allows(self, next: Self) -> bool {
        !self.is_terminal() || next.is_terminal()
    }
}

/// A workflow kind: its status set, extra record fields and their merge rule.
pub trait Workflow: fmt::Debug + Clone + Send + Sync + 'static {
    type Status: StatusKind;
    type Fields: Default + Clone + fmt::Debug + Serialize + Send + Sync;
    type Patch: Default + Clone + fmt::Debug;

    /// Short name used for log prefixes and result records.
    const KIND: &'static str;

    /// Details text of a freshly created record.
    const WAITING: &'static str = "Waiting to start";

    /// Applies a partial field update. Each field carries its own rule.
    fn merge(fields: &mut Self::Fields, patch: Self::Patch);

    /// Extra column headers shown after the status column.
    fn columns() -> &'static [&'static str] {
        &[]
    }

    /// Cell values matching [`Workflow::columns`].
    fn cells(_fields: &Self::Fields) -> Vec<String> {
        Vec::new()
    }

    /// Named numeric fields summed by [`Tracker::summary`](crate::Tracker::summary).
    fn counters(_fields: &Self::Fields) -> Vec<(&'static str, u64)> {
        Vec::new()
    }
}
