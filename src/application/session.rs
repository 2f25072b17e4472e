use crate::domain::models::{ErrorKind, Interval, UnresolvedEntry};
use crate::domain::reconcile::reconcile;
use serde::Serialize;
use thiserror::Error;

/// Generation tag of one in-flight store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "error", rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Fetching,
    Reconciled,
    Selecting,
    Writing,
    Failed(ErrorKind),
}

impl SyncPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Reconciled => "reconciled",
            Self::Selecting => "selecting",
            Self::Writing => "writing",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_busy(self) -> bool {
        matches!(self, Self::Fetching | Self::Writing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestRejected {
    #[error("another fetch or write is in flight")]
    Busy,
    #[error("no entry is selected")]
    NoSelection,
    #[error("entry is not part of the current unresolved set")]
    StaleSelection,
    #[error("there are no unresolved entries to fix")]
    NothingToFix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The request was superseded; its result was discarded.
    Stale,
}

/// Which write is in flight, so `complete_write` can tell the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    Single(UnresolvedEntry),
    All(Vec<UnresolvedEntry>),
}

impl WriteTarget {
    pub fn entries(&self) -> &[UnresolvedEntry] {
        match self {
            Self::Single(entry) => std::slice::from_ref(entry),
            Self::All(entries) => entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub entries: Vec<UnresolvedEntry>,
    pub selection: Option<UnresolvedEntry>,
    pub last_error: Option<ErrorKind>,
}

/// Read-only projection handed to the presentation layer. Affordances are
/// derived from the phase; nothing here is independently mutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SyncPhase,
    pub entries: Vec<UnresolvedEntry>,
    pub selection: Option<UnresolvedEntry>,
    pub busy: bool,
    pub last_error: Option<ErrorKind>,
    pub can_refresh: bool,
    pub can_select: bool,
    pub can_fix: bool,
    pub can_fix_all: bool,
}

/// Pure session state machine. Store I/O happens outside; results are fed
/// back with the `RequestId` they were issued under.
#[derive(Debug)]
pub struct SessionMachine {
    phase: SyncPhase,
    state: SessionState,
    generation: u64,
    in_flight: Option<RequestId>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            state: SessionState::default(),
            generation: 0,
            in_flight: None,
        }
    }
}

impl SessionMachine {
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let busy = self.is_busy();
        let settled = matches!(self.phase, SyncPhase::Reconciled | SyncPhase::Selecting);
        SessionSnapshot {
            phase: self.phase,
            entries: self.state.entries.clone(),
            selection: self.state.selection,
            busy,
            last_error: self.state.last_error,
            can_refresh: !busy,
            can_select: settled && !self.state.entries.is_empty(),
            can_fix: self.phase == SyncPhase::Selecting && self.state.selection.is_some(),
            can_fix_all: settled && !self.state.entries.is_empty(),
        }
    }

    fn issue(&mut self) -> RequestId {
        self.generation += 1;
        let id = RequestId(self.generation);
        self.in_flight = Some(id);
        id
    }

    fn start_fetch(&mut self) -> RequestId {
        self.phase = SyncPhase::Fetching;
        self.state.entries.clear();
        self.state.selection = None;
        self.issue()
    }

    fn is_current(&self, id: RequestId) -> bool {
        self.in_flight == Some(id)
    }

    /// User-initiated refresh. Clears the previous error.
    pub fn begin_refresh(&mut self) -> Result<RequestId, RequestRejected> {
        if self.is_busy() {
            return Err(RequestRejected::Busy);
        }
        self.state.last_error = None;
        Ok(self.start_fetch())
    }

    pub fn complete_fetch(
        &mut self,
        id: RequestId,
        result: Result<Vec<Interval>, ErrorKind>,
    ) -> Completion {
        if !self.is_current(id) || self.phase != SyncPhase::Fetching {
            return Completion::Stale;
        }
        self.in_flight = None;
        match result {
            Ok(records) => {
                self.state.entries = reconcile(&records);
                self.state.selection = None;
                self.phase = SyncPhase::Reconciled;
            }
            Err(kind) => {
                self.state.entries.clear();
                self.state.selection = None;
                self.state.last_error = Some(kind);
                self.phase = SyncPhase::Failed(kind);
            }
        }
        Completion::Applied
    }

    /// Designates `entry` as the selection. An entry missing from the
    /// current set is rejected and the existing selection is kept.
    pub fn select(&mut self, entry: &UnresolvedEntry) -> Result<(), RequestRejected> {
        if self.is_busy() {
            return Err(RequestRejected::Busy);
        }
        if !matches!(self.phase, SyncPhase::Reconciled | SyncPhase::Selecting)
            || !self.state.entries.contains(entry)
        {
            return Err(RequestRejected::StaleSelection);
        }
        self.state.selection = Some(*entry);
        self.phase = SyncPhase::Selecting;
        Ok(())
    }

    pub fn clear_selection(&mut self) -> Result<(), RequestRejected> {
        if self.is_busy() {
            return Err(RequestRejected::Busy);
        }
        self.state.selection = None;
        if self.phase == SyncPhase::Selecting {
            self.phase = SyncPhase::Reconciled;
        }
        Ok(())
    }

    pub fn begin_fix(&mut self) -> Result<(RequestId, WriteTarget), RequestRejected> {
        if self.is_busy() {
            return Err(RequestRejected::Busy);
        }
        let entry = self.state.selection.ok_or(RequestRejected::NoSelection)?;
        self.phase = SyncPhase::Writing;
        Ok((self.issue(), WriteTarget::Single(entry)))
    }

    /// Targets every current entry, regardless of the selection.
    pub fn begin_fix_all(&mut self) -> Result<(RequestId, WriteTarget), RequestRejected> {
        if self.is_busy() {
            return Err(RequestRejected::Busy);
        }
        if self.state.entries.is_empty() {
            return Err(RequestRejected::NothingToFix);
        }
        self.phase = SyncPhase::Writing;
        Ok((self.issue(), WriteTarget::All(self.state.entries.clone())))
    }

    /// Records the writer's verdict and moves straight to a resync fetch.
    /// Entries are never removed locally; the next fetch decides.
    pub fn complete_write(
        &mut self,
        id: RequestId,
        failure: Option<ErrorKind>,
    ) -> Result<RequestId, Completion> {
        if !self.is_current(id) || self.phase != SyncPhase::Writing {
            return Err(Completion::Stale);
        }
        if let Some(kind) = failure {
            self.state.last_error = Some(kind);
        }
        Ok(self.start_fetch())
    }

    /// Gives up on `id` when its caller went away. The session falls back to
    /// `Idle` with nothing listed, so a refresh is needed before any write.
    pub fn abandon(&mut self, id: RequestId) -> Completion {
        if !self.is_current(id) {
            return Completion::Stale;
        }
        self.in_flight = None;
        self.state.entries.clear();
        self.state.selection = None;
        self.phase = SyncPhase::Idle;
        Completion::Applied
    }
}
