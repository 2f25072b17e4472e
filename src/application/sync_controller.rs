use crate::application::corrective_writer::{CorrectiveWriter, WriteOutcome, WriteReport};
use crate::application::session::{
    Completion, RequestId, SessionMachine, SessionSnapshot, WriteTarget,
};
use crate::domain::models::{ErrorKind, Interval, UnresolvedEntry};
use crate::infrastructure::config::WriteStrategy;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::health_store::{AccessRequest, HealthStore, IntervalQuery, StoreError};
use std::sync::{Arc, Mutex, MutexGuard};

/// Maps a failed fetch sequence (availability, access, query) to the kind
/// surfaced to the presentation layer.
pub fn fetch_error_kind(error: &StoreError) -> ErrorKind {
    match error {
        StoreError::Unavailable => ErrorKind::Unavailable,
        StoreError::AuthorizationDenied(_) => ErrorKind::AuthDenied,
        StoreError::Query(_) | StoreError::Save(_) => ErrorKind::FetchFailed,
    }
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub completion: Completion,
    pub error: Option<StoreError>,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub report: WriteReport,
    /// The resync fetch that always follows a write.
    pub resync: RefreshOutcome,
}

/// Abandons the tracked request if the owning future is dropped before it
/// reaches a completion.
struct InFlightGuard<'a> {
    machine: &'a Mutex<SessionMachine>,
    id: Option<RequestId>,
}

impl<'a> InFlightGuard<'a> {
    fn new(machine: &'a Mutex<SessionMachine>, id: RequestId) -> Self {
        Self {
            machine,
            id: Some(id),
        }
    }

    fn track(&mut self, id: RequestId) {
        self.id = Some(id);
    }

    fn disarm(&mut self) {
        self.id = None;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Ok(mut machine) = self.machine.lock() {
            machine.abandon(id);
        }
    }
}

/// Owns the session and drives fetch / write / resync against the store.
///
/// The machine lock is only taken between awaits, so completions are applied
/// one at a time and a superseded request can never overwrite newer state.
pub struct SyncController<S>
where
    S: HealthStore,
{
    store: Arc<S>,
    writer: CorrectiveWriter<S>,
    machine: Mutex<SessionMachine>,
    access_request: AccessRequest,
    query: IntervalQuery,
}

impl<S> SyncController<S>
where
    S: HealthStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            writer: CorrectiveWriter::new(Arc::clone(&store)),
            store,
            machine: Mutex::new(SessionMachine::default()),
            access_request: AccessRequest::default(),
            query: IntervalQuery::default(),
        }
    }

    pub fn with_write_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.writer = self.writer.with_strategy(strategy);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn lock_machine(&self) -> Result<MutexGuard<'_, SessionMachine>, InfraError> {
        self.machine
            .lock()
            .map_err(|error| InfraError::State(format!("session lock poisoned: {error}")))
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, InfraError> {
        Ok(self.lock_machine()?.snapshot())
    }

    pub fn select(&self, entry: &UnresolvedEntry) -> Result<SessionSnapshot, InfraError> {
        let mut machine = self.lock_machine()?;
        machine.select(entry)?;
        Ok(machine.snapshot())
    }

    pub fn clear_selection(&self) -> Result<SessionSnapshot, InfraError> {
        let mut machine = self.lock_machine()?;
        machine.clear_selection()?;
        Ok(machine.snapshot())
    }

    pub async fn refresh(&self) -> Result<RefreshOutcome, InfraError> {
        let id = self.lock_machine()?.begin_refresh()?;
        let mut guard = InFlightGuard::new(&self.machine, id);
        let outcome = self.fetch_and_apply(id).await;
        guard.disarm();
        outcome
    }

    /// Writes the corrective record for the current selection.
    pub async fn fix(&self) -> Result<FixOutcome, InfraError> {
        let (id, target) = self.lock_machine()?.begin_fix()?;
        self.write_and_resync(id, target).await
    }

    /// Writes corrective records for every listed entry.
    pub async fn fix_all(&self) -> Result<FixOutcome, InfraError> {
        let (id, target) = self.lock_machine()?.begin_fix_all()?;
        self.write_and_resync(id, target).await
    }

    async fn fetch_records(&self) -> Result<Vec<Interval>, StoreError> {
        if !self.store.is_available() {
            return Err(StoreError::Unavailable);
        }
        self.store.request_access(&self.access_request).await?;
        self.store.query(&self.query).await
    }

    async fn fetch_and_apply(&self, id: RequestId) -> Result<RefreshOutcome, InfraError> {
        let fetched = self.fetch_records().await;
        let error = fetched.as_ref().err().cloned();
        let result = fetched.map_err(|error| fetch_error_kind(&error));

        let mut machine = self.lock_machine()?;
        let completion = machine.complete_fetch(id, result);
        Ok(RefreshOutcome {
            completion,
            error,
            snapshot: machine.snapshot(),
        })
    }

    async fn write_and_resync(
        &self,
        id: RequestId,
        target: WriteTarget,
    ) -> Result<FixOutcome, InfraError> {
        let mut guard = InFlightGuard::new(&self.machine, id);

        let report = match &target {
            WriteTarget::Single(entry) => WriteReport {
                outcomes: vec![WriteOutcome {
                    entry: *entry,
                    result: self.writer.write(entry).await,
                }],
            },
            WriteTarget::All(entries) => self.writer.write_all(entries).await,
        };
        let failure = report.first_error().map(|_| ErrorKind::WriteFailed);

        let next = self.lock_machine()?.complete_write(id, failure);
        let resync_id = match next {
            Ok(resync_id) => resync_id,
            Err(completion) => {
                guard.disarm();
                return Ok(FixOutcome {
                    report,
                    resync: RefreshOutcome {
                        completion,
                        error: None,
                        snapshot: self.snapshot()?,
                    },
                });
            }
        };

        guard.track(resync_id);
        let resync = self.fetch_and_apply(resync_id).await;
        guard.disarm();
        Ok(FixOutcome {
            report,
            resync: resync?,
        })
    }
}
