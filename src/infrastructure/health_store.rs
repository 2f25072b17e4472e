use crate::domain::models::{Interval, IntervalCategory};
use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("health data is not available")]
    Unavailable,
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("save failed: {0}")]
    Save(String),
}

/// Category sets the session needs to read and write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub read: Vec<IntervalCategory>,
    pub write: Vec<IntervalCategory>,
}

impl Default for AccessRequest {
    fn default() -> Self {
        Self {
            read: vec![IntervalCategory::Primary, IntervalCategory::Corrective],
            write: vec![IntervalCategory::Corrective],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    EndDescending,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntervalQuery {
    pub sort: SortOrder,
    /// `None` returns every record.
    pub limit: Option<usize>,
}

#[async_trait]
pub trait HealthStore: Send + Sync {
    fn is_available(&self) -> bool;

    async fn request_access(&self, request: &AccessRequest) -> Result<(), StoreError>;

    async fn query(&self, query: &IntervalQuery) -> Result<Vec<Interval>, StoreError>;

    async fn save(&self, record: &Interval) -> Result<(), StoreError>;

    async fn save_batch(&self, records: &[Interval]) -> Result<(), StoreError>;
}

pub(crate) fn sort_end_descending(records: &mut [Interval]) {
    records.sort_by(|left, right| right.end.cmp(&left.end));
}

#[derive(Debug, Default)]
struct InMemoryState {
    records: Vec<Interval>,
    unavailable: bool,
    access_denied: bool,
    query_failure: Option<String>,
    save_failure: Option<String>,
    save_calls: usize,
    batch_calls: usize,
}

/// Process-local store used by embedding hosts and tests. Batches are
/// all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryHealthStore {
    state: Mutex<InMemoryState>,
}

impl InMemoryHealthStore {
    pub fn with_records(records: Vec<Interval>) -> Self {
        Self {
            state: Mutex::new(InMemoryState {
                records,
                ..InMemoryState::default()
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|error| StoreError::Query(format!("in-memory store lock poisoned: {error}")))
    }

    pub fn insert(&self, record: Interval) -> Result<(), StoreError> {
        record.validate().map_err(StoreError::Save)?;
        self.lock()?.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> Result<Vec<Interval>, StoreError> {
        Ok(self.lock()?.records.clone())
    }

    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), StoreError> {
        self.lock()?.unavailable = unavailable;
        Ok(())
    }

    pub fn set_access_denied(&self, denied: bool) -> Result<(), StoreError> {
        self.lock()?.access_denied = denied;
        Ok(())
    }

    pub fn set_query_failure(&self, message: Option<&str>) -> Result<(), StoreError> {
        self.lock()?.query_failure = message.map(ToOwned::to_owned);
        Ok(())
    }

    pub fn set_save_failure(&self, message: Option<&str>) -> Result<(), StoreError> {
        self.lock()?.save_failure = message.map(ToOwned::to_owned);
        Ok(())
    }

    pub fn save_calls(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.save_calls)
    }

    pub fn batch_calls(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.batch_calls)
    }
}

#[async_trait]
impl HealthStore for InMemoryHealthStore {
    fn is_available(&self) -> bool {
        self.lock().map(|state| !state.unavailable).unwrap_or(false)
    }

    async fn request_access(&self, _request: &AccessRequest) -> Result<(), StoreError> {
        let state = self.lock()?;
        if state.unavailable {
            return Err(StoreError::Unavailable);
        }
        if state.access_denied {
            return Err(StoreError::AuthorizationDenied(
                "user declined access to sleep analysis".to_string(),
            ));
        }
        Ok(())
    }

    async fn query(&self, query: &IntervalQuery) -> Result<Vec<Interval>, StoreError> {
        let state = self.lock()?;
        if state.unavailable {
            return Err(StoreError::Unavailable);
        }
        if let Some(message) = state.query_failure.as_ref() {
            return Err(StoreError::Query(message.clone()));
        }
        let mut records = state.records.clone();
        match query.sort {
            SortOrder::EndDescending => sort_end_descending(&mut records),
        }
        if let Some(limit) = query.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn save(&self, record: &Interval) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.save_calls += 1;
        if let Some(message) = state.save_failure.as_ref() {
            return Err(StoreError::Save(message.clone()));
        }
        record.validate().map_err(StoreError::Save)?;
        state.records.push(record.clone());
        Ok(())
    }

    async fn save_batch(&self, records: &[Interval]) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.batch_calls += 1;
        if let Some(message) = state.save_failure.as_ref() {
            return Err(StoreError::Save(message.clone()));
        }
        for record in records {
            record.validate().map_err(StoreError::Save)?;
        }
        state.records.extend(records.iter().cloned());
        Ok(())
    }
}
