use crate::domain::models::{Interval, UnresolvedEntry};
use crate::infrastructure::config::WriteStrategy;
use crate::infrastructure::health_store::{HealthStore, StoreError};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub entry: UnresolvedEntry,
    pub result: Result<(), StoreError>,
}

/// Per-entry verdicts of one write request, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WriteReport {
    pub outcomes: Vec<WriteOutcome>,
}

impl WriteReport {
    pub fn succeeded(&self) -> Vec<UnresolvedEntry> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .map(|outcome| outcome.entry)
            .collect()
    }

    pub fn failed(&self) -> Vec<(UnresolvedEntry, StoreError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.result {
                Ok(()) => None,
                Err(error) => Some((outcome.entry, error.clone())),
            })
            .collect()
    }

    pub fn first_error(&self) -> Option<&StoreError> {
        self.outcomes
            .iter()
            .find_map(|outcome| outcome.result.as_ref().err())
    }

    pub fn is_success(&self) -> bool {
        self.first_error().is_none()
    }
}

/// Submits corrective intervals. Never retries; the controller owns that.
pub struct CorrectiveWriter<S>
where
    S: HealthStore,
{
    store: Arc<S>,
    strategy: WriteStrategy,
}

impl<S> CorrectiveWriter<S>
where
    S: HealthStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            strategy: WriteStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: WriteStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> WriteStrategy {
        self.strategy
    }

    pub async fn write(&self, entry: &UnresolvedEntry) -> Result<(), StoreError> {
        self.store.save(&Interval::corrective_for(entry)).await
    }

    pub async fn write_all(&self, entries: &[UnresolvedEntry]) -> WriteReport {
        if entries.is_empty() {
            return WriteReport::default();
        }
        match self.strategy {
            WriteStrategy::Batch => {
                let records: Vec<Interval> =
                    entries.iter().map(Interval::corrective_for).collect();
                let verdict = self.store.save_batch(&records).await;
                WriteReport {
                    outcomes: entries
                        .iter()
                        .map(|entry| WriteOutcome {
                            entry: *entry,
                            result: verdict.clone(),
                        })
                        .collect(),
                }
            }
            WriteStrategy::PerItem => {
                let mut outcomes = Vec::with_capacity(entries.len());
                for entry in entries {
                    outcomes.push(WriteOutcome {
                        entry: *entry,
                        result: self.write(entry).await,
                    });
                }
                WriteReport { outcomes }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IntervalCategory;
    use crate::infrastructure::health_store::{AccessRequest, InMemoryHealthStore, IntervalQuery};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 5, hour, 0, 0)
            .single()
            .expect("valid time")
    }

    fn entries() -> Vec<UnresolvedEntry> {
        vec![
            UnresolvedEntry {
                start: at(5),
                end: at(6),
            },
            UnresolvedEntry {
                start: at(1),
                end: at(2),
            },
        ]
    }

    /// Rejects saves whose start matches the configured hour.
    struct RejectingStore {
        reject_start: DateTime<Utc>,
        saved: Mutex<Vec<Interval>>,
    }

    #[async_trait]
    impl HealthStore for RejectingStore {
        fn is_available(&self) -> bool {
            true
        }

        async fn request_access(&self, _request: &AccessRequest) -> Result<(), StoreError> {
            Ok(())
        }

        async fn query(&self, _query: &IntervalQuery) -> Result<Vec<Interval>, StoreError> {
            Ok(self.saved.lock().expect("saved lock").clone())
        }

        async fn save(&self, record: &Interval) -> Result<(), StoreError> {
            if record.start == self.reject_start {
                return Err(StoreError::Save("write not authorized".to_string()));
            }
            self.saved.lock().expect("saved lock").push(record.clone());
            Ok(())
        }

        async fn save_batch(&self, _records: &[Interval]) -> Result<(), StoreError> {
            Err(StoreError::Save("batch not supported".to_string()))
        }
    }

    #[tokio::test]
    async fn single_write_creates_matching_corrective() {
        let store = Arc::new(InMemoryHealthStore::default());
        let writer = CorrectiveWriter::new(Arc::clone(&store));
        let entry = entries()[0];

        writer.write(&entry).await.expect("write succeeds");

        let records = store.records().expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), entry.key());
        assert_eq!(records[0].category, IntervalCategory::Corrective);
    }

    #[tokio::test]
    async fn batch_strategy_uses_one_store_call() {
        let store = Arc::new(InMemoryHealthStore::default());
        let writer = CorrectiveWriter::new(Arc::clone(&store));

        let report = writer.write_all(&entries()).await;

        assert!(report.is_success());
        assert_eq!(report.succeeded(), entries());
        assert_eq!(store.batch_calls().expect("batch calls"), 1);
        assert_eq!(store.save_calls().expect("save calls"), 0);
        assert_eq!(store.records().expect("records").len(), 2);
    }

    #[tokio::test]
    async fn rejected_batch_fails_every_entry() {
        let store = Arc::new(InMemoryHealthStore::default());
        store
            .set_save_failure(Some("sharing denied"))
            .expect("toggle failure");
        let writer = CorrectiveWriter::new(Arc::clone(&store));

        let report = writer.write_all(&entries()).await;

        assert_eq!(report.failed().len(), 2);
        assert!(report.succeeded().is_empty());
        assert!(store.records().expect("records").is_empty());
    }

    #[tokio::test]
    async fn per_item_strategy_reports_each_entry() {
        let store = Arc::new(RejectingStore {
            reject_start: at(5),
            saved: Mutex::new(Vec::new()),
        });
        let writer =
            CorrectiveWriter::new(Arc::clone(&store)).with_strategy(WriteStrategy::PerItem);

        let report = writer.write_all(&entries()).await;

        assert_eq!(report.succeeded(), vec![entries()[1]]);
        let failed = report.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, entries()[0]);
        assert!(matches!(report.first_error(), Some(StoreError::Save(_))));
        assert_eq!(store.saved.lock().expect("saved lock").len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let store = Arc::new(InMemoryHealthStore::default());
        let writer = CorrectiveWriter::new(Arc::clone(&store));
        let report = writer.write_all(&[]).await;
        assert!(report.outcomes.is_empty());
        assert_eq!(store.batch_calls().expect("batch calls"), 0);
    }
}
