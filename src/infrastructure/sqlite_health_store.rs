use crate::domain::models::{Interval, IntervalCategory};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::health_store::{
    AccessRequest, HealthStore, IntervalQuery, SortOrder, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Creates the interval table on a fresh database file.
pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

// Fixed-width UTC text keeps lexical order equal to chronological order.
fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| StoreError::Query(format!("invalid intervals.{field} '{raw}': {error}")))
}

#[derive(Debug, Clone)]
pub struct SqliteHealthStore {
    db_path: PathBuf,
}

impl SqliteHealthStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable);
        }
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|error| StoreError::Query(format!("failed opening health store: {error}")))
    }

    fn insert(connection: &Connection, record: &Interval) -> Result<(), StoreError> {
        record.validate().map_err(StoreError::Save)?;
        connection
            .execute(
                "INSERT INTO intervals (start_at, end_at, category) VALUES (?1, ?2, ?3)",
                params![
                    encode_timestamp(record.start),
                    encode_timestamp(record.end),
                    record.category.as_str()
                ],
            )
            .map_err(|error| StoreError::Save(error.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl HealthStore for SqliteHealthStore {
    fn is_available(&self) -> bool {
        self.db_path.is_file()
    }

    async fn request_access(&self, request: &AccessRequest) -> Result<(), StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable);
        }
        if request.write.contains(&IntervalCategory::Primary) {
            return Err(StoreError::AuthorizationDenied(
                "primary intervals are read-only".to_string(),
            ));
        }
        Ok(())
    }

    async fn query(&self, query: &IntervalQuery) -> Result<Vec<Interval>, StoreError> {
        let connection = self.connect()?;
        let order = match query.sort {
            SortOrder::EndDescending => "end_at DESC, id ASC",
        };
        let sql = match query.limit {
            Some(limit) => format!(
                "SELECT start_at, end_at, category FROM intervals ORDER BY {order} LIMIT {limit}"
            ),
            None => format!("SELECT start_at, end_at, category FROM intervals ORDER BY {order}"),
        };

        let mut statement = connection
            .prepare(&sql)
            .map_err(|error| StoreError::Query(error.to_string()))?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|error| StoreError::Query(error.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (start_raw, end_raw, category_raw) =
                row.map_err(|error| StoreError::Query(error.to_string()))?;
            let category = IntervalCategory::parse(&category_raw).ok_or_else(|| {
                StoreError::Query(format!("unknown interval category '{category_raw}'"))
            })?;
            let record = Interval::new(
                decode_timestamp(&start_raw, "start_at")?,
                decode_timestamp(&end_raw, "end_at")?,
                category,
            )
            .map_err(StoreError::Query)?;
            records.push(record);
        }
        Ok(records)
    }

    async fn save(&self, record: &Interval) -> Result<(), StoreError> {
        let connection = self.connect()?;
        Self::insert(&connection, record)
    }

    async fn save_batch(&self, records: &[Interval]) -> Result<(), StoreError> {
        let mut connection = self.connect()?;
        let transaction = connection
            .transaction()
            .map_err(|error| StoreError::Save(error.to_string()))?;
        for record in records {
            Self::insert(&transaction, record)?;
        }
        transaction
            .commit()
            .map_err(|error| StoreError::Save(error.to_string()))
    }
}
