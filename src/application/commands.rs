use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult};
use crate::application::corrective_writer::WriteReport;
use crate::application::session::{Completion, SessionSnapshot};
use crate::application::sync_controller::{RefreshOutcome, SyncController};
use crate::domain::models::{ErrorKind, UnresolvedEntry};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::health_store::HealthStore;
use crate::infrastructure::sqlite_health_store::SqliteHealthStore;
use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const COMMAND_LOG: &str = "commands.log";

pub struct AppState<S = SqliteHealthStore>
where
    S: HealthStore,
{
    workspace_root: PathBuf,
    config: AppConfig,
    logs_dir: PathBuf,
    controller: SyncController<S>,
    log_guard: Mutex<()>,
}

impl AppState<SqliteHealthStore> {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let store = Arc::new(SqliteHealthStore::new(&bootstrap.store_path));
        Ok(Self::from_parts(bootstrap, store))
    }
}

impl<S> AppState<S>
where
    S: HealthStore,
{
    /// Bootstraps the workspace but reads and writes through `store`.
    pub fn with_store(workspace_root: PathBuf, store: Arc<S>) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Ok(Self::from_parts(bootstrap, store))
    }

    fn from_parts(bootstrap: BootstrapResult, store: Arc<S>) -> Self {
        let controller =
            SyncController::new(store).with_write_strategy(bootstrap.config.write_strategy);
        Self {
            workspace_root: bootstrap.workspace_root,
            config: bootstrap.config,
            logs_dir: bootstrap.logs_dir,
            controller,
            log_guard: Mutex::new(()),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn controller(&self) -> &SyncController<S> {
        &self.controller
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join(COMMAND_LOG);
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EntryResponse {
    pub start: String,
    pub end: String,
    pub label: String,
}

impl EntryResponse {
    fn from_entry(entry: &UnresolvedEntry, time_zone: Tz) -> Self {
        Self {
            start: entry.start.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            end: entry.end.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            label: entry.label(time_zone),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
    pub recoverable: bool,
}

impl From<ErrorKind> for ErrorResponse {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            message: kind.message().to_string(),
            recoverable: kind.is_recoverable(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionResponse {
    pub phase: String,
    pub entries: Vec<EntryResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<EntryResponse>,
    pub busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorResponse>,
    pub can_refresh: bool,
    pub can_select: bool,
    pub can_fix: bool,
    pub can_fix_all: bool,
}

impl SessionResponse {
    fn from_snapshot(snapshot: &SessionSnapshot, time_zone: Tz) -> Self {
        Self {
            phase: snapshot.phase.as_str().to_string(),
            entries: snapshot
                .entries
                .iter()
                .map(|entry| EntryResponse::from_entry(entry, time_zone))
                .collect(),
            selection: snapshot
                .selection
                .as_ref()
                .map(|entry| EntryResponse::from_entry(entry, time_zone)),
            busy: snapshot.busy,
            last_error: snapshot.last_error.map(ErrorResponse::from),
            can_refresh: snapshot.can_refresh,
            can_select: snapshot.can_select,
            can_fix: snapshot.can_fix,
            can_fix_all: snapshot.can_fix_all,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedWriteResponse {
    pub entry: EntryResponse,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FixResponse {
    pub written: Vec<EntryResponse>,
    pub failed: Vec<FailedWriteResponse>,
    pub session: SessionResponse,
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidInput(format!("{field} must be RFC3339: {error}")))
}

fn log_refresh<S: HealthStore>(state: &AppState<S>, command: &str, outcome: &RefreshOutcome) {
    if outcome.completion == Completion::Stale {
        state.log_info(command, "discarded result of a superseded fetch");
        return;
    }
    match (&outcome.error, outcome.snapshot.last_error) {
        (Some(error), Some(kind)) => state.log_error(
            command,
            &format!("fetch failed kind={} error={error}", kind.as_str()),
        ),
        _ => state.log_info(
            command,
            &format!("reconciled unresolved={}", outcome.snapshot.entries.len()),
        ),
    }
}

fn fix_response<S: HealthStore>(
    state: &AppState<S>,
    command: &str,
    report: &WriteReport,
    resync: &RefreshOutcome,
) -> FixResponse {
    let time_zone = state.config.time_zone;
    let written = report.succeeded();
    let failed = report.failed();
    if failed.is_empty() {
        state.log_info(command, &format!("wrote corrective records={}", written.len()));
    } else {
        state.log_error(
            command,
            &format!(
                "corrective write failed written={} failed={} first_error={}",
                written.len(),
                failed.len(),
                failed[0].1
            ),
        );
    }
    log_refresh(state, command, resync);

    FixResponse {
        written: written
            .iter()
            .map(|entry| EntryResponse::from_entry(entry, time_zone))
            .collect(),
        failed: failed
            .iter()
            .map(|(entry, error)| FailedWriteResponse {
                entry: EntryResponse::from_entry(entry, time_zone),
                reason: error.to_string(),
            })
            .collect(),
        session: SessionResponse::from_snapshot(&resync.snapshot, time_zone),
    }
}

pub fn session_state_impl<S: HealthStore>(
    state: &AppState<S>,
) -> Result<SessionResponse, InfraError> {
    let snapshot = state.controller.snapshot()?;
    Ok(SessionResponse::from_snapshot(&snapshot, state.config.time_zone))
}

pub async fn refresh_impl<S: HealthStore>(
    state: &AppState<S>,
) -> Result<SessionResponse, InfraError> {
    let outcome = state.controller.refresh().await?;
    log_refresh(state, "refresh", &outcome);
    Ok(SessionResponse::from_snapshot(
        &outcome.snapshot,
        state.config.time_zone,
    ))
}

pub fn select_entry_impl<S: HealthStore>(
    state: &AppState<S>,
    start: String,
    end: String,
) -> Result<SessionResponse, InfraError> {
    let entry = UnresolvedEntry {
        start: parse_timestamp(&start, "start")?,
        end: parse_timestamp(&end, "end")?,
    };
    let snapshot = state.controller.select(&entry)?;
    Ok(SessionResponse::from_snapshot(&snapshot, state.config.time_zone))
}

pub fn clear_selection_impl<S: HealthStore>(
    state: &AppState<S>,
) -> Result<SessionResponse, InfraError> {
    let snapshot = state.controller.clear_selection()?;
    Ok(SessionResponse::from_snapshot(&snapshot, state.config.time_zone))
}

pub async fn fix_selected_impl<S: HealthStore>(
    state: &AppState<S>,
) -> Result<FixResponse, InfraError> {
    let outcome = state.controller.fix().await?;
    Ok(fix_response(state, "fix_selected", &outcome.report, &outcome.resync))
}

pub async fn fix_all_impl<S: HealthStore>(state: &AppState<S>) -> Result<FixResponse, InfraError> {
    let outcome = state.controller.fix_all().await?;
    Ok(fix_response(state, "fix_all", &outcome.report, &outcome.resync))
}
