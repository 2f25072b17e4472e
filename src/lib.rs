pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    clear_selection_impl, fix_all_impl, fix_selected_impl, refresh_impl, select_entry_impl,
    session_state_impl,
};
use infrastructure::health_store::HealthStore;

pub use application::commands::{
    AppState, EntryResponse, ErrorResponse, FailedWriteResponse, FixResponse, SessionResponse,
};
pub use domain::models::{ErrorKind, Interval, IntervalCategory, UnresolvedEntry};
pub use domain::reconcile::reconcile;

// Host-facing command surface. Errors are logged to the workspace command log
// and returned as display strings.

pub fn session_state<S: HealthStore>(state: &AppState<S>) -> Result<SessionResponse, String> {
    session_state_impl(state).map_err(|error| state.command_error("session_state", &error))
}

pub async fn refresh<S: HealthStore>(state: &AppState<S>) -> Result<SessionResponse, String> {
    refresh_impl(state)
        .await
        .map_err(|error| state.command_error("refresh", &error))
}

pub fn select_entry<S: HealthStore>(
    state: &AppState<S>,
    start: String,
    end: String,
) -> Result<SessionResponse, String> {
    select_entry_impl(state, start, end)
        .map_err(|error| state.command_error("select_entry", &error))
}

pub fn clear_selection<S: HealthStore>(state: &AppState<S>) -> Result<SessionResponse, String> {
    clear_selection_impl(state).map_err(|error| state.command_error("clear_selection", &error))
}

pub async fn fix_selected<S: HealthStore>(state: &AppState<S>) -> Result<FixResponse, String> {
    fix_selected_impl(state)
        .await
        .map_err(|error| state.command_error("fix_selected", &error))
}

pub async fn fix_all<S: HealthStore>(state: &AppState<S>) -> Result<FixResponse, String> {
    fix_all_impl(state)
        .await
        .map_err(|error| state.command_error("fix_all", &error))
}
