use axum::{extract::State, Json};
use cadence_core::error::CoreError;
use cadence_core::materialization::{BatchOptions, MaterializationSummary};
use cadence_core::validation::ValidationErrors;

use crate::dto::{ApiResponse, ProcessRequest};
use crate::error::ApiError;
use crate::routes::auth::AdminAuth;
use crate::state::AppState;

/// Runs a materialization pass on demand. Partial failures are reported in
/// the summary; only infrastructure failures turn into a 500.
pub async fn process_recurring_tasks(
    State(state): State<AppState>,
    _admin: AdminAuth,
    body: Option<Json<ProcessRequest>>,
) -> Result<Json<ApiResponse<MaterializationSummary>>, ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    if request.max_tasks == Some(0) {
        let mut errors = ValidationErrors::default();
        errors.push("maxTasks", "must be at least 1");
        return Err(CoreError::Validation(errors).into());
    }

    let options = BatchOptions {
        dry_run: request.dry_run,
        max_tasks: request.max_tasks,
        definition_ids: request.recurring_task_ids,
        process_until: request.process_until,
    };
    let summary = state.run_pass(&options).await?;

    let message = if summary.dry_run {
        format!("Dry run: {} task(s) would be created", summary.tasks_created)
    } else {
        format!("{} task(s) created", summary.tasks_created)
    };
    Ok(Json(ApiResponse::ok(summary).with_message(message)))
}
