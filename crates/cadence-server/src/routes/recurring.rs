use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use cadence_core::error::CoreError;
use cadence_core::models::{DefinitionFilter, Page, RecurringTaskDefinition, Task};
use cadence_core::recurrence::RecurrenceManager;
use cadence_core::repository::{RecurringTaskRepository, TaskRepository};
use cadence_core::validation::ValidationErrors;
use chrono::Utc;
use uuid::Uuid;

use crate::dto::{
    paging, ApiResponse, CreateRecurringTaskRequest, DeleteQuery, DeleteResponse, ListQuery,
    PageQuery, PauseRequest, RecurringTaskView, UpcomingQuery, UpcomingResponse,
    UpdateRecurringTaskRequest, DEFAULT_UPCOMING_COUNT, MAX_UPCOMING_COUNT,
};
use crate::error::ApiError;
use crate::routes::auth::CurrentUser;
use crate::state::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Loads a definition owned by `user`. Other users' definitions are
/// reported as missing.
async fn load_owned(
    state: &AppState,
    user: Uuid,
    id: Uuid,
) -> Result<RecurringTaskDefinition, ApiError> {
    state
        .repo
        .find_definition_by_id(id)
        .await?
        .filter(|definition| definition.owner_id == user)
        .ok_or_else(|| {
            ApiError::Core(CoreError::NotFound(format!(
                "Recurring task with id {} not found",
                id
            )))
        })
}

pub async fn create_recurring_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateRecurringTaskRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RecurringTaskView>>), ApiError> {
    let definition = state.repo.create_definition(request.into_new(user)).await?;
    tracing::info!(id = %definition.id, owner = %user, frequency = %definition.rule.frequency, "recurring task created");

    let view = RecurringTaskView::new(definition, Utc::now());
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(view).with_message("Recurring task created")),
    ))
}

pub async fn list_recurring_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Page<RecurringTaskView>> {
    let (page, limit) = paging(query.page, query.limit);
    let filter = DefinitionFilter {
        owner_id: Some(user),
        project_id: query.project_id,
        active: query.active,
        page,
        limit,
    };

    let now = Utc::now();
    let definitions = state.repo.find_definitions(&filter).await?;
    Ok(Json(ApiResponse::ok(
        definitions.map(|definition| RecurringTaskView::new(definition, now)),
    )))
}

pub async fn get_recurring_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<RecurringTaskView> {
    let definition = load_owned(&state, user, id).await?;
    Ok(Json(ApiResponse::ok(RecurringTaskView::new(
        definition,
        Utc::now(),
    ))))
}

pub async fn update_recurring_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRecurringTaskRequest>,
) -> ApiResult<RecurringTaskView> {
    load_owned(&state, user, id).await?;
    let definition = state.repo.update_definition(id, request.into()).await?;
    tracing::info!(%id, "recurring task updated");

    Ok(Json(
        ApiResponse::ok(RecurringTaskView::new(definition, Utc::now()))
            .with_message("Recurring task updated"),
    ))
}

pub async fn delete_recurring_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<DeleteResponse> {
    load_owned(&state, user, id).await?;
    let deleted_tasks = state.repo.delete_definition(id, query.cascade).await?;
    tracing::info!(%id, cascade = query.cascade, deleted_tasks, "recurring task deleted");

    Ok(Json(
        ApiResponse::ok(DeleteResponse { deleted_tasks }).with_message("Recurring task deleted"),
    ))
}

pub async fn pause_recurring_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    body: Option<Json<PauseRequest>>,
) -> ApiResult<RecurringTaskView> {
    load_owned(&state, user, id).await?;
    let pause_until = body.and_then(|Json(request)| request.pause_until);
    let definition = state.repo.pause_definition(id, pause_until).await?;
    tracing::info!(%id, ?pause_until, "recurring task paused");

    Ok(Json(
        ApiResponse::ok(RecurringTaskView::new(definition, Utc::now()))
            .with_message("Recurring task paused"),
    ))
}

pub async fn resume_recurring_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<RecurringTaskView> {
    load_owned(&state, user, id).await?;
    let definition = state.repo.resume_definition(id).await?;
    tracing::info!(%id, "recurring task resumed");

    Ok(Json(
        ApiResponse::ok(RecurringTaskView::new(definition, Utc::now()))
            .with_message("Recurring task resumed"),
    ))
}

/// Previews upcoming occurrences. Nothing is written.
pub async fn upcoming_occurrences(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<UpcomingResponse> {
    let count = query.count.unwrap_or(DEFAULT_UPCOMING_COUNT);
    let from = query.from_date.unwrap_or_else(Utc::now);

    let mut errors = ValidationErrors::default();
    if !(1..=MAX_UPCOMING_COUNT).contains(&count) {
        errors.push("count", format!("must be between 1 and {}", MAX_UPCOMING_COUNT));
    }
    if query.to_date.is_some_and(|to| to < from) {
        errors.push("toDate", "must not be before fromDate");
    }
    if !errors.is_empty() {
        return Err(CoreError::Validation(errors).into());
    }

    let definition = load_owned(&state, user, id).await?;
    let occurrences = RecurrenceManager::new(definition.rule).upcoming(from, query.to_date, count);

    Ok(Json(ApiResponse::ok(UpcomingResponse {
        recurring_task_id: id,
        occurrences,
    })))
}

pub async fn generated_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Page<Task>> {
    load_owned(&state, user, id).await?;
    let (page, limit) = paging(query.page, query.limit);
    let tasks = state.repo.find_tasks_for_definition(id, page, limit).await?;
    Ok(Json(ApiResponse::ok(tasks)))
}
