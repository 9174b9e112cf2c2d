use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::dto::ApiResponse;
use crate::state::AppState;

pub mod auth;
pub mod process;
pub mod recurring;

/// Builds the HTTP surface of the service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/recurring-tasks",
            post(recurring::create_recurring_task).get(recurring::list_recurring_tasks),
        )
        .route(
            "/api/recurring-tasks/process",
            post(process::process_recurring_tasks),
        )
        .route(
            "/api/recurring-tasks/{id}",
            get(recurring::get_recurring_task)
                .patch(recurring::update_recurring_task)
                .delete(recurring::delete_recurring_task),
        )
        .route(
            "/api/recurring-tasks/{id}/pause",
            post(recurring::pause_recurring_task),
        )
        .route(
            "/api/recurring-tasks/{id}/resume",
            post(recurring::resume_recurring_task),
        )
        .route(
            "/api/recurring-tasks/{id}/upcoming",
            get(recurring::upcoming_occurrences),
        )
        .route(
            "/api/recurring-tasks/{id}/tasks",
            get(recurring::generated_tasks),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let database = if state.repo.pool().is_closed() {
        "closed"
    } else {
        "ok"
    };
    Json(ApiResponse::ok(json!({
        "status": "ok",
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

#[cfg(test)]
mod tests {
    use super::auth::{AdminAuth, CurrentUser};
    use super::*;
    use crate::config::Config;
    use crate::dto::{
        CreateRecurringTaskRequest, DeleteQuery, ListQuery, PageQuery, PauseRequest,
        ProcessRequest, UpcomingQuery, UpdateRecurringTaskRequest,
    };
    use crate::error::ApiError;
    use axum::extract::{FromRequestParts, Path, Query};
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use cadence_core::db;
    use cadence_core::error::CoreError;
    use cadence_core::repository::SqliteRepository;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn setup_state(admin_token: Option<&str>) -> (AppState, TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = db::establish_connection(db_path.to_str().unwrap())
            .await
            .unwrap();
        let config = Config {
            admin_token: admin_token.map(str::to_string),
            ..Config::default()
        };
        (AppState::new(SqliteRepository::new(pool), config), temp_dir)
    }

    fn daily_request(start_days_ago: i64) -> CreateRecurringTaskRequest {
        let start = Utc::now() - Duration::days(start_days_ago);
        serde_json::from_value(json!({
            "title": "Water the plants",
            "tags": ["home"],
            "recurrence": {
                "frequency": "daily",
                "startDate": start.to_rfc3339(),
            }
        }))
        .unwrap()
    }

    async fn create(state: &AppState, user: Uuid, request: CreateRecurringTaskRequest) -> Uuid {
        let (status, Json(body)) = recurring::create_recurring_task(
            State(state.clone()),
            CurrentUser(user),
            Json(request),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        body.data.unwrap().definition.id
    }

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[tokio::test]
    async fn create_then_fetch_returns_the_next_occurrence() {
        let (state, _dir) = setup_state(None).await;
        let user = Uuid::now_v7();
        let id = create(&state, user, daily_request(0)).await;

        let Json(body) =
            recurring::get_recurring_task(State(state.clone()), CurrentUser(user), Path(id))
                .await
                .unwrap();
        let view = body.data.unwrap();
        assert_eq!(view.definition.template.title, "Water the plants");
        assert!(view.next_occurrence_at.is_some());
    }

    #[tokio::test]
    async fn other_users_definitions_are_not_found() {
        let (state, _dir) = setup_state(None).await;
        let id = create(&state, Uuid::now_v7(), daily_request(0)).await;

        let err = recurring::get_recurring_task(
            State(state.clone()),
            CurrentUser(Uuid::now_v7()),
            Path(id),
        )
        .await
        .unwrap_err();
        assert_eq!(status_of(err), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_rule_is_a_bad_request() {
        let (state, _dir) = setup_state(None).await;
        let request: CreateRecurringTaskRequest = serde_json::from_value(json!({
            "title": "Broken",
            "recurrence": {
                "frequency": "weekly",
                "interval": 0,
                "daysOfWeek": [9],
                "startDate": "2024-01-01T00:00:00Z",
            }
        }))
        .unwrap();

        let err = recurring::create_recurring_task(
            State(state.clone()),
            CurrentUser(Uuid::now_v7()),
            Json(request),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Core(CoreError::Validation(_))));
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_only_shows_the_callers_definitions() {
        let (state, _dir) = setup_state(None).await;
        let user = Uuid::now_v7();
        create(&state, user, daily_request(0)).await;
        create(&state, user, daily_request(1)).await;
        create(&state, Uuid::now_v7(), daily_request(0)).await;

        let Json(body) = recurring::list_recurring_tasks(
            State(state.clone()),
            CurrentUser(user),
            Query(ListQuery::default()),
        )
        .await
        .unwrap();
        let page = body.data.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|view| view.definition.owner_id == user));
    }

    #[tokio::test]
    async fn update_pause_and_resume() {
        let (state, _dir) = setup_state(None).await;
        let user = Uuid::now_v7();
        let id = create(&state, user, daily_request(0)).await;

        let patch: UpdateRecurringTaskRequest =
            serde_json::from_value(json!({ "title": "Water the garden" })).unwrap();
        let Json(body) = recurring::update_recurring_task(
            State(state.clone()),
            CurrentUser(user),
            Path(id),
            Json(patch),
        )
        .await
        .unwrap();
        assert_eq!(body.data.unwrap().definition.template.title, "Water the garden");

        let until = Utc::now() + Duration::days(3);
        let Json(body) = recurring::pause_recurring_task(
            State(state.clone()),
            CurrentUser(user),
            Path(id),
            Some(Json(PauseRequest {
                pause_until: Some(until),
            })),
        )
        .await
        .unwrap();
        let view = body.data.unwrap();
        assert!(!view.definition.active);
        assert!(view.next_occurrence_at.is_none());

        let Json(body) =
            recurring::resume_recurring_task(State(state.clone()), CurrentUser(user), Path(id))
                .await
                .unwrap();
        let view = body.data.unwrap();
        assert!(view.definition.active);
        assert_eq!(view.definition.paused_until, None);
    }

    #[tokio::test]
    async fn pause_in_the_past_is_rejected() {
        let (state, _dir) = setup_state(None).await;
        let user = Uuid::now_v7();
        let id = create(&state, user, daily_request(0)).await;

        let err = recurring::pause_recurring_task(
            State(state.clone()),
            CurrentUser(user),
            Path(id),
            Some(Json(PauseRequest {
                pause_until: Some(Utc::now() - Duration::hours(1)),
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upcoming_respects_count_and_window() {
        let (state, _dir) = setup_state(None).await;
        let user = Uuid::now_v7();
        let request: CreateRecurringTaskRequest = serde_json::from_value(json!({
            "title": "Standup",
            "recurrence": {
                "frequency": "daily",
                "startDate": "2024-01-01T09:00:00Z",
            }
        }))
        .unwrap();
        let id = create(&state, user, request).await;

        let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let Json(body) = recurring::upcoming_occurrences(
            State(state.clone()),
            CurrentUser(user),
            Path(id),
            Query(UpcomingQuery {
                count: Some(3),
                from_date: Some(from),
                to_date: None,
            }),
        )
        .await
        .unwrap();
        let occurrences = body.data.unwrap().occurrences;
        assert_eq!(
            occurrences,
            vec![
                Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 3, 9, 0, 0).unwrap(),
            ]
        );

        let err = recurring::upcoming_occurrences(
            State(state.clone()),
            CurrentUser(user),
            Path(id),
            Query(UpcomingQuery {
                count: Some(0),
                from_date: Some(from),
                to_date: Some(from - Duration::days(1)),
            }),
        )
        .await
        .unwrap_err();
        match err {
            ApiError::Core(CoreError::Validation(errors)) => assert_eq!(errors.errors().len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn delete_needs_cascade_once_tasks_exist() {
        let (state, _dir) = setup_state(Some("secret")).await;
        let user = Uuid::now_v7();
        let id = create(&state, user, daily_request(2)).await;

        let Json(body) = process::process_recurring_tasks(
            State(state.clone()),
            AdminAuth,
            Some(Json(ProcessRequest {
                recurring_task_ids: Some(vec![id]),
                ..ProcessRequest::default()
            })),
        )
        .await
        .unwrap();
        let summary = body.data.unwrap();
        assert!(summary.tasks_created >= 2);

        let Json(body) = recurring::generated_tasks(
            State(state.clone()),
            CurrentUser(user),
            Path(id),
            Query(PageQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(body.data.unwrap().total as usize, summary.tasks_created);

        let err = recurring::delete_recurring_task(
            State(state.clone()),
            CurrentUser(user),
            Path(id),
            Query(DeleteQuery { cascade: false }),
        )
        .await
        .unwrap_err();
        assert_eq!(status_of(err), StatusCode::CONFLICT);

        let Json(body) = recurring::delete_recurring_task(
            State(state.clone()),
            CurrentUser(user),
            Path(id),
            Query(DeleteQuery { cascade: true }),
        )
        .await
        .unwrap();
        assert_eq!(body.data.unwrap().deleted_tasks as usize, summary.tasks_created);
    }

    #[tokio::test]
    async fn process_rejects_a_zero_budget() {
        let (state, _dir) = setup_state(Some("secret")).await;
        let err = process::process_recurring_tasks(
            State(state),
            AdminAuth,
            Some(Json(ProcessRequest {
                max_tasks: Some(0),
                ..ProcessRequest::default()
            })),
        )
        .await
        .unwrap_err();
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn admin_auth_checks_the_bearer_token() {
        let (state, _dir) = setup_state(Some("secret")).await;

        let request = Request::builder()
            .header("authorization", "Bearer secret")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        assert!(AdminAuth::from_request_parts(&mut parts, &state).await.is_ok());

        let request = Request::builder()
            .header("authorization", "Bearer wrong")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let err = AdminAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_endpoints_are_disabled_without_a_token() {
        let (state, _dir) = setup_state(Some("")).await;
        let request = Request::builder()
            .header("authorization", "Bearer ")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let err = AdminAuth::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(status_of(err), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_user_header_is_unauthenticated() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = CurrentUser::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(status_of(err), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_reports_the_database() {
        let (state, _dir) = setup_state(None).await;
        let Json(body) = health(State(state)).await;
        assert_eq!(body.data.unwrap()["database"], "ok");
    }
}
