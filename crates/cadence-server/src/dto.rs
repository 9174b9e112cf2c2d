//! JSON shapes of the HTTP API. Everything is camelCase on the wire.

use cadence_core::models::{
    Attachment, ChecklistItem, Frequency, NewRecurringTaskData, RecurrenceRule,
    RecurringTaskDefinition, TaskPriority, TaskTemplate, UpdateRecurringTaskData,
};
use cadence_core::recurrence::RecurrenceManager;
use cadence_core::validation::FieldError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_UPCOMING_COUNT: usize = 10;
pub const MAX_UPCOMING_COUNT: usize = 100;

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>, errors: Option<Vec<FieldError>>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecurringTaskRequest {
    #[serde(flatten)]
    pub template: TaskTemplate,
    pub recurrence: RecurrenceRule,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub workspace_id: Option<Uuid>,
    #[serde(default)]
    pub team_id: Option<Uuid>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl CreateRecurringTaskRequest {
    pub fn into_new(self, owner_id: Uuid) -> NewRecurringTaskData {
        NewRecurringTaskData {
            owner_id,
            project_id: self.project_id,
            workspace_id: self.workspace_id,
            team_id: self.team_id,
            template: self.template,
            rule: self.recurrence,
            active: self.active.unwrap_or(true),
        }
    }
}

/// Rule fields of a PATCH body; absent fields keep their value.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePatch {
    pub frequency: Option<Frequency>,
    pub interval: Option<u32>,
    pub days_of_week: Option<Vec<u8>>,
    pub days_of_month: Option<Vec<u8>>,
    pub months_of_year: Option<Vec<u8>>,
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

/// PATCH body. `null` clears a nullable field, omitting it leaves it alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecurringTaskRequest {
    pub title: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub estimated_hours: Option<Option<f64>>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub attachments: Option<Vec<Attachment>>,
    pub recurrence: Option<RecurrencePatch>,
    pub active: Option<bool>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub project_id: Option<Option<Uuid>>,
}

impl From<UpdateRecurringTaskRequest> for UpdateRecurringTaskData {
    fn from(request: UpdateRecurringTaskRequest) -> Self {
        let recurrence = request.recurrence.unwrap_or_default();
        Self {
            title: request.title,
            description: request.description,
            priority: request.priority,
            tags: request.tags,
            estimated_hours: request.estimated_hours,
            checklist: request.checklist,
            attachments: request.attachments,
            frequency: recurrence.frequency,
            interval: recurrence.interval,
            days_of_week: recurrence.days_of_week,
            days_of_month: recurrence.days_of_month,
            months_of_year: recurrence.months_of_year,
            start_date: recurrence.start_date,
            end_date: recurrence.end_date,
            active: request.active,
            project_id: request.project_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseRequest {
    pub pause_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub active: Option<bool>,
    pub project_id: Option<Uuid>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingQuery {
    pub count: Option<usize>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingResponse {
    pub recurring_task_id: Uuid,
    pub occurrences: Vec<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted_tasks: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    #[serde(default)]
    pub dry_run: bool,
    pub max_tasks: Option<usize>,
    pub recurring_task_ids: Option<Vec<Uuid>>,
    pub process_until: Option<DateTime<Utc>>,
}

/// A definition as returned by the API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTaskView {
    #[serde(flatten)]
    pub definition: RecurringTaskDefinition,
    pub next_occurrence_at: Option<DateTime<Utc>>,
}

impl RecurringTaskView {
    pub fn new(definition: RecurringTaskDefinition, now: DateTime<Utc>) -> Self {
        let next_occurrence_at = if definition.is_active_at(now) {
            RecurrenceManager::new(definition.rule.clone()).next_occurrence_after(now)
        } else {
            None
        };
        Self {
            definition,
            next_occurrence_at,
        }
    }
}

/// Clamps paging parameters to `1..` and `1..=MAX_PAGE_LIMIT`.
pub fn paging(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    (page, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn create_request_splits_template_and_rule() {
        let request: CreateRecurringTaskRequest = serde_json::from_value(json!({
            "title": "Pay rent",
            "priority": "high",
            "tags": ["home"],
            "recurrence": {
                "frequency": "monthly",
                "daysOfMonth": [1],
                "startDate": "2024-01-01T09:00:00Z"
            }
        }))
        .unwrap();

        let new = request.into_new(Uuid::nil());
        assert_eq!(new.template.title, "Pay rent");
        assert_eq!(new.template.priority, TaskPriority::High);
        assert_eq!(new.rule.frequency, Frequency::Monthly);
        assert_eq!(new.rule.interval, 1);
        assert_eq!(new.rule.days_of_month, vec![1]);
        assert!(new.active);
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let request: UpdateRecurringTaskRequest = serde_json::from_value(json!({
            "description": null,
            "recurrence": { "interval": 3, "endDate": null }
        }))
        .unwrap();

        let update = UpdateRecurringTaskData::from(request);
        assert_eq!(update.description, Some(None));
        assert_eq!(update.estimated_hours, None);
        assert_eq!(update.interval, Some(3));
        assert_eq!(update.end_date, Some(None));
        assert_eq!(update.title, None);
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(paging(None, None), (1, DEFAULT_PAGE_LIMIT));
        assert_eq!(paging(Some(0), Some(500)), (1, MAX_PAGE_LIMIT));
        assert_eq!(paging(Some(3), Some(0)), (3, 1));
    }

    #[test]
    fn elapsed_pause_still_shows_the_next_occurrence() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let mut definition = RecurringTaskDefinition {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            project_id: None,
            workspace_id: None,
            team_id: None,
            template: TaskTemplate {
                title: "Standup".to_string(),
                ..TaskTemplate::default()
            },
            rule: RecurrenceRule::daily(start),
            active: false,
            paused_until: Some(now - chrono::Duration::hours(1)),
            last_processed_at: None,
            created_at: start,
            updated_at: start,
        };

        let view = RecurringTaskView::new(definition.clone(), now);
        assert_eq!(
            view.next_occurrence_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 11, 9, 0, 0).unwrap())
        );

        definition.paused_until = Some(now + chrono::Duration::hours(1));
        assert_eq!(RecurringTaskView::new(definition, now).next_occurrence_at, None);
    }

    #[test]
    fn failure_envelope_omits_data() {
        let body = serde_json::to_value(ApiResponse::failure("nope", None)).unwrap();
        assert_eq!(body, json!({ "success": false, "message": "nope" }));
    }
}
