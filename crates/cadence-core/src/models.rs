use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// The task payload copied into every generated task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

fn default_interval() -> u32 {
    1
}

/// When a recurring task fires.
///
/// Day and month sets use the conventions of the public API: weekdays are
/// `0..=6` starting on Sunday, days of month are `1..=31`, months are `0..=11`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    #[serde(default)]
    pub days_of_month: Vec<u8>,
    #[serde(default)]
    pub months_of_year: Vec<u8>,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl RecurrenceRule {
    pub fn daily(start_date: DateTime<Utc>) -> Self {
        Self {
            frequency: Frequency::Daily,
            interval: 1,
            days_of_week: Vec::new(),
            days_of_month: Vec::new(),
            months_of_year: Vec::new(),
            start_date,
            end_date: None,
        }
    }

    pub fn weekly(start_date: DateTime<Utc>, days_of_week: Vec<u8>) -> Self {
        Self {
            frequency: Frequency::Weekly,
            days_of_week,
            ..Self::daily(start_date)
        }
    }

    pub fn monthly(start_date: DateTime<Utc>, days_of_month: Vec<u8>) -> Self {
        Self {
            frequency: Frequency::Monthly,
            days_of_month,
            ..Self::daily(start_date)
        }
    }

    pub fn yearly(start_date: DateTime<Utc>, months_of_year: Vec<u8>) -> Self {
        Self {
            frequency: Frequency::Yearly,
            months_of_year,
            ..Self::daily(start_date)
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn until(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }
}

/// A recurring task as the rest of the crate sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTaskDefinition {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub template: TaskTemplate,
    pub rule: RecurrenceRule,
    pub active: bool,
    pub paused_until: Option<DateTime<Utc>>,
    /// Materialization cursor
    pub last_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringTaskDefinition {
    /// Active, or paused with a `paused_until` that has already passed.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active || self.paused_until.is_some_and(|until| until <= now)
    }

    pub fn has_ended_by(&self, now: DateTime<Utc>) -> bool {
        self.rule.end_date.is_some_and(|end| end < now)
    }
}

/// Raw `recurring_tasks` row. Set and template columns hold JSON text and
/// are decoded in [`RecurringTaskDefinition::try_from`], so one unreadable
/// row does not fail a whole listing.
#[derive(Debug, Clone, FromRow)]
pub struct RecurringTaskRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub template: String,
    pub frequency: String,
    pub interval: i64,
    pub days_of_week: String,
    pub days_of_month: String,
    pub months_of_year: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub paused_until: Option<DateTime<Utc>>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RecurringTaskRecord> for RecurringTaskDefinition {
    type Error = CoreError;

    fn try_from(record: RecurringTaskRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        let corrupt = |reason: String| CoreError::CorruptRecord { id, reason };

        let template: TaskTemplate = serde_json::from_str(&record.template)
            .map_err(|e| corrupt(format!("template: {}", e)))?;
        let frequency: Frequency = record
            .frequency
            .parse()
            .map_err(|e: ParseFrequencyError| corrupt(e.to_string()))?;
        let interval = u32::try_from(record.interval)
            .ok()
            .filter(|i| *i > 0)
            .ok_or_else(|| corrupt(format!("interval {} out of range", record.interval)))?;
        let decode_set = |column: &str, raw: &str| -> Result<Vec<u8>, CoreError> {
            serde_json::from_str(raw).map_err(|e| corrupt(format!("{}: {}", column, e)))
        };

        Ok(Self {
            id,
            owner_id: record.owner_id,
            project_id: record.project_id,
            workspace_id: record.workspace_id,
            team_id: record.team_id,
            template,
            rule: RecurrenceRule {
                frequency,
                interval,
                days_of_week: decode_set("days_of_week", &record.days_of_week)?,
                days_of_month: decode_set("days_of_month", &record.days_of_month)?,
                months_of_year: decode_set("months_of_year", &record.months_of_year)?,
                start_date: record.start_date,
                end_date: record.end_date,
            },
            active: record.active,
            paused_until: record.paused_until,
            last_processed_at: record.last_processed_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub tags: Json<Vec<String>>,
    pub checklist: Json<Vec<ChecklistItem>>,
    pub attachments: Json<Vec<Attachment>>,
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    /// Set for tasks generated from a recurring task
    pub recurring_task_id: Option<Uuid>,
    /// The occurrence a generated task was created for
    pub occurrence_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub tags: Vec<String>,
    pub checklist: Vec<ChecklistItem>,
    pub attachments: Vec<Attachment>,
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub recurring_task_id: Option<Uuid>,
    pub occurrence_at: Option<DateTime<Utc>>,
}

impl NewTaskData {
    /// Task payload for one occurrence of a recurring task. The occurrence
    /// doubles as the due date.
    pub fn from_occurrence(definition: &RecurringTaskDefinition, occurrence: DateTime<Utc>) -> Self {
        let template = &definition.template;
        Self {
            title: template.title.clone(),
            description: template.description.clone(),
            status: Some(TaskStatus::Todo),
            priority: template.priority,
            due_at: Some(occurrence),
            estimated_hours: template.estimated_hours,
            tags: template.tags.clone(),
            checklist: template.checklist.clone(),
            attachments: template.attachments.clone(),
            owner_id: definition.owner_id,
            project_id: definition.project_id,
            workspace_id: definition.workspace_id,
            team_id: definition.team_id,
            recurring_task_id: Some(definition.id),
            occurrence_at: Some(occurrence),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRecurringTaskData {
    pub owner_id: Uuid,
    pub project_id: Option<Uuid>,
    pub workspace_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub template: TaskTemplate,
    pub rule: RecurrenceRule,
    pub active: bool,
}

impl NewRecurringTaskData {
    pub fn new(owner_id: Uuid, template: TaskTemplate, rule: RecurrenceRule) -> Self {
        Self {
            owner_id,
            project_id: None,
            workspace_id: None,
            team_id: None,
            template,
            rule,
            active: true,
        }
    }
}

/// Partial update of a recurring task. `Option<Option<T>>` fields
/// distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct UpdateRecurringTaskData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
    pub estimated_hours: Option<Option<f64>>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub attachments: Option<Vec<Attachment>>,
    pub frequency: Option<Frequency>,
    pub interval: Option<u32>,
    pub days_of_week: Option<Vec<u8>>,
    pub days_of_month: Option<Vec<u8>>,
    pub months_of_year: Option<Vec<u8>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub active: Option<bool>,
    pub project_id: Option<Option<Uuid>>,
}

impl UpdateRecurringTaskData {
    /// Merges the update over the current template and rule.
    pub fn apply_to(&self, current: &RecurringTaskDefinition) -> (TaskTemplate, RecurrenceRule) {
        let mut template = current.template.clone();
        if let Some(title) = &self.title {
            template.title = title.clone();
        }
        if let Some(description) = &self.description {
            template.description = description.clone();
        }
        if let Some(priority) = self.priority {
            template.priority = priority;
        }
        if let Some(tags) = &self.tags {
            template.tags = tags.clone();
        }
        if let Some(hours) = self.estimated_hours {
            template.estimated_hours = hours;
        }
        if let Some(checklist) = &self.checklist {
            template.checklist = checklist.clone();
        }
        if let Some(attachments) = &self.attachments {
            template.attachments = attachments.clone();
        }

        let mut rule = current.rule.clone();
        if let Some(frequency) = self.frequency {
            rule.frequency = frequency;
        }
        if let Some(interval) = self.interval {
            rule.interval = interval;
        }
        if let Some(days) = &self.days_of_week {
            rule.days_of_week = days.clone();
        }
        if let Some(days) = &self.days_of_month {
            rule.days_of_month = days.clone();
        }
        if let Some(months) = &self.months_of_year {
            rule.months_of_year = months.clone();
        }
        if let Some(start) = self.start_date {
            rule.start_date = start;
        }
        if let Some(end) = self.end_date {
            rule.end_date = end;
        }

        (template, rule)
    }
}

/// Filter for listing recurring tasks through the API.
#[derive(Debug, Clone)]
pub struct DefinitionFilter {
    pub owner_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub active: Option<bool>,
    pub page: u32,
    pub limit: u32,
}

impl Default for DefinitionFilter {
    fn default() -> Self {
        Self {
            owner_id: None,
            project_id: None,
            active: None,
            page: 1,
            limit: 20,
        }
    }
}

/// Selects the recurring tasks a materialization pass considers.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    /// Restrict the pass to these ids
    pub ids: Option<Vec<Uuid>>,
    /// Pauses that ended at or before this instant count as active
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.limit))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
        }
    }
}
