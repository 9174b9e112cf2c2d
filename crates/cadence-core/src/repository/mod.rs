use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    CandidateFilter, DefinitionFilter, NewRecurringTaskData, NewTaskData, Page,
    RecurringTaskDefinition, RecurringTaskRecord, Task, UpdateRecurringTaskData,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

// Re-export domain modules
pub mod materialization;
pub mod recurring;
pub mod tasks;

// Traits are defined in this module and implemented in respective domain modules

/// Domain-specific trait for task operations.
///
/// `add_task` is the task-creation collaborator the materializer calls for
/// every due occurrence.
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_for_definition(
        &self,
        recurring_task_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Page<Task>, CoreError>;
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for recurring task definitions
#[async_trait]
pub trait RecurringTaskRepository {
    async fn create_definition(
        &self,
        data: NewRecurringTaskData,
    ) -> Result<RecurringTaskDefinition, CoreError>;
    async fn find_definition_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<RecurringTaskDefinition>, CoreError>;
    async fn find_definitions(
        &self,
        filter: &DefinitionFilter,
    ) -> Result<Page<RecurringTaskDefinition>, CoreError>;
    async fn update_definition(
        &self,
        id: Uuid,
        data: UpdateRecurringTaskData,
    ) -> Result<RecurringTaskDefinition, CoreError>;
    async fn pause_definition(
        &self,
        id: Uuid,
        pause_until: Option<DateTime<Utc>>,
    ) -> Result<RecurringTaskDefinition, CoreError>;
    async fn resume_definition(&self, id: Uuid) -> Result<RecurringTaskDefinition, CoreError>;
    /// Without `cascade` the delete is refused while generated tasks exist.
    /// Returns the number of generated tasks removed.
    async fn delete_definition(&self, id: Uuid, cascade: bool) -> Result<u64, CoreError>;
}

/// Persistence the materializer needs: candidates, cursors and the
/// idempotency lookup.
#[async_trait]
pub trait MaterializationRepository {
    async fn list_active_definitions(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<RecurringTaskRecord>, CoreError>;
    async fn load_cursor(&self, recurring_task_id: Uuid) -> Result<Option<DateTime<Utc>>, CoreError>;
    /// Moves the cursor forward; an earlier instant leaves it unchanged.
    async fn save_cursor(&self, recurring_task_id: Uuid, at: DateTime<Utc>) -> Result<(), CoreError>;
    async fn find_generated_task(
        &self,
        recurring_task_id: Uuid,
        occurrence_at: DateTime<Utc>,
    ) -> Result<Option<Task>, CoreError>;
    /// Reactivates definitions whose pause ended at or before `now`.
    async fn resume_expired_pauses(&self, now: DateTime<Utc>) -> Result<u64, CoreError>;
}

/// Main repository trait that composes all domain traits
#[async_trait]
pub trait Repository:
    TaskRepository + RecurringTaskRepository + MaterializationRepository + Send + Sync
{
    // This trait automatically composes all domain-specific repositories
}

/// SQLite implementation of the repository pattern
#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Repository for SqliteRepository {}
