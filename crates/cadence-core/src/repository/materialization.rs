use crate::error::CoreError;
use crate::models::{CandidateFilter, RecurringTaskRecord, Task};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

#[async_trait]
impl super::MaterializationRepository for SqliteRepository {
    async fn list_active_definitions(
        &self,
        filter: &CandidateFilter,
    ) -> Result<Vec<RecurringTaskRecord>, CoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT * FROM recurring_tasks WHERE (active = 1 OR (paused_until IS NOT NULL AND paused_until <= ",
        );
        qb.push_bind(filter.as_of);
        qb.push("))");

        if let Some(ids) = &filter.ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            qb.push(" AND id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }

        qb.push(" ORDER BY created_at, id");

        let records = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(records)
    }

    async fn load_cursor(&self, recurring_task_id: Uuid) -> Result<Option<DateTime<Utc>>, CoreError> {
        let row: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT last_processed_at FROM recurring_tasks WHERE id = $1")
                .bind(recurring_task_id)
                .fetch_optional(self.pool())
                .await?;

        match row {
            Some((cursor,)) => Ok(cursor),
            None => Err(CoreError::NotFound(format!(
                "Recurring task with id {} not found",
                recurring_task_id
            ))),
        }
    }

    async fn save_cursor(&self, recurring_task_id: Uuid, at: DateTime<Utc>) -> Result<(), CoreError> {
        // The guard keeps the cursor monotonic even with concurrent passes
        let result = sqlx::query(
            r#"UPDATE recurring_tasks SET last_processed_at = $1, updated_at = $2
            WHERE id = $3 AND (last_processed_at IS NULL OR last_processed_at < $1)"#,
        )
        .bind(at)
        .bind(Utc::now())
        .bind(recurring_task_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM recurring_tasks WHERE id = $1")
                .bind(recurring_task_id)
                .fetch_optional(self.pool())
                .await?;
            if exists.is_none() {
                return Err(CoreError::NotFound(format!(
                    "Recurring task with id {} not found",
                    recurring_task_id
                )));
            }
        }

        Ok(())
    }

    async fn find_generated_task(
        &self,
        recurring_task_id: Uuid,
        occurrence_at: DateTime<Utc>,
    ) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as(
            "SELECT * FROM tasks WHERE recurring_task_id = $1 AND occurrence_at = $2",
        )
        .bind(recurring_task_id)
        .bind(occurrence_at)
        .fetch_optional(self.pool())
        .await?;
        Ok(task)
    }

    async fn resume_expired_pauses(&self, now: DateTime<Utc>) -> Result<u64, CoreError> {
        let result = sqlx::query(
            r#"UPDATE recurring_tasks SET active = 1, paused_until = NULL, updated_at = $1
            WHERE active = 0 AND paused_until IS NOT NULL AND paused_until <= $1"#,
        )
        .bind(now)
        .execute(self.pool())
        .await?;

        let resumed = result.rows_affected();
        if resumed > 0 {
            tracing::info!(resumed, "resumed recurring tasks whose pause ended");
        }
        Ok(resumed)
    }
}
