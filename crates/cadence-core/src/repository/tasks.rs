use crate::error::CoreError;
use crate::models::{NewTaskData, Page, Task, TaskStatus};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use uuid::Uuid;

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::now_v7(),
            title: data.title,
            description: data.description,
            status: data.status.unwrap_or(TaskStatus::Todo),
            priority: data.priority,
            due_at: data.due_at,
            estimated_hours: data.estimated_hours,
            tags: Json(data.tags),
            checklist: Json(data.checklist),
            attachments: Json(data.attachments),
            owner_id: data.owner_id,
            project_id: data.project_id,
            workspace_id: data.workspace_id,
            team_id: data.team_id,
            recurring_task_id: data.recurring_task_id,
            occurrence_at: data.occurrence_at,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"INSERT INTO tasks (id, title, description, status, priority, due_at, estimated_hours, tags, checklist, attachments, owner_id, project_id, workspace_id, team_id, recurring_task_id, occurrence_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_at)
        .bind(task.estimated_hours)
        .bind(&task.tags)
        .bind(&task.checklist)
        .bind(&task.attachments)
        .bind(task.owner_id)
        .bind(task.project_id)
        .bind(task.workspace_id)
        .bind(task.team_id)
        .bind(task.recurring_task_id)
        .bind(task.occurrence_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(self.pool())
        .await?;

        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_for_definition(
        &self,
        recurring_task_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Page<Task>, CoreError> {
        let page = page.max(1);
        let offset = i64::from(page - 1) * i64::from(limit);

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE recurring_task_id = $1")
            .bind(recurring_task_id)
            .fetch_one(self.pool())
            .await?;

        let items = sqlx::query_as(
            r#"SELECT * FROM tasks
            WHERE recurring_task_id = $1
            ORDER BY occurrence_at
            LIMIT $2 OFFSET $3"#,
        )
        .bind(recurring_task_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(self.pool())
        .await?;

        Ok(Page {
            items,
            page,
            limit,
            total: total.0.max(0) as u64,
        })
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Task with id {} not found", id)));
        }
        Ok(())
    }
}
