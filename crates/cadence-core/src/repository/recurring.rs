use crate::error::CoreError;
use crate::models::{
    DefinitionFilter, NewRecurringTaskData, Page, RecurringTaskDefinition, RecurringTaskRecord,
    UpdateRecurringTaskData,
};
use crate::repository::SqliteRepository;
use crate::validation::{validate_definition, validate_pause_until};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite};
use uuid::Uuid;

#[async_trait]
impl super::RecurringTaskRepository for SqliteRepository {
    async fn create_definition(
        &self,
        data: NewRecurringTaskData,
    ) -> Result<RecurringTaskDefinition, CoreError> {
        validate_definition(&data.template, &data.rule)?;

        let now = Utc::now();
        let definition = RecurringTaskDefinition {
            id: Uuid::now_v7(),
            owner_id: data.owner_id,
            project_id: data.project_id,
            workspace_id: data.workspace_id,
            team_id: data.team_id,
            template: data.template,
            rule: data.rule,
            active: data.active,
            paused_until: None,
            last_processed_at: None,
            created_at: now,
            updated_at: now,
        };

        let rule = &definition.rule;
        sqlx::query(
            r#"INSERT INTO recurring_tasks (id, owner_id, project_id, workspace_id, team_id, template, frequency, interval, days_of_week, days_of_month, months_of_year, start_date, end_date, active, paused_until, last_processed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"#,
        )
        .bind(definition.id)
        .bind(definition.owner_id)
        .bind(definition.project_id)
        .bind(definition.workspace_id)
        .bind(definition.team_id)
        .bind(serde_json::to_string(&definition.template)?)
        .bind(rule.frequency)
        .bind(i64::from(rule.interval))
        .bind(serde_json::to_string(&rule.days_of_week)?)
        .bind(serde_json::to_string(&rule.days_of_month)?)
        .bind(serde_json::to_string(&rule.months_of_year)?)
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(definition.active)
        .bind(definition.paused_until)
        .bind(definition.last_processed_at)
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(self.pool())
        .await?;

        tracing::debug!(id = %definition.id, frequency = %rule.frequency, "created recurring task");
        Ok(definition)
    }

    async fn find_definition_by_id(
        &self,
        id: Uuid,
    ) -> Result<Option<RecurringTaskDefinition>, CoreError> {
        load_record(self.pool(), id)
            .await?
            .map(RecurringTaskDefinition::try_from)
            .transpose()
    }

    async fn find_definitions(
        &self,
        filter: &DefinitionFilter,
    ) -> Result<Page<RecurringTaskDefinition>, CoreError> {
        let page = filter.page.max(1);
        let limit = filter.limit;

        let mut count_qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM recurring_tasks WHERE 1 = 1");
        push_filter(&mut count_qb, filter);
        let total: (i64,) = count_qb.build_query_as().fetch_one(self.pool()).await?;

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM recurring_tasks WHERE 1 = 1");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(i64::from(limit));
        qb.push(" OFFSET ");
        qb.push_bind(i64::from(page - 1) * i64::from(limit));

        let records: Vec<RecurringTaskRecord> = qb.build_query_as().fetch_all(self.pool()).await?;
        let items = records
            .into_iter()
            .filter_map(|record| match RecurringTaskDefinition::try_from(record) {
                Ok(definition) => Some(definition),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable recurring task");
                    None
                }
            })
            .collect();

        Ok(Page {
            items,
            page,
            limit,
            total: total.0.max(0) as u64,
        })
    }

    async fn update_definition(
        &self,
        id: Uuid,
        data: UpdateRecurringTaskData,
    ) -> Result<RecurringTaskDefinition, CoreError> {
        let mut tx = self.pool().begin().await?;

        let current: RecurringTaskDefinition = load_record(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurring task with id {} not found", id)))?
            .try_into()?;

        let (template, rule) = data.apply_to(&current);
        validate_definition(&template, &rule)?;

        // An explicit active toggle always clears a timed pause
        let (active, paused_until) = match data.active {
            Some(active) => (active, None),
            None => (current.active, current.paused_until),
        };
        let project_id = data.project_id.unwrap_or(current.project_id);

        sqlx::query(
            r#"UPDATE recurring_tasks SET
                template = $1, frequency = $2, interval = $3, days_of_week = $4, days_of_month = $5,
                months_of_year = $6, start_date = $7, end_date = $8, active = $9, paused_until = $10,
                project_id = $11, updated_at = $12
            WHERE id = $13"#,
        )
        .bind(serde_json::to_string(&template)?)
        .bind(rule.frequency)
        .bind(i64::from(rule.interval))
        .bind(serde_json::to_string(&rule.days_of_week)?)
        .bind(serde_json::to_string(&rule.days_of_month)?)
        .bind(serde_json::to_string(&rule.months_of_year)?)
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(active)
        .bind(paused_until)
        .bind(project_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let updated: RecurringTaskDefinition = load_record(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurring task with id {} not found", id)))?
            .try_into()?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn pause_definition(
        &self,
        id: Uuid,
        pause_until: Option<DateTime<Utc>>,
    ) -> Result<RecurringTaskDefinition, CoreError> {
        let now = Utc::now();
        validate_pause_until(pause_until, now)?;

        set_activity(self, id, false, pause_until).await
    }

    async fn resume_definition(&self, id: Uuid) -> Result<RecurringTaskDefinition, CoreError> {
        set_activity(self, id, true, None).await
    }

    async fn delete_definition(&self, id: Uuid, cascade: bool) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;

        if load_record(&mut *tx, id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Recurring task with id {} not found", id)));
        }

        let generated: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE recurring_task_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let mut removed = 0;
        if generated.0 > 0 {
            if !cascade {
                return Err(CoreError::Conflict(format!(
                    "Recurring task {} still has {} generated task(s); delete with cascade to remove them",
                    id, generated.0
                )));
            }
            removed = sqlx::query("DELETE FROM tasks WHERE recurring_task_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        sqlx::query("DELETE FROM recurring_tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(%id, removed, "deleted recurring task");
        Ok(removed)
    }
}

async fn set_activity(
    repo: &SqliteRepository,
    id: Uuid,
    active: bool,
    paused_until: Option<DateTime<Utc>>,
) -> Result<RecurringTaskDefinition, CoreError> {
    let result = sqlx::query(
        "UPDATE recurring_tasks SET active = $1, paused_until = $2, updated_at = $3 WHERE id = $4",
    )
    .bind(active)
    .bind(paused_until)
    .bind(Utc::now())
    .bind(id)
    .execute(repo.pool())
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound(format!("Recurring task with id {} not found", id)));
    }

    load_record(repo.pool(), id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Recurring task with id {} not found", id)))?
        .try_into()
}

pub(crate) async fn load_record<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Option<RecurringTaskRecord>, CoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = sqlx::query_as("SELECT * FROM recurring_tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(record)
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &DefinitionFilter) {
    if let Some(owner_id) = filter.owner_id {
        qb.push(" AND owner_id = ");
        qb.push_bind(owner_id);
    }
    if let Some(project_id) = filter.project_id {
        qb.push(" AND project_id = ");
        qb.push_bind(project_id);
    }
    if let Some(active) = filter.active {
        qb.push(" AND active = ");
        qb.push_bind(active);
    }
}
