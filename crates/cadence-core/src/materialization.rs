//! Turns due occurrences of recurring tasks into concrete tasks.
//!
//! A pass is driven by an explicit `now`: everything between a definition's
//! cursor (or its `start_date`) and `now` that has no generated task yet is
//! created through [`TaskRepository::add_task`]. Passes are idempotent, so an
//! interrupted or failed pass can simply be retried with the same `now`.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{CandidateFilter, NewTaskData, RecurringTaskDefinition};
use crate::recurrence::RecurrenceManager;
use crate::repository::{MaterializationRepository, TaskRepository};

/// Limits applied to materialization passes.
#[derive(Debug, Clone)]
pub struct MaterializationConfig {
    /// Occurrences created for one definition in a single pass. The rest is
    /// deferred to the next pass.
    pub max_occurrences_per_pass: usize,
    /// Budget of created tasks for a batch when the caller gives none.
    pub default_max_tasks: usize,
}

impl Default for MaterializationConfig {
    fn default() -> Self {
        Self {
            max_occurrences_per_pass: 100,
            default_max_tasks: 1000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Report what would be created without writing anything
    pub dry_run: bool,
    /// Upper bound of the window; clamped to `now`
    pub process_until: Option<DateTime<Utc>>,
    /// Remaining task budget of the surrounding batch
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub dry_run: bool,
    pub max_tasks: Option<usize>,
    pub definition_ids: Option<Vec<Uuid>>,
    pub process_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Inactive,
    Ended,
    EmptyWindow,
}

/// A task created (or, in a dry run, one that would be created) for an
/// occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTask {
    /// `None` in dry runs
    pub task_id: Option<Uuid>,
    pub recurring_task_id: Uuid,
    pub occurrence_at: DateTime<Utc>,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// One occurrence could not be turned into a task
    Occurrence,
    /// The definition as a whole could not be processed
    Definition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializationError {
    pub recurring_task_id: Uuid,
    pub occurrence_at: Option<DateTime<Utc>>,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of processing one definition.
#[derive(Debug, Clone, Default)]
pub struct DefinitionOutcome {
    pub created: Vec<GeneratedTask>,
    pub errors: Vec<MaterializationError>,
    pub skipped: Option<SkipReason>,
    /// Cursor after the pass
    pub cursor: Option<DateTime<Utc>>,
    /// Due occurrences were left for a later pass
    pub deferred: bool,
    /// Cancellation stopped the pass before every due occurrence was visited
    pub interrupted: bool,
}

/// Statistics collected during a batch pass.
///
/// In a dry run `tasks_created` and `created` describe what would have been
/// created.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializationSummary {
    pub dry_run: bool,
    pub definitions_processed: usize,
    pub definitions_skipped: usize,
    pub tasks_created: usize,
    pub created: Vec<GeneratedTask>,
    pub errors: Vec<MaterializationError>,
    pub definitions_with_errors: usize,
    pub deferred: bool,
    pub stopped_early: bool,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl MaterializationSummary {
    fn absorb(&mut self, outcome: DefinitionOutcome) {
        if outcome.skipped.is_some() {
            self.definitions_skipped += 1;
            return;
        }
        self.definitions_processed += 1;
        if !outcome.errors.is_empty() {
            self.definitions_with_errors += 1;
        }
        self.tasks_created += outcome.created.len();
        self.created.extend(outcome.created);
        self.errors.extend(outcome.errors);
        self.deferred |= outcome.deferred;
        self.cancelled |= outcome.interrupted;
    }

    fn record_definition_failure(&mut self, recurring_task_id: Uuid, error: &CoreError) {
        tracing::warn!(%recurring_task_id, error = %error, "recurring task could not be processed");
        self.definitions_with_errors += 1;
        self.errors.push(MaterializationError {
            recurring_task_id,
            occurrence_at: None,
            kind: FailureKind::Definition,
            message: error.to_string(),
        });
    }
}

/// Creates tasks for due occurrences, one definition at a time.
#[derive(Debug, Clone, Default)]
pub struct MaterializationManager {
    config: MaterializationConfig,
}

impl MaterializationManager {
    /// A per-pass cap of zero is raised to one so passes always progress.
    pub fn new(mut config: MaterializationConfig) -> Self {
        config.max_occurrences_per_pass = config.max_occurrences_per_pass.max(1);
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(MaterializationConfig::default())
    }

    pub fn config(&self) -> &MaterializationConfig {
        &self.config
    }

    /// Materializes the due occurrences of a single definition.
    ///
    /// Rejected task creations are recorded in the outcome and the pass moves
    /// on; infrastructure failures are returned as errors. The cursor only
    /// moves forward, and only when something succeeded.
    pub async fn process_definition<R>(
        &self,
        repo: &R,
        definition: &RecurringTaskDefinition,
        now: DateTime<Utc>,
        options: &ProcessOptions,
        cancel: &CancellationToken,
    ) -> Result<DefinitionOutcome, CoreError>
    where
        R: TaskRepository + MaterializationRepository + Sync,
    {
        let mut outcome = DefinitionOutcome::default();

        if !definition.is_active_at(now) {
            outcome.skipped = Some(SkipReason::Inactive);
            return Ok(outcome);
        }

        let cursor = repo.load_cursor(definition.id).await?;
        outcome.cursor = cursor;

        // An ended rule still drains occurrences left behind the cursor
        if definition.has_ended_by(now) && !has_backlog(definition, cursor) {
            outcome.skipped = Some(SkipReason::Ended);
            return Ok(outcome);
        }

        let lower = cursor.unwrap_or(definition.rule.start_date);
        let upper = options.process_until.map_or(now, |until| until.min(now));
        if lower > upper {
            outcome.skipped = Some(SkipReason::EmptyWindow);
            return Ok(outcome);
        }

        let cap = options
            .limit
            .map_or(self.config.max_occurrences_per_pass, |limit| {
                limit.min(self.config.max_occurrences_per_pass)
            });

        // One extra for the occurrence sitting on the cursor, one to detect overflow
        let mut due: Vec<DateTime<Utc>> = RecurrenceManager::new(definition.rule.clone())
            .occurrences_in_range(lower, upper, cap.saturating_add(2))
            .into_iter()
            .filter(|occurrence| cursor.map_or(true, |c| *occurrence > c))
            .collect();
        if due.len() > cap {
            due.truncate(cap);
            outcome.deferred = true;
        }

        let mut last_success = None;
        for occurrence in due {
            if cancel.is_cancelled() {
                outcome.interrupted = true;
                break;
            }

            match repo.find_generated_task(definition.id, occurrence).await {
                Ok(Some(existing)) => {
                    tracing::debug!(
                        recurring_task_id = %definition.id,
                        %occurrence,
                        task_id = %existing.id,
                        "occurrence already materialized"
                    );
                    last_success = Some(occurrence);
                    continue;
                }
                Ok(None) => {}
                Err(e) if e.is_infrastructure() => return Err(e),
                Err(e) => {
                    record_occurrence_failure(&mut outcome, definition.id, occurrence, &e);
                    continue;
                }
            }

            if options.dry_run {
                outcome.created.push(GeneratedTask {
                    task_id: None,
                    recurring_task_id: definition.id,
                    occurrence_at: occurrence,
                    title: definition.template.title.clone(),
                });
                last_success = Some(occurrence);
                continue;
            }

            match repo
                .add_task(NewTaskData::from_occurrence(definition, occurrence))
                .await
            {
                Ok(task) => {
                    tracing::debug!(
                        recurring_task_id = %definition.id,
                        %occurrence,
                        task_id = %task.id,
                        "created task for occurrence"
                    );
                    outcome.created.push(GeneratedTask {
                        task_id: Some(task.id),
                        recurring_task_id: definition.id,
                        occurrence_at: occurrence,
                        title: task.title,
                    });
                    last_success = Some(occurrence);
                }
                Err(e) if e.is_infrastructure() => return Err(e),
                Err(e) => record_occurrence_failure(&mut outcome, definition.id, occurrence, &e),
            }
        }

        if !options.dry_run {
            if let Some(at) = last_success.filter(|at| cursor.map_or(true, |c| *at > c)) {
                match repo.save_cursor(definition.id, at).await {
                    Ok(()) => outcome.cursor = Some(at),
                    Err(e) if e.is_infrastructure() => return Err(e),
                    Err(e) => {
                        tracing::warn!(recurring_task_id = %definition.id, cursor = %at, error = %e, "could not save cursor");
                        outcome.errors.push(MaterializationError {
                            recurring_task_id: definition.id,
                            occurrence_at: Some(at),
                            kind: FailureKind::Definition,
                            message: format!("Cursor could not be saved: {}", e),
                        });
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Runs one pass over every candidate definition.
    ///
    /// Candidates are visited in creation order until the task budget is
    /// spent or `cancel` fires. Only infrastructure failures abort the pass;
    /// everything else ends up in [`MaterializationSummary::errors`].
    pub async fn process_all<R>(
        &self,
        repo: &R,
        now: DateTime<Utc>,
        options: &BatchOptions,
        cancel: &CancellationToken,
    ) -> Result<MaterializationSummary, CoreError>
    where
        R: TaskRepository + MaterializationRepository + Sync,
    {
        let started = Instant::now();
        let mut summary = MaterializationSummary {
            dry_run: options.dry_run,
            ..Default::default()
        };

        if !options.dry_run {
            repo.resume_expired_pauses(now).await?;
        }

        let max_tasks = options.max_tasks.unwrap_or(self.config.default_max_tasks);
        let candidates = repo
            .list_active_definitions(&CandidateFilter {
                ids: options.definition_ids.clone(),
                as_of: now,
            })
            .await?;

        tracing::info!(
            candidates = candidates.len(),
            dry_run = options.dry_run,
            max_tasks,
            %now,
            "starting materialization pass"
        );

        for record in candidates {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let remaining = max_tasks.saturating_sub(summary.tasks_created);
            if remaining == 0 {
                summary.stopped_early = true;
                break;
            }

            let id = record.id;
            let definition = match RecurringTaskDefinition::try_from(record) {
                Ok(definition) => definition,
                Err(e) => {
                    summary.record_definition_failure(id, &e);
                    continue;
                }
            };

            let process = ProcessOptions {
                dry_run: options.dry_run,
                process_until: options.process_until,
                limit: Some(remaining),
            };
            match self
                .process_definition(repo, &definition, now, &process, cancel)
                .await
            {
                Ok(outcome) => summary.absorb(outcome),
                Err(e) if e.is_infrastructure() => return Err(e),
                Err(e) => summary.record_definition_failure(id, &e),
            }
        }

        summary.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            processed = summary.definitions_processed,
            skipped = summary.definitions_skipped,
            created = summary.tasks_created,
            errors = summary.errors.len(),
            deferred = summary.deferred,
            stopped_early = summary.stopped_early,
            cancelled = summary.cancelled,
            duration_ms = summary.duration_ms,
            "materialization pass finished"
        );
        Ok(summary)
    }
}

fn record_occurrence_failure(
    outcome: &mut DefinitionOutcome,
    recurring_task_id: Uuid,
    occurrence: DateTime<Utc>,
    error: &CoreError,
) {
    tracing::warn!(%recurring_task_id, %occurrence, error = %error, "could not create task for occurrence");
    outcome.errors.push(MaterializationError {
        recurring_task_id,
        occurrence_at: Some(occurrence),
        kind: FailureKind::Occurrence,
        message: error.to_string(),
    });
}

/// Whether occurrences remain after `cursor` up to the rule's end date.
fn has_backlog(definition: &RecurringTaskDefinition, cursor: Option<DateTime<Utc>>) -> bool {
    let Some(end) = definition.rule.end_date else {
        return true;
    };
    let lower = cursor.unwrap_or(definition.rule.start_date);
    RecurrenceManager::new(definition.rule.clone())
        .occurrences_in_range(lower, end, 2)
        .into_iter()
        .any(|occurrence| cursor.map_or(true, |c| occurrence > c))
}
