//! # Cadence Core Library
//!
//! The engine behind recurring tasks: a task template plus a recurrence rule
//! that periodically turns into concrete tasks.
//!
//! ## Features
//!
//! - **Deterministic Recurrence**: Daily, weekly, monthly and yearly rules with
//!   intervals and day/month selectors, evaluated purely in UTC
//! - **Idempotent Materialization**: At most one task per occurrence, with a
//!   forward-only cursor so passes can be retried safely
//! - **Bounded Passes**: Per-definition caps, batch budgets, dry runs and
//!   cooperative cancellation
//! - **SQLite Persistence**: Embedded migrations and async repositories on sqlx
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`repository`]: Data access layer with Repository pattern
//! - [`recurrence`]: Recurrence rule evaluation
//! - [`materialization`]: Turning due occurrences into tasks
//! - [`validation`]: Input checks for rules and templates
//! - [`error`]: Error types shared by the crate
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     materialization::{BatchOptions, MaterializationManager},
//!     models::{NewRecurringTaskData, RecurrenceRule, TaskTemplate},
//!     repository::{RecurringTaskRepository, SqliteRepository},
//! };
//! use chrono::Utc;
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool);
//!
//!     let template = TaskTemplate {
//!         title: "Weekly review".to_string(),
//!         ..Default::default()
//!     };
//!     let rule = RecurrenceRule::weekly(Utc::now(), vec![5]);
//!     repo.create_definition(NewRecurringTaskData::new(Uuid::now_v7(), template, rule))
//!         .await?;
//!
//!     let manager = MaterializationManager::with_defaults();
//!     let summary = manager
//!         .process_all(&repo, Utc::now(), &BatchOptions::default(), &CancellationToken::new())
//!         .await?;
//!     println!("Created {} task(s)", summary.tasks_created);
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod materialization;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod validation;
