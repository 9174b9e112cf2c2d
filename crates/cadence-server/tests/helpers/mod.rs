use assert_cmd::Command;
use cadence_core::db;
use cadence_core::models::{NewRecurringTaskData, RecurrenceRule, TaskTemplate};
use cadence_core::repository::{RecurringTaskRepository, SqliteRepository};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

/// Runs the `cadence` binary against a throwaway database.
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// A command that runs inside the temp dir, so no stray `cadence.toml` is read.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");
        cmd.current_dir(self.temp_dir.path())
            .env("CADENCE_DATABASE_PATH", &self.db_path)
            .env("RUST_LOG", "warn")
            .env("NO_COLOR", "1");
        cmd
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Inserts a definition directly through the core crate.
    pub async fn seed_definition(&self, title: &str, rule: RecurrenceRule) -> Uuid {
        let pool = db::establish_connection(self.db_path.to_str().expect("utf-8 path"))
            .await
            .expect("Failed to open test database");
        let repo = SqliteRepository::new(pool.clone());

        let definition = repo
            .create_definition(NewRecurringTaskData::new(
                Uuid::now_v7(),
                TaskTemplate {
                    title: title.to_string(),
                    ..TaskTemplate::default()
                },
                rule,
            ))
            .await
            .expect("Failed to seed definition");
        pool.close().await;
        definition.id
    }
}
