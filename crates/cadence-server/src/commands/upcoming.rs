use anyhow::Result;
use cadence_core::error::CoreError;
use cadence_core::recurrence::RecurrenceManager;
use cadence_core::repository::RecurringTaskRepository;
use chrono::Utc;

use crate::cli::UpcomingCommand;
use crate::dto::MAX_UPCOMING_COUNT;
use crate::state::AppState;
use crate::util::parse_date;
use crate::views::table::display_occurrences;

pub async fn upcoming(state: &AppState, command: UpcomingCommand) -> Result<()> {
    if !(1..=MAX_UPCOMING_COUNT).contains(&command.count) {
        anyhow::bail!("--count must be between 1 and {}", MAX_UPCOMING_COUNT);
    }
    let from = match command.from.as_deref() {
        Some(input) => parse_date(input)?,
        None => Utc::now(),
    };
    let to = command.to.as_deref().map(parse_date).transpose()?;
    if to.is_some_and(|to| to < from) {
        anyhow::bail!("--to must not be before --from");
    }

    let definition = state
        .repo
        .find_definition_by_id(command.id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound(format!("Recurring task with id {} not found", command.id))
        })?;

    let occurrences =
        RecurrenceManager::new(definition.rule).upcoming(from, to, command.count);
    display_occurrences(&definition.template.title, &occurrences);
    Ok(())
}
