use anyhow::Result;
use cadence_core::materialization::BatchOptions;

use crate::cli::ProcessCommand;
use crate::state::AppState;
use crate::util::parse_date;
use crate::views::table::display_summary;

pub async fn process(state: &AppState, command: ProcessCommand) -> Result<()> {
    if command.max_tasks == Some(0) {
        anyhow::bail!("--max-tasks must be at least 1");
    }
    let process_until = command.until.as_deref().map(parse_date).transpose()?;

    let options = BatchOptions {
        dry_run: command.dry_run,
        max_tasks: command.max_tasks,
        definition_ids: (!command.ids.is_empty()).then_some(command.ids),
        process_until,
    };
    let summary = state.run_pass(&options).await?;

    display_summary(&summary);
    Ok(())
}
