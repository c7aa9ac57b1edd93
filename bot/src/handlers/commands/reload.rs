use async_trait::async_trait;

use crate::handlers::commands::{CommandBody, CommandContext, ExecutionOutcome};
use crate::Result;

/// Re-read every definition table and swap the in-memory snapshots.
pub struct ReloadBody;

#[async_trait]
impl CommandBody for ReloadBody {
    fn name(&self) -> &'static str {
        "reload"
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> Result<ExecutionOutcome> {
        ctx.bot.reload_all().await?;
        Ok(ExecutionOutcome::reply("Reload done!"))
    }
}
