use async_trait::async_trait;

use crate::handlers::commands::error::CommandError;
use crate::handlers::commands::{CommandBody, CommandContext, ExecutionOutcome};
use crate::Result;

/// Repeat the arguments back. Mostly useful at the end of a command pipe.
pub struct EchoBody;

#[async_trait]
impl CommandBody for EchoBody {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> Result<ExecutionOutcome> {
        if ctx.args.is_empty() {
            return Err(CommandError::MissingArgument("message").into());
        }
        Ok(ExecutionOutcome::reply(ctx.args.join(" ")))
    }
}
