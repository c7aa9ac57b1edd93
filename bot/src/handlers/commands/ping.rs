use async_trait::async_trait;

use crate::handlers::commands::{CommandBody, CommandContext, ExecutionOutcome};
use crate::Result;

/// Liveness check.
pub struct PingBody;

#[async_trait]
impl CommandBody for PingBody {
    fn name(&self) -> &'static str {
        "ping"
    }

    async fn run(&self, _ctx: &CommandContext<'_>) -> Result<ExecutionOutcome> {
        Ok(ExecutionOutcome::reply("Pong!"))
    }
}
