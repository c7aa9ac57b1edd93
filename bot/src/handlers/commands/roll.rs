use async_trait::async_trait;
use rand::Rng;

use crate::handlers::commands::{CommandBody, CommandContext, ExecutionOutcome};
use crate::Result;

const DEFAULT_SIDES: u64 = 100;

/// Roll a die, d100 unless a side count is given.
pub struct RollBody;

#[async_trait]
impl CommandBody for RollBody {
    fn name(&self) -> &'static str {
        "roll"
    }

    async fn run(&self, ctx: &CommandContext<'_>) -> Result<ExecutionOutcome> {
        let sides = match ctx.args.first() {
            Some(arg) => match arg.parse::<u64>() {
                Ok(sides) if sides >= 2 => sides,
                _ => {
                    return Ok(ExecutionOutcome::failed(
                        "invalid-argument",
                        "The number of sides must be a whole number of at least 2.",
                    ));
                }
            },
            None => DEFAULT_SIDES,
        };
        let rolled = rand::thread_rng().gen_range(1..=sides);
        Ok(ExecutionOutcome::reply(format!("Rolled {} (1-{})", rolled, sides)))
    }
}
