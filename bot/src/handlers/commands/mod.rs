use std::sync::Arc;

use fnv::FnvHashMap;

use async_trait::async_trait;
use persistence::channel::ChannelDefinition;
use persistence::commands::CommandDefinition;
use persistence::user::UserDefinition;

use crate::dispatch::InvocationOptions;
use crate::state::BotContext;
use crate::transaction::Transaction;
use crate::Result;

mod echo;
pub mod error;
mod ping;
mod reload;
mod roll;

/// Statically compiled command body, registered under a stable handler name
/// that command definitions reference.
#[async_trait]
pub trait CommandBody: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &CommandContext<'_>) -> Result<ExecutionOutcome>;
}

/// Handler name -> compiled body. Built once at startup; the command table
/// binds against it on every (re)load.
pub type BodyRegistry = FnvHashMap<&'static str, Arc<dyn CommandBody>>;

/// The bodies shipped with the bot.
pub fn builtin_bodies() -> BodyRegistry {
    let bodies: Vec<Arc<dyn CommandBody>> = vec![
        Arc::new(ping::PingBody),
        Arc::new(echo::EchoBody),
        Arc::new(roll::RollBody),
        Arc::new(reload::ReloadBody),
    ];

    let mut registry = BodyRegistry::default();
    for body in bodies {
        registry.insert(body.name(), body);
    }
    registry
}

/// Everything a command body may observe about its invocation.
pub struct CommandContext<'a> {
    pub bot: &'a BotContext,
    /// The command name as invoked, prefix already stripped
    pub invocation: &'a str,
    pub user: &'a UserDefinition,
    /// Missing for private messages
    pub channel: Option<&'a ChannelDefinition>,
    pub command: &'a CommandDefinition,
    pub args: &'a [String],
    /// Present iff the command is flagged rollbackable; the dispatcher owns
    /// the commit/rollback decision
    pub transaction: Option<&'a dyn Transaction>,
    /// Extra invocation data appended by the platform adapter
    pub options: &'a InvocationOptions,
    pub private_message: bool,
}

/// What a command body hands back to the dispatcher.
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub reply: Option<String>,
    /// Reply assembled from fragments, each individually banphrase-checked
    /// when flagged
    pub partial_replies: Vec<PartialReply>,
    /// Machine-readable failure reason, passed through to the caller
    pub reason: Option<String>,
    pub meta: OutcomeMeta,
}

#[derive(Debug, Clone)]
pub struct PartialReply {
    pub message: String,
    pub bancheck: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OutcomeMeta {
    pub skip_cooldown: bool,
    pub skip_banphrases: bool,
    pub skip_whitespace_check: bool,
}

impl ExecutionOutcome {
    pub fn reply(text: impl Into<String>) -> Self {
        ExecutionOutcome {
            success: true,
            reply: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn silent() -> Self {
        ExecutionOutcome {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(reason: &str, reply: impl Into<String>) -> Self {
        ExecutionOutcome {
            success: false,
            reply: Some(reply.into()),
            reason: Some(reason.to_string()),
            ..Default::default()
        }
    }
}
