use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use persistence::channel::{ChannelDefinition, ChannelMode};
use persistence::user::UserDefinition;

use crate::handlers::commands::CommandContext;
use crate::logging::ExecutionRecord;
use crate::state::command_store::Command;
use crate::state::filter_store::FilterVerdict;
use crate::state::BotContext;
use crate::util;
use crate::Result;

/// Per-invocation switches supplied by the platform adapter.
#[derive(Debug, Clone, Default)]
pub struct InvocationOptions {
    pub private_message: bool,
    /// Skip the outbound banphrase cascade for this invocation, regardless
    /// of command flags (used when the output feeds another command)
    pub skip_banphrases: bool,
}

/// Why an invocation did not execute, or why a completed one reports
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NoIdentifier,
    ChannelInactive,
    ChannelRead,
    NoCommand,
    Cooldown,
    Filter,
    OptOut,
    Error,
    /// Failure reason reported by the command body itself
    Command(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoIdentifier => write!(f, "no-identifier"),
            RejectReason::ChannelInactive => write!(f, "channel-inactive"),
            RejectReason::ChannelRead => write!(f, "channel-read"),
            RejectReason::NoCommand => write!(f, "no-command"),
            RejectReason::Cooldown => write!(f, "cooldown"),
            RejectReason::Filter => write!(f, "filter"),
            RejectReason::OptOut => write!(f, "opt-out"),
            RejectReason::Error => write!(f, "error"),
            RejectReason::Command(reason) => write!(f, "{}", reason),
        }
    }
}

/// What the adapter gets back for every invocation. `success` reflects
/// whether the command body ran and reported success; the `reply` is what
/// may actually be sent, which after moderation can differ from what the
/// body produced, including being nothing at all.
#[derive(Debug)]
pub struct CommandResult {
    pub success: bool,
    pub reason: Option<RejectReason>,
    pub reply: Option<String>,
}

impl CommandResult {
    fn rejected(reason: RejectReason) -> Self {
        CommandResult {
            success: false,
            reason: Some(reason),
            reply: None,
        }
    }
}

/// Orchestrates one command invocation end to end: rate limiting,
/// authorization filters, the command body under an optional transaction,
/// and the outbound moderation cascade.
pub struct Dispatcher {
    ctx: BotContext,
}

impl Dispatcher {
    pub fn new(ctx: BotContext) -> Self {
        Dispatcher { ctx }
    }

    pub fn context(&self) -> &BotContext {
        &self.ctx
    }

    pub async fn check_and_execute(
        &self,
        identifier: &str,
        raw_args: &[String],
        channel: Option<&ChannelDefinition>,
        user: &UserDefinition,
        options: InvocationOptions,
    ) -> Result<CommandResult> {
        let prefix = self.ctx.config.command_prefix();
        let identifier = identifier.strip_prefix(prefix).unwrap_or(identifier);
        if identifier.is_empty() {
            return Ok(CommandResult::rejected(RejectReason::NoIdentifier));
        }

        if let Some(channel) = channel {
            match channel.mode {
                ChannelMode::Inactive => {
                    return Ok(CommandResult::rejected(RejectReason::ChannelInactive));
                }
                ChannelMode::Read => {
                    return Ok(CommandResult::rejected(RejectReason::ChannelRead));
                }
                ChannelMode::Write => {}
            }
        }

        // pin the command snapshot for the whole invocation; a reload while
        // the body runs must not affect it
        let commands = self.ctx.commands.load_full();
        let command = match commands.get_by_name(identifier) {
            Some(command) => Arc::clone(command),
            None => return Ok(CommandResult::rejected(RejectReason::NoCommand)),
        };

        let args = util::tokenize_args(raw_args);

        let channel_id = channel.map(|c| c.id);
        if !self
            .ctx
            .cooldowns
            .check(&command.def, user.id, channel_id)
            .await
        {
            debug!("Cooldown for {} still active", command.def.name);
            return Ok(CommandResult::rejected(RejectReason::Cooldown));
        }

        // advisory marker against the same actor racing a second invocation
        // through the cooldown window; cleared on every exit path
        self.ctx
            .cooldowns
            .set_pending(true, user.id, channel_id)
            .await;
        let result = self
            .execute(identifier, &command, &args, channel, user, &options)
            .await;
        self.ctx
            .cooldowns
            .set_pending(false, user.id, channel_id)
            .await;
        result
    }

    async fn execute(
        &self,
        invocation: &str,
        command: &Command,
        args: &[String],
        channel: Option<&ChannelDefinition>,
        user: &UserDefinition,
        options: &InvocationOptions,
    ) -> Result<CommandResult> {
        let ctx = &self.ctx;
        let channel_id = channel.map(|c| c.id);
        let flags = command.def.flags;

        let filters = ctx.filters.load_full();
        let banphrases = ctx.banphrases.load_full();

        if let FilterVerdict::Blocked { reply, penalize } =
            filters.check(user.id, channel_id, &command.def)?
        {
            if penalize {
                ctx.cooldowns.penalize(user.id, channel_id).await;
            }
            let reply = if flags.whitelisted && command.def.whitelist_response.is_some() {
                command.def.whitelist_response.clone()
            } else {
                reply
            };
            return Ok(CommandResult {
                success: false,
                reason: Some(RejectReason::Filter),
                reply,
            });
        }

        if flags.opt_outable {
            if let Some(first) = args.first() {
                if let Some(target) = ctx.get_user(first).await {
                    if target.id != user.id {
                        if let FilterVerdict::Blocked { reply, .. } =
                            filters.check_opt_outs(&target, &command.def)
                        {
                            let reply = match reply {
                                Some(text) => {
                                    ctx.banphrase_engine
                                        .execute(&banphrases, &text, channel)
                                        .await
                                        .string
                                }
                                None => None,
                            };
                            return Ok(CommandResult {
                                success: false,
                                reason: Some(RejectReason::OptOut),
                                reply,
                            });
                        }
                    }
                }
            }
        }

        let transaction = if flags.rollbackable {
            Some(ctx.transactions.begin().await?)
        } else {
            None
        };

        let cmd_ctx = CommandContext {
            bot: ctx,
            invocation,
            user,
            channel,
            command: &command.def,
            args,
            transaction: transaction.as_deref(),
            options,
            private_message: options.private_message,
        };

        let started_at = Utc::now();
        let started = Instant::now();
        let outcome = match command.body.run(&cmd_ctx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let correlation = ctx.system_logger.send_error("Command", &err, invocation);
                // the transaction handle is dropped without commit or
                // rollback here, matching the rollback-on-moderation-only
                // contract
                return Ok(CommandResult {
                    success: false,
                    reason: Some(RejectReason::Error),
                    reply: Some(ctx.config.error_reply(correlation)),
                });
            }
        };
        drop(cmd_ctx);

        ctx.execution_logger.log(&ExecutionRecord {
            user_id: user.id,
            user_name: &user.name,
            channel_id,
            platform_id: channel.map(|c| c.platform_id),
            command_id: command.def.id,
            invocation,
            args,
            started_at,
            execution_time_ms: started.elapsed().as_millis() as u64,
            success: outcome.success,
            result: outcome.reply.as_deref(),
        });

        if flags.read_only {
            return Ok(CommandResult {
                success: outcome.success,
                reason: None,
                reply: None,
            });
        }

        if !outcome.meta.skip_cooldown {
            ctx.cooldowns.set(&command.def, user.id, channel_id).await;
        }

        let reply = if !outcome.partial_replies.is_empty() {
            let mut parts = Vec::with_capacity(outcome.partial_replies.len());
            for partial in &outcome.partial_replies {
                if partial.bancheck {
                    let checked = ctx
                        .banphrase_engine
                        .execute(&banphrases, &partial.message, channel)
                        .await;
                    if let Some(part) = checked.string {
                        parts.push(part);
                    }
                } else {
                    parts.push(partial.message.clone());
                }
            }
            Some(parts.join(" "))
        } else {
            outcome.reply.clone()
        };

        let mut reply = match reply {
            Some(reply) => reply,
            None => {
                // nothing will be sent, so nothing can fail moderation
                if let Some(tx) = transaction {
                    tx.commit().await?;
                }
                let reason = match (outcome.success, outcome.reason) {
                    (false, Some(reason)) => Some(RejectReason::Command(reason)),
                    _ => None,
                };
                return Ok(CommandResult {
                    success: outcome.success,
                    reason,
                    reply: None,
                });
            }
        };

        reply = util::fix_html(reply);
        if !outcome.meta.skip_whitespace_check {
            reply = util::strip_invisible(&reply).into_owned();
        }

        if flags.ping && channel.map_or(true, |c| c.mention) {
            let name_check = ctx
                .banphrase_engine
                .execute(&banphrases, &user.name, channel)
                .await;
            if name_check.passed {
                reply = format!("{}, {}", user.name, reply);
            }
        }

        for name in ctx.unping_names().await {
            reply = util::unping(&reply, &name);
        }

        let skip_banphrases =
            flags.skip_banphrases || options.skip_banphrases || outcome.meta.skip_banphrases;
        let (final_reply, passed) = if skip_banphrases {
            (Some(reply), true)
        } else {
            let checked = ctx
                .banphrase_engine
                .execute(&banphrases, &reply, channel)
                .await;
            (checked.string, checked.passed)
        };

        if let Some(tx) = transaction {
            if passed {
                tx.commit().await?;
            } else {
                tx.rollback().await?;
            }
        }

        let reason = match (outcome.success, outcome.reason) {
            (false, Some(reason)) => Some(RejectReason::Command(reason)),
            _ => None,
        };
        Ok(CommandResult {
            success: outcome.success,
            reason,
            reply: final_reply,
        })
    }
}
