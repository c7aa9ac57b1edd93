use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use log::{error, info};
use structopt::StructOpt;
use tokio::io::{AsyncBufReadExt, BufReader};

use persistence::store::TomlStore;
use persistence::user::UserDefinition;
use strixbot::config::BotConfig;
use strixbot::dispatch::{Dispatcher, InvocationOptions};
use strixbot::state::{BotContext, BotStateError};
use strixbot::{Error, Result};

/// Console driver: feeds stdin lines through the dispatcher in place of a
/// real platform adapter.
#[derive(Debug, StructOpt)]
#[structopt(name = "strixbot")]
struct Opt {
    /// Path to the config file
    #[structopt(short, long)]
    config: Option<PathBuf>,
    /// Channel to dispatch into; omit to dispatch as private messages
    #[structopt(long)]
    channel: Option<String>,
    /// User to invoke commands as
    #[structopt(long, default_value = "console")]
    user: String,
}

fn main() {
    dotenv().ok();
    env_logger::init();
    let opt = Opt::from_args();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    if let Err(err) = runtime.block_on(run(opt)) {
        error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(opt: Opt) -> Result<()> {
    let config = BotConfig::load(opt.config.as_deref())?;
    let prefix = config.command_prefix().to_string();
    let store = Arc::new(TomlStore::new(config.definitions()));
    let ctx = BotContext::create(config, store).await?;
    info!(
        "Loaded {} commands, {} banphrases",
        ctx.commands.load().len(),
        ctx.banphrases.load().len()
    );

    let channel = match &opt.channel {
        Some(name) => Some(
            ctx.get_channel(name)
                .await
                .ok_or_else(|| BotStateError::MissingChannel(name.clone()))?,
        ),
        None => None,
    };
    let user = match ctx.get_user(&opt.user).await {
        Some(user) => user,
        None => Arc::new(UserDefinition {
            id: 0,
            name: opt.user.clone(),
            unping: false,
        }),
    };

    let dispatcher = Dispatcher::new(ctx);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| Error::Io("stdin read failed", err))?
    {
        let line = line.trim();
        if !line.starts_with(&prefix) {
            continue;
        }
        let mut parts = line.split_whitespace();
        let identifier = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.map(str::to_string).collect();

        let options = InvocationOptions {
            private_message: channel.is_none(),
            ..Default::default()
        };
        match dispatcher
            .check_and_execute(identifier, &args, channel.as_deref(), &user, options)
            .await
        {
            Ok(result) => {
                if let Some(reply) = result.reply {
                    println!("{}", reply);
                } else if let Some(reason) = result.reason {
                    info!("no reply ({})", reason);
                }
            }
            Err(err) => error!("Dispatch failed: {}", err),
        }
    }
    Ok(())
}
