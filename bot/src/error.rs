use thiserror::Error;

use crate::handlers::commands::error::CommandError;
use crate::state::BotStateError;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// IO errors
    #[error("{0}")]
    Io(&'static str, std::io::Error),
    /// TOML deserialization errors
    #[error("{0}")]
    Toml(&'static str, #[source] toml::de::Error),
    /// Configuration errors (missing values etc)
    #[error("Bot configuration error: {0}")]
    Config(String),
    #[error("Internal bot state error: {0}")]
    BotState(#[from] BotStateError),
    #[error("Command error: {0}")]
    Command(#[from] CommandError),
    #[error("{0}")]
    Persistence(#[from] persistence::Error),
    #[error("Banphrase API client error: {0}")]
    BanphraseApi(#[from] banphrase_client::Error),
    /// Transaction open/commit/rollback failure reported by the provider
    #[error("Transaction error: {0}")]
    Transaction(String),
}
