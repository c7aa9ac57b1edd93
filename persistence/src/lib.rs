//! Definition rows and bulk loading for the bot's command, filter and
//! banphrase tables.
//!
//! Everything in here is plain data: the bot crate compiles these rows into
//! its in-memory snapshot stores and never touches the backing file again
//! until an explicit reload.

use thiserror::Error;

pub mod banphrases;
pub mod channel;
pub mod commands;
pub mod filters;
pub mod store;
pub mod user;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Definition file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Definition file parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Definition file serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
