//! Chat-bot command framework.
//!
//! The core of the crate is the dispatch pipeline: every incoming
//! invocation is checked against cooldowns and authorization filters,
//! executed under an optional transaction, and its reply is rewritten or
//! vetoed by the banphrase cascade before anything reaches the network.
//! Platform adapters drive [`dispatch::Dispatcher::check_and_execute`] and
//! deliver the resulting reply themselves.

#[macro_use]
extern crate log;

use std::result::Result as StdResult;

pub mod banphrase;
pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod state;
pub mod transaction;
pub mod util;

pub use crate::error::Error;

pub type Result<T> = StdResult<T, Error>;
