use std::ops::Deref;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Persisted command attributes.
///
/// A definition is immutable after load; reloads replace the whole command
/// table, they never mutate rows that are already referenced by an in-flight
/// invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommandDefinition {
    pub id: i64,
    /// Primary name of the command
    pub name: String,
    /// Additional names, unique across all commands
    #[serde(default)]
    pub aliases: Vec<String>,
    /// User facing description
    #[serde(default)]
    pub description: Option<String>,
    /// Name of the compiled command body. Used to look up the handler in the
    /// body registry at load time.
    pub handler_name: String,
    /// Minimum time between uses per user and channel
    #[serde(default)]
    pub cooldown: DurationMillis,
    #[serde(default)]
    pub flags: CommandFlags,
    /// Override reply shown when a whitelisted command is used outside its
    /// whitelist
    #[serde(default)]
    pub whitelist_response: Option<String>,
}

/// Behavior switches of a single command.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CommandFlags {
    /// Run the body inside a transaction, committed or rolled back based on
    /// the final banphrase verdict
    pub rollbackable: bool,
    /// Skip the outbound banphrase cascade for this command's replies
    pub skip_banphrases: bool,
    /// Only usable where a whitelist filter explicitly allows it
    pub whitelisted: bool,
    /// Produces no reply and skips cooldowns and post-processing entirely
    pub read_only: bool,
    /// Users may opt out of being this command's target
    pub opt_outable: bool,
    /// May be blocked per-target (reserved for user-level blocks)
    pub blockable: bool,
    /// Output may feed into another command
    pub pipeable: bool,
    /// Prefix replies with the invoking user's name
    pub ping: bool,
}

/// Millisecond duration as stored in definition files. Negative values are
/// unrepresentable.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct DurationMillis(u64);

impl DurationMillis {
    pub fn new(millis: u64) -> Self {
        DurationMillis(millis)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Deref for DurationMillis {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<DurationMillis> for Duration {
    fn from(millis: DurationMillis) -> Self {
        Duration::from_millis(millis.0)
    }
}
