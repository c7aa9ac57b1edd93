use serde::{Deserialize, Serialize};

/// Authorization rule for a (user, channel, command) combination.
///
/// Each scope field is optional; a missing field means "any". A filter with
/// all three fields missing is a legal global rule for whitelists and
/// opt-outs; for blacklists the engine treats it as a configuration error
/// when it has to derive a rejection message from it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FilterDefinition {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub command_id: Option<i64>,
    pub kind: FilterKind,
    #[serde(default)]
    pub response: ResponseMode,
    /// Required when `response` is `Reason`
    #[serde(default)]
    pub reason: Option<String>,
    /// Toggled on un/ban, rows are never hard-deleted
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKind {
    Blacklist,
    Whitelist,
    OptOut,
}

/// How a matched filter phrases its rejection.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseMode {
    /// Reject silently
    None,
    /// Derive a canned message from the populated scope fields
    #[default]
    Auto,
    /// Reply with the row's `reason`
    Reason,
}
