use serde::{Deserialize, Serialize};

/// Persisted channel data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChannelDefinition {
    pub id: i64,
    pub name: String,
    pub platform_id: i64,
    #[serde(default)]
    pub mode: ChannelMode,
    /// Whether replies in this channel may ping the invoking user
    #[serde(default = "default_mention")]
    pub mention: bool,
    /// External banphrase API wiring; both `api` fields must be present for
    /// the fallback to run
    #[serde(default)]
    pub banphrase_api_type: Option<BanphraseApiKind>,
    #[serde(default)]
    pub banphrase_api_url: Option<String>,
    #[serde(default)]
    pub banphrase_api_downtime: DowntimePolicy,
}

fn default_mention() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelMode {
    /// The bot ignores the channel entirely
    Inactive,
    /// Messages are observed but commands never run
    Read,
    #[default]
    Write,
}

impl ChannelMode {
    /// Whether commands may execute in a channel with this mode
    pub fn allows_commands(self) -> bool {
        matches!(self, ChannelMode::Write)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BanphraseApiKind {
    Pajbot,
}

/// What the banphrase engine does when the external API is unreachable.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DowntimePolicy {
    /// Pass the message through unchecked
    Ignore,
    /// Pass the message through, prefixed with a warning
    Notify,
    /// Drop the message and reply with a generic refusal
    #[default]
    Refuse,
}

impl ChannelDefinition {
    /// The channel's external banphrase API endpoint, if fully configured
    pub fn banphrase_api(&self) -> Option<(BanphraseApiKind, &str)> {
        match (self.banphrase_api_type, self.banphrase_api_url.as_deref()) {
            (Some(kind), Some(url)) => Some((kind, url)),
            _ => None,
        }
    }
}
