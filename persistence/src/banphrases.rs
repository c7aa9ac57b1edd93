use serde::{Deserialize, Serialize};

/// Content-moderation rule applied to outbound replies.
///
/// The pattern code is declarative: a literal or regex match plus an
/// optional replacement or canned response, interpreted according to `kind`.
/// Patterns are compiled once at table load.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BanphraseDefinition {
    pub id: i64,
    pub kind: BanphraseKind,
    /// Literal phrase or regex, depending on `regex`
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub case_sensitive: bool,
    /// Substitution text for `Replacement` rules
    #[serde(default)]
    pub replacement: Option<String>,
    /// Canned reply for `CustomResponse` and `ApiResponse` rules
    #[serde(default)]
    pub response: Option<String>,
    /// Missing = applies on every platform
    #[serde(default)]
    pub platform_id: Option<i64>,
    /// Missing = applies in every channel of the platform scope
    #[serde(default)]
    pub channel_id: Option<i64>,
    /// Higher priority rules are checked first
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BanphraseKind {
    /// Matched message is dropped without a reply
    Denial,
    /// Matched fragment is substituted, cascade continues
    Replacement,
    /// Matched message is swapped for a canned reply
    CustomResponse,
    /// Reply template used when the external banphrase API flags a message
    ApiResponse,
    /// Kept for history, never evaluated
    Inactive,
}
