use serde::{Deserialize, Serialize};

/// Persisted user data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserDefinition {
    pub id: i64,
    pub name: String,
    /// When set, the user's name is rewritten in every outbound reply so
    /// chat clients do not raise a mention notification
    #[serde(default)]
    pub unping: bool,
}
