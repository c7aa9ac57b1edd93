use std::path::{Path, PathBuf};
use std::{env, fs};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::Result;

#[derive(Debug, Clone, Builder)]
#[builder(derive(Serialize, Deserialize))]
pub struct BotConfig {
    /// Message prefix that marks a command invocation
    command_prefix: String,
    /// Definition file read by the TOML store
    #[builder(default = "String::from(\"definitions.toml\")")]
    definitions: String,
    /// User IDs that blacklist filters never apply to
    #[builder(default)]
    immune_users: Vec<i64>,
    /// Budget for a single external banphrase API round trip
    #[builder(default = "2500")]
    banphrase_api_timeout_ms: u64,
    /// Additional attempts after a failed external banphrase API call
    #[builder(default = "1")]
    banphrase_api_retries: u32,
    /// Prefix applied under the `notify` downtime policy
    #[builder(default = "String::from(\"(banphrase API is down!) \")")]
    banphrase_downtime_notice: String,
    /// Reply sent under the `refuse` downtime policy
    #[builder(
        default = "String::from(\"The moderation service for this channel is down, so the reply cannot be verified. Try again later.\")"
    )]
    banphrase_refusal: String,
    /// Reply sent when the external API flags a message and no api-response
    /// banphrase matches
    #[builder(default = "String::from(\"The reply contained a banned phrase and was not sent.\")")]
    banphrase_api_rejection: String,
    /// Reply template for internal command failures, `{id}` is replaced with
    /// the error correlation ID
    #[builder(default = "String::from(\"An internal error occurred - reference ID: {id}\")")]
    error_reply_template: String,
}

impl BotConfig {
    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    pub fn definitions(&self) -> &str {
        &self.definitions
    }

    pub fn immune_users(&self) -> &[i64] {
        &self.immune_users
    }

    pub fn banphrase_api_timeout_ms(&self) -> u64 {
        self.banphrase_api_timeout_ms
    }

    pub fn banphrase_api_retries(&self) -> u32 {
        self.banphrase_api_retries
    }

    pub fn banphrase_downtime_notice(&self) -> &str {
        &self.banphrase_downtime_notice
    }

    pub fn banphrase_refusal(&self) -> &str {
        &self.banphrase_refusal
    }

    pub fn banphrase_api_rejection(&self) -> &str {
        &self.banphrase_api_rejection
    }

    /// Render the generic failure reply for an error correlation ID
    pub fn error_reply(&self, correlation: Uuid) -> String {
        self.error_reply_template
            .replace("{id}", &correlation.to_string())
    }

    /// Load the bot's configuration. Attempts to load config files, by order
    /// of preference:
    ///
    /// - the explicitly given path, if any
    /// - $HOME/.strixbot.toml
    /// - /etc/strixbot/config.toml
    ///
    /// After loading any found config file, values from the following
    /// environment variables override the file values:
    ///
    /// - STRIXBOT_PREFIX
    /// - STRIXBOT_DEFINITIONS
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config_path = explicit_path.map(Path::to_path_buf);

        if config_path.is_none() {
            if let Some(mut home_dir) = dirs::home_dir() {
                home_dir.push(".strixbot.toml");
                if home_dir.exists() {
                    config_path.replace(home_dir);
                }
            }
        }

        if config_path.is_none() {
            let etc_path = PathBuf::from("/etc/strixbot/config.toml");
            if etc_path.exists() {
                config_path.replace(etc_path);
            }
        }

        let mut builder = if let Some(config_path) = config_path {
            debug!("Using config file: {}", config_path.to_string_lossy());
            let file_content = &fs::read_to_string(config_path)
                .map_err(|err| Error::Io("Error loading config file", err))?;
            toml::from_str::<BotConfigBuilder>(file_content)
                .map_err(|err| Error::Toml("Error while deserializing config file", err))?
        } else {
            BotConfigBuilder::default()
        };

        if let Ok(prefix) = env::var("STRIXBOT_PREFIX") {
            builder.command_prefix(prefix);
        }

        if let Ok(definitions) = env::var("STRIXBOT_DEFINITIONS") {
            builder.definitions(definitions);
        }

        builder.build().map_err(|err| Error::Config(err.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    pub(crate) fn test_config() -> BotConfig {
        BotConfigBuilder::default()
            .command_prefix("$".to_string())
            .build()
            .unwrap()
    }

    #[test]
    fn prefix_is_required() {
        assert!(BotConfigBuilder::default().build().is_err());
    }

    #[test]
    fn error_reply_contains_correlation_id() {
        let config = test_config();
        let id = Uuid::new_v4();
        let reply = config.error_reply(id);
        assert!(reply.contains(&id.to_string()));
    }
}
