use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::banphrases::BanphraseDefinition;
use crate::channel::ChannelDefinition;
use crate::commands::CommandDefinition;
use crate::filters::FilterDefinition;
use crate::user::UserDefinition;
use crate::Result;

/// Bulk load/save access to the definition tables.
///
/// The bot loads every table wholesale at startup and on explicit reload.
/// The only row-level mutation is filter creation/toggling, which appends or
/// replaces a single filter row.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn load_commands(&self) -> Result<Vec<CommandDefinition>>;
    async fn load_filters(&self) -> Result<Vec<FilterDefinition>>;
    async fn load_banphrases(&self) -> Result<Vec<BanphraseDefinition>>;
    async fn load_channels(&self) -> Result<Vec<ChannelDefinition>>;
    async fn load_users(&self) -> Result<Vec<UserDefinition>>;

    /// Insert or replace a single filter row
    async fn save_filter(&self, filter: &FilterDefinition) -> Result<()>;
}

/// All definition tables in one document. This is both the on-disk layout of
/// [`TomlStore`] and a convenient way to assemble fixtures in tests.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DefinitionFile {
    pub commands: Vec<CommandDefinition>,
    pub filters: Vec<FilterDefinition>,
    pub banphrases: Vec<BanphraseDefinition>,
    pub channels: Vec<ChannelDefinition>,
    pub users: Vec<UserDefinition>,
}

impl DefinitionFile {
    pub fn parse(document: &str) -> Result<Self> {
        Ok(toml::from_str(document)?)
    }
}

/// File-backed definition store, one TOML document holding every table.
pub struct TomlStore {
    path: PathBuf,
}

impl TomlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TomlStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<DefinitionFile> {
        let document = tokio::fs::read_to_string(&self.path).await?;
        let file = DefinitionFile::parse(&document)?;
        debug!(
            "Read {}: {} commands, {} filters, {} banphrases, {} channels, {} users",
            self.path.display(),
            file.commands.len(),
            file.filters.len(),
            file.banphrases.len(),
            file.channels.len(),
            file.users.len()
        );
        Ok(file)
    }

    async fn write(&self, file: &DefinitionFile) -> Result<()> {
        let document = toml::to_string_pretty(file)?;
        tokio::fs::write(&self.path, document).await?;
        Ok(())
    }
}

#[async_trait]
impl DefinitionStore for TomlStore {
    async fn load_commands(&self) -> Result<Vec<CommandDefinition>> {
        Ok(self.read().await?.commands)
    }

    async fn load_filters(&self) -> Result<Vec<FilterDefinition>> {
        Ok(self.read().await?.filters)
    }

    async fn load_banphrases(&self) -> Result<Vec<BanphraseDefinition>> {
        Ok(self.read().await?.banphrases)
    }

    async fn load_channels(&self) -> Result<Vec<ChannelDefinition>> {
        Ok(self.read().await?.channels)
    }

    async fn load_users(&self) -> Result<Vec<UserDefinition>> {
        Ok(self.read().await?.users)
    }

    async fn save_filter(&self, filter: &FilterDefinition) -> Result<()> {
        let mut file = self.read().await?;
        match file.filters.iter_mut().find(|row| row.id == filter.id) {
            Some(row) => *row = filter.clone(),
            None => file.filters.push(filter.clone()),
        }
        self.write(&file).await
    }
}
