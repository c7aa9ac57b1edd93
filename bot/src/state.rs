use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use fnv::FnvHashMap;
use futures::future::join5;
use thiserror::Error;
use tokio::sync::RwLock;

use banphrase_client::BanphraseApiClient;
use persistence::channel::ChannelDefinition;
use persistence::filters::{FilterDefinition, FilterKind, ResponseMode};
use persistence::store::DefinitionStore;
use persistence::user::UserDefinition;

use crate::banphrase::{BanphraseEngine, ExternalBanphraseApi};
use crate::config::BotConfig;
use crate::cooldown::{CooldownManager, MemoryCooldownManager};
use crate::handlers::commands::{builtin_bodies, BodyRegistry};
use crate::logging::{ExecutionLogger, LogExecutionLogger, LogSystemLogger, SystemLogger};
use crate::state::banphrase_store::BanphraseStore;
use crate::state::command_store::CommandStore;
use crate::state::filter_store::FilterStore;
use crate::transaction::{NoopTransactionProvider, TransactionProvider};
use crate::Result;

pub mod banphrase_store;
pub mod command_store;
pub mod filter_store;

#[derive(Clone)]
pub struct BotContext(Arc<InnerBotContext>);

impl fmt::Debug for BotContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotContext")
            .field("commands", &self.commands.load().len())
            .field("banphrases", &self.banphrases.load().len())
            .finish()
    }
}

impl Deref for BotContext {
    type Target = InnerBotContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct InnerBotContext {
    pub config: BotConfig,
    pub store: Arc<dyn DefinitionStore>,
    /// Snapshot tables, swapped wholesale on reload so a reader never sees a
    /// partially reloaded table
    pub commands: ArcSwap<CommandStore>,
    pub filters: ArcSwap<FilterStore>,
    pub banphrases: ArcSwap<BanphraseStore>,
    pub cooldowns: Arc<dyn CooldownManager>,
    pub execution_logger: Arc<dyn ExecutionLogger>,
    pub system_logger: Arc<dyn SystemLogger>,
    pub transactions: Arc<dyn TransactionProvider>,
    pub banphrase_engine: BanphraseEngine,
    bodies: BodyRegistry,
    state: BotState,
}

#[derive(Default)]
struct BotState {
    channels: RwLock<FnvHashMap<String, Arc<ChannelDefinition>>>,
    users: RwLock<FnvHashMap<String, Arc<UserDefinition>>>,
}

/// Injected collaborators. [`BotContext::create`] wires the in-crate
/// defaults; adapters and tests substitute their own.
pub struct Collaborators {
    pub cooldowns: Arc<dyn CooldownManager>,
    pub execution_logger: Arc<dyn ExecutionLogger>,
    pub system_logger: Arc<dyn SystemLogger>,
    pub transactions: Arc<dyn TransactionProvider>,
    pub banphrase_api: Arc<dyn ExternalBanphraseApi>,
}

impl BotContext {
    /// Create a context with the default collaborator implementations.
    pub async fn create(config: BotConfig, store: Arc<dyn DefinitionStore>) -> Result<Self> {
        let api = BanphraseApiClient::new(Duration::from_millis(config.banphrase_api_timeout_ms()))?;
        let collaborators = Collaborators {
            cooldowns: Arc::new(MemoryCooldownManager::default()),
            execution_logger: Arc::new(LogExecutionLogger),
            system_logger: Arc::new(LogSystemLogger),
            transactions: Arc::new(NoopTransactionProvider),
            banphrase_api: Arc::new(api),
        };
        Self::create_with(config, store, collaborators, builtin_bodies()).await
    }

    pub async fn create_with(
        config: BotConfig,
        store: Arc<dyn DefinitionStore>,
        collaborators: Collaborators,
        bodies: BodyRegistry,
    ) -> Result<Self> {
        let (commands, filters, banphrases, channels, users) = join5(
            store.load_commands(),
            store.load_filters(),
            store.load_banphrases(),
            store.load_channels(),
            store.load_users(),
        )
        .await;

        let banphrase_engine = BanphraseEngine::new(collaborators.banphrase_api, &config);
        let ctx = BotContext(Arc::new(InnerBotContext {
            commands: ArcSwap::from_pointee(CommandStore::load(commands?, &bodies)),
            filters: ArcSwap::from_pointee(FilterStore::load(filters?, config.immune_users())),
            banphrases: ArcSwap::from_pointee(BanphraseStore::load(banphrases?)),
            cooldowns: collaborators.cooldowns,
            execution_logger: collaborators.execution_logger,
            system_logger: collaborators.system_logger,
            transactions: collaborators.transactions,
            banphrase_engine,
            config,
            store,
            bodies,
            state: BotState::default(),
        }));
        ctx.replace_channels(channels?).await;
        ctx.replace_users(users?).await;
        Ok(ctx)
    }

    pub async fn get_channel(&self, name: &str) -> Option<Arc<ChannelDefinition>> {
        self.state
            .channels
            .read()
            .await
            .get(&name.to_lowercase())
            .cloned()
    }

    /// Resolve a user by name as given in chat (leading @ and case ignored)
    pub async fn get_user(&self, name: &str) -> Option<Arc<UserDefinition>> {
        let key = name.trim_start_matches('@').to_lowercase();
        self.state.users.read().await.get(&key).cloned()
    }

    /// Names of every user flagged for unping rewriting
    pub async fn unping_names(&self) -> Vec<String> {
        self.state
            .users
            .read()
            .await
            .values()
            .filter(|user| user.unping)
            .map(|user| user.name.clone())
            .collect()
    }

    pub async fn reload_commands(&self) -> Result<()> {
        let definitions = self.store.load_commands().await?;
        self.commands
            .store(Arc::new(CommandStore::load(definitions, &self.bodies)));
        Ok(())
    }

    pub async fn reload_filters(&self) -> Result<()> {
        let definitions = self.store.load_filters().await?;
        self.filters.store(Arc::new(FilterStore::load(
            definitions,
            self.config.immune_users(),
        )));
        Ok(())
    }

    pub async fn reload_banphrases(&self) -> Result<()> {
        let definitions = self.store.load_banphrases().await?;
        self.banphrases
            .store(Arc::new(BanphraseStore::load(definitions)));
        Ok(())
    }

    pub async fn reload_channels(&self) -> Result<()> {
        let definitions = self.store.load_channels().await?;
        self.replace_channels(definitions).await;
        Ok(())
    }

    pub async fn reload_users(&self) -> Result<()> {
        let definitions = self.store.load_users().await?;
        self.replace_users(definitions).await;
        Ok(())
    }

    pub async fn reload_all(&self) -> Result<()> {
        let (commands, filters, banphrases, channels, users) = join5(
            self.reload_commands(),
            self.reload_filters(),
            self.reload_banphrases(),
            self.reload_channels(),
            self.reload_users(),
        )
        .await;
        commands?;
        filters?;
        banphrases?;
        channels?;
        users?;
        Ok(())
    }

    async fn replace_channels(&self, definitions: Vec<ChannelDefinition>) {
        let map = definitions
            .into_iter()
            .map(|channel| (channel.name.to_lowercase(), Arc::new(channel)))
            .collect();
        *self.state.channels.write().await = map;
    }

    async fn replace_users(&self, definitions: Vec<UserDefinition>) {
        let map = definitions
            .into_iter()
            .map(|user| (user.name.to_lowercase(), Arc::new(user)))
            .collect();
        *self.state.users.write().await = map;
    }

    /// Persist a new filter row and swap an updated filter snapshot in.
    pub async fn create_filter(&self, options: NewFilter) -> Result<FilterDefinition> {
        if options.response == ResponseMode::Reason && options.reason.is_none() {
            return Err(BotStateError::MissingFilterReason.into());
        }
        let filters = self.filters.load_full();
        let row = FilterDefinition {
            id: filters.next_id(),
            user_id: options.user_id,
            channel_id: options.channel_id,
            command_id: options.command_id,
            kind: options.kind,
            response: options.response,
            reason: options.reason,
            active: true,
        };
        self.store.save_filter(&row).await?;
        self.filters.store(Arc::new(filters.upserted(row.clone())));
        Ok(row)
    }

    /// Flip a filter row's active flag, persist it and swap the snapshot.
    /// Returns the toggled row, or nothing for an unknown ID.
    pub async fn toggle_filter(&self, filter_id: i64) -> Result<Option<FilterDefinition>> {
        let filters = self.filters.load_full();
        match filters.toggled(filter_id) {
            Some((snapshot, row)) => {
                self.store.save_filter(&row).await?;
                self.filters.store(Arc::new(snapshot));
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }
}

/// Options for creating a filter row; the ID and active flag are assigned by
/// the engine.
#[derive(Debug, Clone)]
pub struct NewFilter {
    pub user_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub command_id: Option<i64>,
    pub kind: FilterKind,
    pub response: ResponseMode,
    pub reason: Option<String>,
}

#[derive(Debug, Error)]
pub enum BotStateError {
    #[error("Blacklist filter {0} has no scope fields set")]
    UnscopedBlacklist(i64),
    #[error("A reason response filter requires a reason text")]
    MissingFilterReason,
    #[error("Channel {0} is not known")]
    MissingChannel(String),
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use persistence::banphrases::BanphraseDefinition;
    use persistence::commands::CommandDefinition;
    use persistence::store::DefinitionFile;

    use super::*;

    /// In-memory definition store for tests, recording filter saves.
    pub struct MemoryStore {
        file: Mutex<DefinitionFile>,
    }

    impl MemoryStore {
        pub fn new(file: DefinitionFile) -> Self {
            MemoryStore {
                file: Mutex::new(file),
            }
        }

        pub fn saved_filters(&self) -> Vec<FilterDefinition> {
            self.file.lock().unwrap().filters.clone()
        }
    }

    #[async_trait]
    impl DefinitionStore for MemoryStore {
        async fn load_commands(&self) -> persistence::Result<Vec<CommandDefinition>> {
            Ok(self.file.lock().unwrap().commands.clone())
        }

        async fn load_filters(&self) -> persistence::Result<Vec<FilterDefinition>> {
            Ok(self.file.lock().unwrap().filters.clone())
        }

        async fn load_banphrases(&self) -> persistence::Result<Vec<BanphraseDefinition>> {
            Ok(self.file.lock().unwrap().banphrases.clone())
        }

        async fn load_channels(&self) -> persistence::Result<Vec<ChannelDefinition>> {
            Ok(self.file.lock().unwrap().channels.clone())
        }

        async fn load_users(&self) -> persistence::Result<Vec<UserDefinition>> {
            Ok(self.file.lock().unwrap().users.clone())
        }

        async fn save_filter(&self, filter: &FilterDefinition) -> persistence::Result<()> {
            let mut file = self.file.lock().unwrap();
            match file.filters.iter_mut().find(|row| row.id == filter.id) {
                Some(row) => *row = filter.clone(),
                None => file.filters.push(filter.clone()),
            }
            Ok(())
        }
    }
}
