use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fnv::{FnvHashMap, FnvHashSet};

use persistence::commands::CommandDefinition;

/// Rate-limit store consumed by the dispatcher.
///
/// `set_pending` is an advisory marker, not a lock: it keeps a second
/// invocation from the same actor from reading a stale cooldown while the
/// first one is still between its cooldown check and cooldown set. It never
/// blocks a running command body.
#[async_trait]
pub trait CooldownManager: Send + Sync {
    /// Whether the (user, channel, command) triple may run right now
    async fn check(&self, command: &CommandDefinition, user_id: i64, channel_id: Option<i64>)
        -> bool;

    /// Arm the command's cooldown for this user and channel
    async fn set(&self, command: &CommandDefinition, user_id: i64, channel_id: Option<i64>);

    /// Set or clear the advisory pending marker for a (user, channel) pair
    async fn set_pending(&self, pending: bool, user_id: i64, channel_id: Option<i64>);

    /// Apply an escalated, command-independent cooldown to a user
    async fn penalize(&self, user_id: i64, channel_id: Option<i64>);
}

/// In-process implementation backed by expiry timestamps.
pub struct MemoryCooldownManager {
    cooldowns: Mutex<FnvHashMap<(i64, Option<i64>, i64), Instant>>,
    penalties: Mutex<FnvHashMap<(i64, Option<i64>), Instant>>,
    pending: Mutex<FnvHashSet<(i64, Option<i64>)>>,
    penalty: Duration,
}

const DEFAULT_PENALTY: Duration = Duration::from_secs(30);

impl MemoryCooldownManager {
    pub fn new(penalty: Duration) -> Self {
        MemoryCooldownManager {
            cooldowns: Mutex::new(FnvHashMap::default()),
            penalties: Mutex::new(FnvHashMap::default()),
            pending: Mutex::new(FnvHashSet::default()),
            penalty,
        }
    }
}

impl Default for MemoryCooldownManager {
    fn default() -> Self {
        MemoryCooldownManager::new(DEFAULT_PENALTY)
    }
}

#[async_trait]
impl CooldownManager for MemoryCooldownManager {
    async fn check(
        &self,
        command: &CommandDefinition,
        user_id: i64,
        channel_id: Option<i64>,
    ) -> bool {
        if self.pending.lock().unwrap().contains(&(user_id, channel_id)) {
            return false;
        }
        let now = Instant::now();
        if let Some(&until) = self.penalties.lock().unwrap().get(&(user_id, channel_id)) {
            if until > now {
                return false;
            }
        }
        match self
            .cooldowns
            .lock()
            .unwrap()
            .get(&(user_id, channel_id, command.id))
        {
            Some(&until) => until <= now,
            None => true,
        }
    }

    async fn set(&self, command: &CommandDefinition, user_id: i64, channel_id: Option<i64>) {
        if command.cooldown.is_zero() {
            return;
        }
        let until = Instant::now() + command.cooldown.into();
        self.cooldowns
            .lock()
            .unwrap()
            .insert((user_id, channel_id, command.id), until);
    }

    async fn set_pending(&self, pending: bool, user_id: i64, channel_id: Option<i64>) {
        let mut set = self.pending.lock().unwrap();
        if pending {
            set.insert((user_id, channel_id));
        } else {
            set.remove(&(user_id, channel_id));
        }
    }

    async fn penalize(&self, user_id: i64, channel_id: Option<i64>) {
        let until = Instant::now() + self.penalty;
        self.penalties
            .lock()
            .unwrap()
            .insert((user_id, channel_id), until);
    }
}
