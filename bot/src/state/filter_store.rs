use fnv::FnvHashSet;

use persistence::commands::CommandDefinition;
use persistence::filters::{FilterDefinition, FilterKind, ResponseMode};
use persistence::user::UserDefinition;

use crate::state::BotStateError;
use crate::Result;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Pass,
    Blocked {
        /// Message to send instead of running the command, if any
        reply: Option<String>,
        /// The offending user earns an escalated cooldown
        penalize: bool,
    },
}

impl FilterVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, FilterVerdict::Blocked { .. })
    }

    fn silent() -> Self {
        FilterVerdict::Blocked {
            reply: None,
            penalize: false,
        }
    }

    fn reply(reply: impl Into<String>) -> Self {
        FilterVerdict::Blocked {
            reply: Some(reply.into()),
            penalize: false,
        }
    }
}

const USER_CHANNEL_COMMAND: &str = "You cannot execute that command in this channel.";
const CHANNEL_COMMAND: &str = "This command cannot be executed in this channel.";
const USER_CHANNEL: &str = "You cannot execute any commands in this channel.";
const USER_COMMAND: &str = "You cannot execute that command.";
const USER_ONLY: &str = "You cannot execute any commands.";
const COMMAND_ONLY: &str = "This command cannot be executed.";
const CHANNEL_ONLY: &str = "No commands can be executed in this channel.";
const OPTED_OUT: &str = "That user has opted out from being the target of this command.";

/// Snapshot of the filter table plus the immunity allow-list.
///
/// Checks are synchronous and purely in-memory; the snapshot is swapped
/// wholesale on reload, while single-row mutations (`upserted`, `toggled`)
/// produce a modified copy for the caller to swap in.
pub struct FilterStore {
    filters: Vec<FilterDefinition>,
    immune_users: FnvHashSet<i64>,
}

fn scope_matches(filter_field: Option<i64>, actual: Option<i64>) -> bool {
    match filter_field {
        Some(required) => actual == Some(required),
        None => true,
    }
}

impl FilterStore {
    /// Validate and retain filter rows in their stored order. A `reason`
    /// response without a reason text is a per-row configuration fault: the
    /// row is reported and dropped, the rest of the table loads.
    pub fn load(definitions: Vec<FilterDefinition>, immune_users: &[i64]) -> Self {
        let filters = definitions
            .into_iter()
            .filter(|row| {
                if row.response == ResponseMode::Reason && row.reason.is_none() {
                    error!("Filter {} has a reason response but no reason, skipping", row.id);
                    return false;
                }
                true
            })
            .collect();

        FilterStore {
            filters,
            immune_users: immune_users.iter().copied().collect(),
        }
    }

    /// Combined authorization check for one invocation, blacklists first.
    pub fn check(
        &self,
        user_id: i64,
        channel_id: Option<i64>,
        command: &CommandDefinition,
    ) -> Result<FilterVerdict> {
        let blacklisted = self.check_blacklists(user_id, channel_id, command.id)?;
        if blacklisted.is_blocked() {
            return Ok(blacklisted);
        }
        Ok(self.check_whitelists(user_id, channel_id, command))
    }

    /// Scan active blacklist rows in table order and reject on the first
    /// match. Immune users always pass.
    pub fn check_blacklists(
        &self,
        user_id: i64,
        channel_id: Option<i64>,
        command_id: i64,
    ) -> Result<FilterVerdict> {
        if self.immune_users.contains(&user_id) {
            return Ok(FilterVerdict::Pass);
        }

        let matched = self
            .filters
            .iter()
            .filter(|row| row.active && row.kind == FilterKind::Blacklist)
            .find(|row| {
                let scoped = row.user_id.is_some() || row.channel_id.is_some() || row.command_id.is_some();
                scoped
                    && scope_matches(row.user_id, Some(user_id))
                    && scope_matches(row.channel_id, channel_id)
                    && scope_matches(row.command_id, Some(command_id))
            });

        let row = match matched {
            Some(row) => row,
            None => return Ok(FilterVerdict::Pass),
        };

        match row.response {
            ResponseMode::None => Ok(FilterVerdict::silent()),
            ResponseMode::Reason => match &row.reason {
                Some(reason) => Ok(FilterVerdict::reply(reason.clone())),
                // load() drops these rows, but a hand-built store may not
                // have gone through it
                None => self.derive_rejection(row),
            },
            ResponseMode::Auto => self.derive_rejection(row),
        }
    }

    /// Derive the canned rejection from the populated scope fields. Each of
    /// the seven legal combinations has a distinct message; the all-empty
    /// combination cannot legitimately have matched and is a fatal
    /// configuration fault.
    fn derive_rejection(&self, row: &FilterDefinition) -> Result<FilterVerdict> {
        let combination = (
            row.user_id.is_some(),
            row.channel_id.is_some(),
            row.command_id.is_some(),
        );
        let verdict = match combination {
            (true, true, true) => FilterVerdict::reply(USER_CHANNEL_COMMAND),
            (false, true, true) => FilterVerdict::reply(CHANNEL_COMMAND),
            (true, true, false) => FilterVerdict::Blocked {
                reply: Some(USER_CHANNEL.to_string()),
                penalize: true,
            },
            (true, false, true) => FilterVerdict::reply(USER_COMMAND),
            (true, false, false) => FilterVerdict::Blocked {
                reply: Some(USER_ONLY.to_string()),
                penalize: true,
            },
            (false, false, true) => FilterVerdict::reply(COMMAND_ONLY),
            (false, true, false) => FilterVerdict::reply(CHANNEL_ONLY),
            (false, false, false) => {
                return Err(BotStateError::UnscopedBlacklist(row.id).into());
            }
        };
        Ok(verdict)
    }

    /// Whitelist gate: only ever blocks commands flagged as whitelisted, and
    /// only when no active whitelist row admits this user or channel.
    pub fn check_whitelists(
        &self,
        user_id: i64,
        channel_id: Option<i64>,
        command: &CommandDefinition,
    ) -> FilterVerdict {
        if !command.flags.whitelisted {
            return FilterVerdict::Pass;
        }

        let admitted = self
            .filters
            .iter()
            .filter(|row| {
                row.active
                    && row.kind == FilterKind::Whitelist
                    && row.command_id == Some(command.id)
            })
            .any(|row| {
                let by_user = row.user_id == Some(user_id) && scope_matches(row.channel_id, channel_id);
                let by_channel = row.channel_id.is_some()
                    && row.channel_id == channel_id
                    && scope_matches(row.user_id, Some(user_id));
                by_user || by_channel
            });

        if admitted {
            FilterVerdict::Pass
        } else {
            FilterVerdict::silent()
        }
    }

    /// Whether the target user has opted out of being this command's
    /// argument.
    pub fn check_opt_outs(
        &self,
        target: &UserDefinition,
        command: &CommandDefinition,
    ) -> FilterVerdict {
        let matched = self
            .filters
            .iter()
            .filter(|row| row.active && row.kind == FilterKind::OptOut)
            .find(|row| {
                row.user_id == Some(target.id) && scope_matches(row.command_id, Some(command.id))
            });

        match matched {
            None => FilterVerdict::Pass,
            Some(row) => match (&row.response, &row.reason) {
                (ResponseMode::None, _) => FilterVerdict::silent(),
                (ResponseMode::Reason, Some(reason)) => FilterVerdict::reply(reason.clone()),
                _ => FilterVerdict::reply(OPTED_OUT),
            },
        }
    }

    pub fn rows(&self) -> &[FilterDefinition] {
        &self.filters
    }

    pub fn next_id(&self) -> i64 {
        self.filters.iter().map(|row| row.id).max().unwrap_or(0) + 1
    }

    /// Copy of this snapshot with one row inserted or replaced
    pub fn upserted(&self, row: FilterDefinition) -> FilterStore {
        let mut filters = self.filters.clone();
        match filters.iter_mut().find(|existing| existing.id == row.id) {
            Some(existing) => *existing = row,
            None => filters.push(row),
        }
        FilterStore {
            filters,
            immune_users: self.immune_users.clone(),
        }
    }

    /// Copy of this snapshot with one row's `active` flag flipped. Returns
    /// the new snapshot and the toggled row.
    pub fn toggled(&self, filter_id: i64) -> Option<(FilterStore, FilterDefinition)> {
        let mut filters = self.filters.clone();
        let row = filters.iter_mut().find(|row| row.id == filter_id)?;
        row.active = !row.active;
        let toggled = row.clone();
        Some((
            FilterStore {
                filters,
                immune_users: self.immune_users.clone(),
            },
            toggled,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use persistence::commands::{CommandFlags, DurationMillis};

    fn command(id: i64, whitelisted: bool) -> CommandDefinition {
        CommandDefinition {
            id,
            name: format!("cmd{}", id),
            aliases: vec![],
            description: None,
            handler_name: "test".to_string(),
            cooldown: DurationMillis::default(),
            flags: CommandFlags {
                whitelisted,
                ..CommandFlags::default()
            },
            whitelist_response: None,
        }
    }

    fn filter(
        id: i64,
        user: Option<i64>,
        channel: Option<i64>,
        cmd: Option<i64>,
        kind: FilterKind,
        response: ResponseMode,
    ) -> FilterDefinition {
        FilterDefinition {
            id,
            user_id: user,
            channel_id: channel,
            command_id: cmd,
            kind,
            response,
            reason: None,
            active: true,
        }
    }

    fn store(filters: Vec<FilterDefinition>) -> FilterStore {
        FilterStore::load(filters, &[])
    }

    #[test]
    fn silent_user_blacklist_blocks_everywhere() {
        // user 42 banned globally with no message
        let store = store(vec![filter(
            1,
            Some(42),
            None,
            None,
            FilterKind::Blacklist,
            ResponseMode::None,
        )]);
        assert_eq!(
            store.check(42, Some(7), &command(3, false)).unwrap(),
            FilterVerdict::Blocked {
                reply: None,
                penalize: false
            }
        );
        assert_eq!(
            store.check(43, Some(7), &command(3, false)).unwrap(),
            FilterVerdict::Pass
        );
    }

    #[test]
    fn immune_users_bypass_blacklists() {
        let store = FilterStore::load(
            vec![filter(
                1,
                Some(42),
                None,
                None,
                FilterKind::Blacklist,
                ResponseMode::None,
            )],
            &[42],
        );
        assert_eq!(
            store.check(42, None, &command(1, false)).unwrap(),
            FilterVerdict::Pass
        );
    }

    #[test]
    fn reason_response_is_forwarded() {
        let mut row = filter(
            1,
            Some(9),
            None,
            Some(4),
            FilterKind::Blacklist,
            ResponseMode::Reason,
        );
        row.reason = Some("Abuse.".to_string());
        let store = store(vec![row]);
        assert_eq!(
            store.check(9, None, &command(4, false)).unwrap(),
            FilterVerdict::Blocked {
                reply: Some("Abuse.".to_string()),
                penalize: false
            }
        );
    }

    #[test]
    fn reason_response_without_reason_is_dropped_at_load() {
        let store = store(vec![filter(
            1,
            Some(9),
            None,
            None,
            FilterKind::Blacklist,
            ResponseMode::Reason,
        )]);
        assert!(store.rows().is_empty());
    }

    #[test]
    fn seven_combinations_have_distinct_messages() {
        let combos: [(Option<i64>, Option<i64>, Option<i64>); 7] = [
            (Some(1), Some(2), Some(3)),
            (None, Some(2), Some(3)),
            (Some(1), Some(2), None),
            (Some(1), None, Some(3)),
            (Some(1), None, None),
            (None, None, Some(3)),
            (None, Some(2), None),
        ];
        let mut messages = Vec::new();
        for (i, (user, channel, cmd)) in combos.iter().enumerate() {
            let store = store(vec![filter(
                i as i64 + 1,
                *user,
                *channel,
                *cmd,
                FilterKind::Blacklist,
                ResponseMode::Auto,
            )]);
            match store.check_blacklists(1, Some(2), 3).unwrap() {
                FilterVerdict::Blocked {
                    reply: Some(reply), ..
                } => messages.push(reply),
                other => panic!("combination {:?} produced {:?}", combos[i], other),
            }
        }
        let unique: std::collections::HashSet<_> = messages.iter().collect();
        assert_eq!(unique.len(), 7);
    }

    #[test]
    fn user_scoped_rejections_penalize() {
        // user-only
        let store1 = store(vec![filter(
            1,
            Some(1),
            None,
            None,
            FilterKind::Blacklist,
            ResponseMode::Auto,
        )]);
        assert!(matches!(
            store1.check_blacklists(1, Some(2), 3).unwrap(),
            FilterVerdict::Blocked { penalize: true, .. }
        ));
        // user+channel
        let store2 = store(vec![filter(
            2,
            Some(1),
            Some(2),
            None,
            FilterKind::Blacklist,
            ResponseMode::Auto,
        )]);
        assert!(matches!(
            store2.check_blacklists(1, Some(2), 3).unwrap(),
            FilterVerdict::Blocked { penalize: true, .. }
        ));
        // user+command does not
        let store3 = store(vec![filter(
            3,
            Some(1),
            None,
            Some(3),
            FilterKind::Blacklist,
            ResponseMode::Auto,
        )]);
        assert!(matches!(
            store3.check_blacklists(1, Some(2), 3).unwrap(),
            FilterVerdict::Blocked {
                penalize: false,
                ..
            }
        ));
    }

    #[test]
    fn unscoped_blacklist_is_a_fatal_configuration_error() {
        // bypass load() validation to simulate a corrupted table
        let store = FilterStore {
            filters: vec![filter(
                1,
                None,
                None,
                None,
                FilterKind::Blacklist,
                ResponseMode::Auto,
            )],
            immune_users: FnvHashSet::default(),
        };
        // the row matches nothing (no scope fields), so the scan passes it by
        assert_eq!(store.check_blacklists(1, Some(2), 3).unwrap(), FilterVerdict::Pass);
        // but deriving a message from it must raise
        assert!(store.derive_rejection(&store.filters[0]).is_err());
    }

    #[test]
    fn inactive_filters_are_ignored() {
        let mut row = filter(
            1,
            Some(42),
            None,
            None,
            FilterKind::Blacklist,
            ResponseMode::None,
        );
        row.active = false;
        let store = store(vec![row]);
        assert_eq!(
            store.check(42, None, &command(1, false)).unwrap(),
            FilterVerdict::Pass
        );
    }

    #[test]
    fn non_whitelisted_commands_never_blocked_by_whitelists() {
        // whitelist rows exist but the command is not flagged
        let store = store(vec![filter(
            1,
            Some(99),
            None,
            Some(3),
            FilterKind::Whitelist,
            ResponseMode::Auto,
        )]);
        assert_eq!(
            store.check_whitelists(1, Some(2), &command(3, false)),
            FilterVerdict::Pass
        );
    }

    #[test]
    fn whitelisted_command_requires_matching_row() {
        let cmd = command(3, true);
        let store = store(vec![
            filter(1, Some(1), None, Some(3), FilterKind::Whitelist, ResponseMode::Auto),
            filter(2, None, Some(5), Some(3), FilterKind::Whitelist, ResponseMode::Auto),
        ]);
        // admitted by user row
        assert_eq!(store.check_whitelists(1, Some(2), &cmd), FilterVerdict::Pass);
        // admitted by channel row
        assert_eq!(store.check_whitelists(8, Some(5), &cmd), FilterVerdict::Pass);
        // no row admits user 8 in channel 2
        assert!(store.check_whitelists(8, Some(2), &cmd).is_blocked());
        // whitelist rows for other commands do not admit
        assert!(store
            .check_whitelists(1, Some(2), &command(4, true))
            .is_blocked());
    }

    #[test]
    fn opt_out_rows_block_targeting() {
        let target = UserDefinition {
            id: 10,
            name: "target".to_string(),
            unping: false,
        };
        let store = store(vec![filter(
            1,
            Some(10),
            None,
            Some(3),
            FilterKind::OptOut,
            ResponseMode::Auto,
        )]);
        assert!(store.check_opt_outs(&target, &command(3, false)).is_blocked());
        assert_eq!(
            store.check_opt_outs(&target, &command(4, false)),
            FilterVerdict::Pass
        );
    }

    #[test]
    fn toggle_flips_active() {
        let base = store(vec![filter(
            1,
            Some(42),
            None,
            None,
            FilterKind::Blacklist,
            ResponseMode::None,
        )]);
        let (toggled, row) = base.toggled(1).unwrap();
        assert!(!row.active);
        assert_eq!(
            toggled.check(42, None, &command(1, false)).unwrap(),
            FilterVerdict::Pass
        );
        let (restored, row) = toggled.toggled(1).unwrap();
        assert!(row.active);
        assert!(restored.check(42, None, &command(1, false)).unwrap().is_blocked());
        assert!(base.toggled(99).is_none());
    }

    #[test]
    fn upsert_appends_and_replaces() {
        let base = store(vec![]);
        assert_eq!(base.next_id(), 1);
        let with_row = base.upserted(filter(
            1,
            Some(5),
            None,
            None,
            FilterKind::Blacklist,
            ResponseMode::None,
        ));
        assert_eq!(with_row.rows().len(), 1);
        let replaced = with_row.upserted(filter(
            1,
            Some(6),
            None,
            None,
            FilterKind::Blacklist,
            ResponseMode::None,
        ));
        assert_eq!(replaced.rows().len(), 1);
        assert_eq!(replaced.rows()[0].user_id, Some(6));
        assert_eq!(replaced.next_id(), 2);
    }
}
