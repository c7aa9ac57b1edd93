use std::sync::Arc;

use fnv::FnvHashMap;

use persistence::commands::CommandDefinition;

use crate::handlers::commands::{BodyRegistry, CommandBody};

/// A loaded command: its persisted attributes bound to the compiled body
/// registered under its handler name.
pub struct Command {
    pub def: CommandDefinition,
    pub body: Arc<dyn CommandBody>,
}

/// Snapshot of the command table. Replaced wholesale on reload; an in-flight
/// invocation keeps the snapshot it resolved its command from.
pub struct CommandStore {
    /// Map of name/alias -> command id
    aliases: FnvHashMap<String, i64>,
    /// Map of command id -> command
    commands: FnvHashMap<i64, Arc<Command>>,
}

impl CommandStore {
    /// Bind definitions to bodies. Definitions that name an unknown handler
    /// or collide on a name are reported and skipped; one bad row never
    /// aborts the load.
    pub fn load(definitions: Vec<CommandDefinition>, registry: &BodyRegistry) -> Self {
        let mut aliases = FnvHashMap::default();
        let mut commands = FnvHashMap::default();

        for def in definitions {
            let body = match registry.get(def.handler_name.as_str()) {
                Some(body) => Arc::clone(body),
                None => {
                    error!(
                        "Command {} ({}) references unknown handler {:?}, skipping",
                        def.id, def.name, def.handler_name
                    );
                    continue;
                }
            };

            let id = def.id;
            for name in std::iter::once(&def.name).chain(def.aliases.iter()) {
                if aliases.contains_key(name.as_str()) {
                    warn!(
                        "Command name {:?} is already taken, ignoring it for command {}",
                        name, id
                    );
                    continue;
                }
                aliases.insert(name.clone(), id);
            }
            commands.insert(id, Arc::new(Command { def, body }));
        }

        CommandStore { aliases, commands }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<Command>> {
        self.aliases
            .get(name)
            .and_then(|command_id| self.commands.get(command_id))
    }

    pub fn get_by_id(&self, id: i64) -> Option<&Arc<Command>> {
        self.commands.get(&id)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handlers::commands::test_support::StaticReplyBody;
    use persistence::commands::{CommandFlags, DurationMillis};

    fn definition(id: i64, name: &str, handler: &str, aliases: &[&str]) -> CommandDefinition {
        CommandDefinition {
            id,
            name: name.to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            description: None,
            handler_name: handler.to_string(),
            cooldown: DurationMillis::default(),
            flags: CommandFlags::default(),
            whitelist_response: None,
        }
    }

    fn registry() -> BodyRegistry {
        let mut registry = BodyRegistry::default();
        let body: Arc<dyn CommandBody> = Arc::new(StaticReplyBody::new("stub", "ok"));
        registry.insert("stub", body);
        registry
    }

    #[test]
    fn resolves_names_and_aliases() {
        let store = CommandStore::load(
            vec![definition(1, "ping", "stub", &["pong", "peng"])],
            &registry(),
        );
        assert_eq!(store.get_by_name("ping").unwrap().def.id, 1);
        assert_eq!(store.get_by_name("peng").unwrap().def.id, 1);
        assert!(store.get_by_name("other").is_none());
    }

    #[test]
    fn unknown_handler_is_skipped() {
        let store = CommandStore::load(
            vec![
                definition(1, "ping", "stub", &[]),
                definition(2, "broken", "missing", &[]),
            ],
            &registry(),
        );
        assert_eq!(store.len(), 1);
        assert!(store.get_by_name("broken").is_none());
    }

    #[test]
    fn duplicate_alias_keeps_first_owner() {
        let store = CommandStore::load(
            vec![
                definition(1, "ping", "stub", &[]),
                definition(2, "other", "stub", &["ping"]),
            ],
            &registry(),
        );
        assert_eq!(store.get_by_name("ping").unwrap().def.id, 1);
        assert_eq!(store.get_by_name("other").unwrap().def.id, 2);
    }
}
