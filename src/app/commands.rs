//! Command dispatch and outbound messages.

use std::collections::HashMap;

/// Name of the command that opens the find bar.
pub const EXECUTE_ACTION: &str = "_execute_action";

/// An inbound command, as delivered by the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub command: String,
    /// Set when driven by automation rather than a user.
    pub is_test: bool,
}

impl CommandEvent {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), is_test: false }
    }

    pub fn open() -> Self {
        Self::new(EXECUTE_ACTION)
    }
}

/// Requests sent back out to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    OpenOptionsPage,
}

pub type CommandHandler<A, E> = fn(&mut A, &CommandEvent) -> Result<(), E>;

/// Flat table from command name to handler.
pub struct CommandTable<A, E> {
    handlers: HashMap<&'static str, CommandHandler<A, E>>,
}

impl<A, E> Default for CommandTable<A, E> {
    fn default() -> Self {
        Self { handlers: HashMap::new() }
    }
}

impl<A, E> CommandTable<A, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: &'static str, handler: CommandHandler<A, E>) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<CommandHandler<A, E>> {
        self.handlers.get(name).copied()
    }

    /// Run the handler for `event`. Unknown commands are logged and ignored;
    /// returns whether a handler ran.
    pub fn dispatch(&self, target: &mut A, event: &CommandEvent) -> Result<bool, E> {
        match self.get(&event.command) {
            Some(handler) => handler(target, event).map(|()| true),
            None => {
                log::warn!("unknown command {:?}", event.command);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump(n: &mut u32, e: &CommandEvent) -> Result<(), String> {
        if e.is_test {
            return Err("test".into());
        }
        *n += 1;
        Ok(())
    }

    #[test]
    fn dispatches_by_name() {
        let table: CommandTable<u32, String> = CommandTable::new().register(EXECUTE_ACTION, bump);
        let mut n = 0;
        assert_eq!(table.dispatch(&mut n, &CommandEvent::open()), Ok(true));
        assert_eq!(table.dispatch(&mut n, &CommandEvent::new("other")), Ok(false));
        assert_eq!(n, 1);

        let test = CommandEvent { is_test: true, ..CommandEvent::open() };
        assert_eq!(table.dispatch(&mut n, &test), Err("test".to_string()));
    }
}
