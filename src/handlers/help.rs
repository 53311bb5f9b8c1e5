//! The `help` command.

use log::debug;

use crate::api::{Command, CommandEvent, CommandHandler};

/// Lists the registered commands, or shows the usage of one of them.
pub struct HelpCommandHandler {
    /// Command prefix, shown in front of every usage
    prefix: String,
    /// Every command known to the bot, sorted by name
    commands: Vec<Command>,
}

impl HelpCommandHandler {
    /// Creates a new [`HelpCommandHandler`].
    ///
    /// # Arguments
    ///
    /// * `prefix` - Command prefix (e.g. `!`)
    /// * `commands` - Commands of the other handlers, the `help` command is added
    pub fn new(prefix: &str, commands: Vec<Command>) -> Self {
        let mut commands = commands;
        commands.push(Self::command());
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands.dedup();

        HelpCommandHandler {
            prefix: prefix.to_owned(),
            commands,
        }
    }

    fn command() -> Command {
        Command::new(
            "help",
            "help [<command>] - list the commands or show the usage of one",
        )
    }

    fn summary(&self) -> String {
        let names: Vec<String> = self
            .commands
            .iter()
            .map(|command| format!("{}{}", self.prefix, command.name()))
            .collect();

        format!(
            "commands: {} - {}help <command> for details",
            names.join(" "),
            self.prefix
        )
    }

    fn usage(&self, name: &str) -> String {
        // Accept `!help !covid` as well as `!help covid`
        let name = name.strip_prefix(self.prefix.as_str()).unwrap_or(name);

        match self.commands.iter().find(|command| command.name() == name) {
            Some(command) => format!("usage: {}{}", self.prefix, command.usage()),
            None => format!("unknown command: {}", name),
        }
    }
}

impl CommandHandler for HelpCommandHandler {
    fn name(&self) -> &'static str {
        "help"
    }

    fn commands(&self) -> Vec<Command> {
        vec![Self::command()]
    }

    fn on_command(&self, event: &CommandEvent) -> anyhow::Result<bool> {
        debug!("help requested by {}", event.origin().actor);

        let response = match event.arg_line() {
            Some(name) => self.usage(name),
            None => self.summary(),
        };
        event.respond(response);

        Ok(true)
    }
}
