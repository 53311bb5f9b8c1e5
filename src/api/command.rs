//! Command identity.

use std::{
    fmt,
    hash::{Hash, Hasher},
};

/// A named directive users type after the command prefix.
///
/// Two commands are the same command when their names are equal; the usage
/// text is only carried along for help output.
///
/// # Examples
///
/// ```
/// # use throughbot::api::Command;
/// let covid = Command::new("covid", "covid [<country>] - get covid stats");
/// assert_eq!(covid.name(), "covid");
/// assert_eq!(covid, Command::new("covid", "other text"));
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    /// Case-sensitive name, without the prefix
    name: String,
    /// One-line usage text
    usage: String,
}

impl Command {
    /// Creates a new [`Command`].
    ///
    /// # Arguments
    ///
    /// * `name` - The command name as typed after the prefix (e.g. `covid`)
    /// * `usage` - Usage text shown by the help command
    pub fn new(name: impl Into<String>, usage: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            usage: usage.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Command {}

impl Hash for Command {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_equality_ignores_usage() {
        let a = Command::new("crypto", "first usage");
        let b = Command::new("crypto", "second usage");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_equality_is_case_sensitive() {
        assert_ne!(Command::new("covid", ""), Command::new("Covid", ""));
    }

    #[test]
    fn test_display_is_name() {
        let command = Command::new("help", "help [<command>]");
        assert_eq!(command.to_string(), "help");
        assert_eq!(command.usage(), "help [<command>]");
    }
}
