//! Startup-time plugin registry.
//!
//! The [`HandlerRegistry`] is built once from an explicit [`Plugins`] list and
//! is read-only afterwards. It holds two tables:
//!
//! - command name → owning [`CommandHandler`], checked for collisions
//! - an ordered list of [`UrlRoute`]s, where registration order is priority
//!
//! Lookups take `&self` only, so one registry behind an `Arc` can be shared by
//! any number of threads.

use std::{collections::HashMap, sync::Arc};

use log::debug;
use regex::Regex;

use crate::{
    api::{Command, CommandHandler, UrlProcessor},
    routing::RegistryError,
};

/// The explicit list of plugins to register, in priority order.
///
/// # Examples
///
/// ```no_run
/// # use throughbot::routing::{HandlerRegistry, Plugins};
/// let plugins = Plugins::default()
///     .command_handler(CovidCommandHandler::new(client.clone(), &config.covid))
///     .url_processor(TitleUrlProcessor::new(client, &config.title));
/// let registry = HandlerRegistry::new(plugins)?;
/// ```
#[derive(Default)]
pub struct Plugins {
    pub command_handlers: Vec<Arc<dyn CommandHandler>>,
    pub url_processors: Vec<Arc<dyn UrlProcessor>>,
}

impl Plugins {
    pub fn command_handler(mut self, handler: impl CommandHandler + 'static) -> Self {
        self.command_handlers.push(Arc::new(handler));
        self
    }

    pub fn url_processor(mut self, processor: impl UrlProcessor + 'static) -> Self {
        self.url_processors.push(Arc::new(processor));
        self
    }
}

/// A URL pattern together with the processor owning it.
pub struct UrlRoute {
    /// Pattern anchored to the whole line
    pattern: Regex,
    processor: Arc<dyn UrlProcessor>,
}

impl UrlRoute {
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn processor(&self) -> &Arc<dyn UrlProcessor> {
        &self.processor
    }
}

/// Owner of a registered command.
struct CommandEntry {
    command: Command,
    handler: Arc<dyn CommandHandler>,
}

/// Lookup tables of all registered plugins.
pub struct HandlerRegistry {
    commands: HashMap<String, CommandEntry>,
    url_routes: Vec<UrlRoute>,
}

impl HandlerRegistry {
    /// Builds the registry from `plugins`.
    ///
    /// Command handlers are registered first, then URL processors, each group
    /// in list order.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if:
    /// - Two handlers report the same command name - [`RegistryError::DuplicateCommand`]
    /// - A command name is empty or contains whitespace - [`RegistryError::InvalidCommandName`]
    /// - A URL pattern does not compile - [`RegistryError::InvalidPattern`]
    /// - A URL pattern has no capture group - [`RegistryError::MissingCaptureGroup`]
    pub fn new(plugins: Plugins) -> Result<Self, RegistryError> {
        let mut registry = HandlerRegistry {
            commands: HashMap::new(),
            url_routes: Vec::new(),
        };

        for handler in plugins.command_handlers {
            registry.register_command_handler(handler)?;
        }
        for processor in plugins.url_processors {
            registry.register_url_processor(processor)?;
        }

        Ok(registry)
    }

    fn register_command_handler(
        &mut self,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), RegistryError> {
        for command in handler.commands() {
            let name = command.name();
            if name.is_empty() || name.chars().any(char::is_whitespace) {
                return Err(RegistryError::InvalidCommandName {
                    handler: handler.name(),
                    name: name.to_owned(),
                });
            }

            if let Some(existing) = self.commands.get(name) {
                return Err(RegistryError::DuplicateCommand {
                    name: name.to_owned(),
                    first: existing.handler.name(),
                    second: handler.name(),
                });
            }

            debug!("register command {} of {}", name, handler.name());
            self.commands.insert(
                name.to_owned(),
                CommandEntry {
                    command: command.clone(),
                    handler: Arc::clone(&handler),
                },
            );
        }

        Ok(())
    }

    fn register_url_processor(
        &mut self,
        processor: Arc<dyn UrlProcessor>,
    ) -> Result<(), RegistryError> {
        for pattern in processor.url_patterns() {
            // Anchor to the whole line so trailing prose never matches
            let anchored = format!("^(?:{})$", pattern);
            let regex = Regex::new(&anchored).map_err(|cause| RegistryError::InvalidPattern {
                processor: processor.name(),
                pattern: pattern.clone(),
                cause,
            })?;

            // Group 0 is the whole match
            if regex.captures_len() < 2 {
                return Err(RegistryError::MissingCaptureGroup {
                    processor: processor.name(),
                    pattern,
                });
            }

            debug!("register url pattern {} of {}", pattern, processor.name());
            self.url_routes.push(UrlRoute {
                pattern: regex,
                processor: Arc::clone(&processor),
            });
        }

        Ok(())
    }

    /// Returns the owner of the command `name` and the registered command.
    pub fn resolve_command(&self, name: &str) -> Option<(&Command, &Arc<dyn CommandHandler>)> {
        self.commands
            .get(name)
            .map(|entry| (&entry.command, &entry.handler))
    }

    /// Returns the first route whose pattern matches the whole `text`, with the
    /// pattern's participating capture groups in order.
    pub fn resolve_url(&self, text: &str) -> Option<(&UrlRoute, Vec<String>)> {
        self.url_routes.iter().find_map(|route| {
            route.pattern.captures(text).map(|captures| {
                let groups = captures
                    .iter()
                    .skip(1)
                    .flatten()
                    .map(|group| group.as_str().to_owned())
                    .collect();
                (route, groups)
            })
        })
    }

    /// All registered commands, sorted by name.
    pub fn commands(&self) -> Vec<&Command> {
        let mut commands: Vec<&Command> =
            self.commands.values().map(|entry| &entry.command).collect();
        commands.sort_by(|a, b| a.name().cmp(b.name()));
        commands
    }

    pub fn url_routes(&self) -> &[UrlRoute] {
        &self.url_routes
    }
}
