//! Command registry: maps command names to their implementations.
//!
//! Commands are grouped in [`Namespace`]s, each a startup-time table of
//! command modules and their factories. Already-built command instances can
//! be registered directly as well; they shadow namespace entries of the same
//! name.
//!
//! ## Registry Invariant
//! The name-to-source mapping is computed once, on first use, and reused for
//! the registry's lifetime, so a name resolves to exactly one implementation
//! per run. The registry is constructed at the entrypoint and passed by
//! reference; [`CommandRegistry::reset`] exists for test isolation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::errors::{SeahorseError, SeahorseResult};
use crate::hooks::Hooks;
use crate::management::base::{BaseCommand, Command};
use crate::management::commands;

/// Builds a fresh command implementation.
pub type CommandFactory = fn() -> Box<dyn Command>;

/// One entry of a namespace's command table.
#[derive(Clone, Copy)]
enum ModuleKind {
    Command(CommandFactory),
    /// A nested package; never offered as a command.
    Package,
}

#[derive(Clone)]
struct CommandModule {
    name: String,
    kind: ModuleKind,
}

/// The commands provided by one owner package.
#[derive(Clone)]
pub struct Namespace {
    name: String,
    modules: Vec<CommandModule>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Vec::new(),
        }
    }

    /// Adds a command module. Names starting with `_` are private and are
    /// skipped by discovery.
    pub fn command(mut self, name: impl Into<String>, factory: CommandFactory) -> Self {
        self.modules.push(CommandModule {
            name: name.into(),
            kind: ModuleKind::Command(factory),
        });
        self
    }

    /// Adds a sub-package entry, which discovery skips.
    pub fn package(mut self, name: impl Into<String>) -> Self {
        self.modules.push(CommandModule {
            name: name.into(),
            kind: ModuleKind::Package,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last dotted segment of the namespace name, used in help listings.
    pub fn label(&self) -> &str {
        namespace_label(&self.name)
    }

    fn discover(&self) -> BTreeSet<String> {
        self.modules
            .iter()
            .filter(|module| matches!(module.kind, ModuleKind::Command(_)))
            .filter(|module| !module.name.starts_with('_'))
            .map(|module| module.name.clone())
            .collect()
    }

    fn factory(&self, name: &str) -> Option<CommandFactory> {
        self.modules.iter().find_map(|module| match module.kind {
            ModuleKind::Command(factory) if module.name == name => Some(factory),
            _ => None,
        })
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("commands", &self.discover())
            .finish()
    }
}

pub fn namespace_label(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Where a command name resolves to.
#[derive(Clone)]
pub enum CommandSource {
    /// Built on demand from the named namespace.
    Namespace(String),
    /// A live instance, handed out as is.
    Instance(Arc<dyn Command>),
}

impl fmt::Debug for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSource::Namespace(name) => f.debug_tuple("Namespace").field(name).finish(),
            CommandSource::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// Registry of management commands.
pub struct CommandRegistry {
    namespaces: Vec<Namespace>,
    instances: Vec<(String, Arc<dyn Command>)>,
    hooks: Hooks,
    commands: OnceCell<BTreeMap<String, CommandSource>>,
}

impl CommandRegistry {
    /// An empty registry with default hooks.
    pub fn new() -> Self {
        Self {
            namespaces: Vec::new(),
            instances: Vec::new(),
            hooks: Hooks::default(),
            commands: OnceCell::new(),
        }
    }

    /// A registry holding the built-in provisioning commands.
    pub fn with_core() -> Self {
        Self::new().with_namespace(commands::core_namespace())
    }

    /// Adds a namespace. Later namespaces win on name clashes.
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.push(namespace);
        self.commands = OnceCell::new();
        self
    }

    /// Registers a live instance under `name`.
    pub fn with_instance(mut self, name: impl Into<String>, command: Arc<dyn Command>) -> Self {
        self.instances.push((name.into(), command));
        self.commands = OnceCell::new();
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Public command names offered by `namespace`.
    pub fn discover(&self, namespace: &str) -> BTreeSet<String> {
        self.namespaces
            .iter()
            .filter(|ns| ns.name == namespace)
            .flat_map(Namespace::discover)
            .collect()
    }

    /// The name-to-source mapping, computed on first call and cached.
    pub fn get_commands(&self) -> &BTreeMap<String, CommandSource> {
        self.commands.get_or_init(|| {
            let mut commands = BTreeMap::new();
            for namespace in &self.namespaces {
                for name in namespace.discover() {
                    commands.insert(name, CommandSource::Namespace(namespace.name.clone()));
                }
            }
            for (name, command) in &self.instances {
                commands.insert(name.clone(), CommandSource::Instance(Arc::clone(command)));
            }
            tracing::debug!(count = commands.len(), "command registry populated");
            commands
        })
    }

    /// Drops the cached mapping so the next lookup recomputes it.
    pub fn reset(&mut self) {
        self.commands.take();
    }

    /// Builds command `name` from `namespace`.
    pub fn load(&self, namespace: &str, name: &str) -> SeahorseResult<BaseCommand> {
        let factory = self
            .namespaces
            .iter()
            .rev()
            .filter(|ns| ns.name == namespace)
            .find_map(|ns| ns.factory(name))
            .ok_or_else(|| SeahorseError::unknown_command(name))?;
        Ok(self.bind(name, Arc::from(factory())))
    }

    /// Resolves `name` to a ready-to-run command.
    pub fn fetch(&self, name: &str) -> SeahorseResult<BaseCommand> {
        match self.get_commands().get(name) {
            Some(CommandSource::Instance(command)) => Ok(self.bind(name, Arc::clone(command))),
            Some(CommandSource::Namespace(namespace)) => self.load(namespace, name),
            None => Err(SeahorseError::unknown_command(name)),
        }
    }

    /// Wraps an instance with this registry's hooks.
    pub fn bind(&self, name: &str, command: Arc<dyn Command>) -> BaseCommand {
        BaseCommand::new(name, command, self.hooks.clone())
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_core()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("namespaces", &self.namespaces)
            .field("instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SeahorseResult;
    use crate::management::base::Streams;
    use crate::management::value::Options;

    struct Noop;

    impl Command for Noop {
        fn handle(&self, _: &mut Streams, _: &[String], _: &Options) -> SeahorseResult<Option<String>> {
            Ok(None)
        }
    }

    fn noop() -> Box<dyn Command> {
        Box::new(Noop)
    }

    fn namespace() -> Namespace {
        Namespace::new("acme.ops")
            .command("deploy", noop)
            .command("_private", noop)
            .package("nested")
    }

    #[test]
    fn discovery_skips_private_names_and_packages() {
        let registry = CommandRegistry::new().with_namespace(namespace());
        let names: Vec<String> = registry.discover("acme.ops").into_iter().collect();
        assert_eq!(names, vec!["deploy".to_string()]);
        assert!(registry.discover("missing").is_empty());
    }

    #[test]
    fn get_commands_is_cached_by_identity() {
        let registry = CommandRegistry::new().with_namespace(namespace());
        let first = registry.get_commands() as *const _;
        let second = registry.get_commands() as *const _;
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn reset_recomputes_the_mapping() {
        let mut registry = CommandRegistry::new().with_namespace(namespace());
        assert_eq!(registry.get_commands().len(), 1);
        registry.reset();
        assert_eq!(registry.get_commands().len(), 1);
    }

    #[test]
    fn instances_are_handed_out_as_is() {
        let instance: Arc<dyn Command> = Arc::new(Noop);
        let registry = CommandRegistry::new()
            .with_namespace(namespace())
            .with_instance("deploy", Arc::clone(&instance));
        let fetched = registry.fetch("deploy").unwrap();
        assert!(Arc::ptr_eq(fetched.command(), &instance));
    }

    #[test]
    fn unknown_names_fail_lookup() {
        let registry = CommandRegistry::new().with_namespace(namespace());
        assert!(matches!(
            registry.fetch("_private"),
            Err(SeahorseError::UnknownCommand { .. })
        ));
        assert!(registry.load("acme.ops", "nested").is_err());
    }

    #[test]
    fn labels_use_the_last_segment() {
        assert_eq!(namespace().label(), "ops");
        assert_eq!(namespace_label("core"), "core");
    }
}
