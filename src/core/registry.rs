//! Command registry.
//!
//! Commands form a closed set known at startup. Each one is a name, help
//! text and a boxed handler function; the registry maps unique names to
//! commands and renders the usage listing.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::Path;

use anyhow::{bail, Result};

use crate::util::GlobalContext;

/// Handler behind a command: `(context, args, cwd) -> status`.
pub type Handler = Box<dyn Fn(&GlobalContext, &[String], &Path) -> Result<i32>>;

/// A named command.
pub struct Command {
    name: String,
    help_short: String,
    help_long: Option<String>,
    handler: Handler,
}

impl Command {
    /// Create a command.
    pub fn new(
        name: impl Into<String>,
        help_short: impl Into<String>,
        handler: impl Fn(&GlobalContext, &[String], &Path) -> Result<i32> + 'static,
    ) -> Self {
        Command {
            name: name.into(),
            help_short: help_short.into(),
            help_long: None,
            handler: Box::new(handler),
        }
    }

    /// Attach extended help text.
    pub fn with_long_help(mut self, help: impl Into<String>) -> Self {
        self.help_long = Some(help.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help_short(&self) -> &str {
        &self.help_short
    }

    /// Extended help, falling back to the short help.
    pub fn help_long(&self) -> &str {
        self.help_long.as_deref().unwrap_or(&self.help_short)
    }

    /// Run the command.
    pub fn execute(&self, ctx: &GlobalContext, args: &[String], cwd: &Path) -> Result<i32> {
        (self.handler)(ctx, args, cwd)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("help_short", &self.help_short)
            .finish_non_exhaustive()
    }
}

/// Name-keyed set of commands.
#[derive(Debug, Default)]
pub struct Registry {
    commands: BTreeMap<String, Command>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Register a command. Names must be unique.
    pub fn register(&mut self, command: Command) -> Result<()> {
        if self.commands.contains_key(command.name()) {
            bail!("command `{}` is already registered", command.name());
        }
        self.commands.insert(command.name.clone(), command);
        Ok(())
    }

    /// Look up a command by exact name.
    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// Command names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Usage text listing every command, sorted by name.
    pub fn usage(&self, program: &str) -> String {
        let mut s = format!("{} <command> [--help]\n\nCommands:\n", program);
        for command in self.commands.values() {
            let _ = writeln!(s, "  {}", command.name());
            if !command.help_short().is_empty() {
                let _ = writeln!(s, "    {}", command.help_short());
            }
        }
        s
    }
}
