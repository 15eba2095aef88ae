//! Commands: option tables, operands and nested subcommands.
//!
//! Every [`Command`] owns an independent namespace. The root of the tree is
//! wrapped by [`Parser`](crate::Parser); subcommands are created with
//! [`Command::command`] or [`Command::command_with`] and run recursively when
//! their name is the first residual token of their parent.

use std::collections::{BTreeMap, HashMap, btree_map};
use std::fmt;
use std::rc::Rc;

use optbind_env::EnvSource;
use tracing::debug;

use crate::engine::{self, Residual};
use crate::entry::{Arg, OptionEntry};
use crate::error::{ActionError, Error, Result};
use crate::operand::{Operand, Repeat};
use crate::parser::Options;
use crate::snapshot::{CommandSnapshot, OperandSnapshot, OptionSnapshot};
use crate::value::{Value, ValueCell, ValueKind};

type Action = Box<dyn FnMut(&Command) -> std::result::Result<(), ActionError>>;

/// A node of the command tree.
///
/// # Examples
///
/// ```
/// use optbind_core::Parser;
///
/// let mut app = Parser::new("calc", "A tiny calculator");
/// let add = app.command("add", "Sums two numbers.");
/// add.add_operand("number1", "").unwrap();
/// add.add_operand("number2", "").unwrap();
///
/// let residual = app.run_args(["add", "1", "2"]).unwrap();
/// assert!(residual.is_empty());
///
/// let add = app.subcommand("add").unwrap();
/// assert!(add.was_invoked());
/// assert_eq!(add.operand("number1"), Some("1"));
/// assert_eq!(add.operand("number2"), Some("2"));
/// ```
pub struct Command {
    name: String,
    /// One-line description.
    pub brief: String,
    /// Extended description.
    pub long: String,
    entries: Vec<Rc<OptionEntry>>,
    long_opts: HashMap<String, Rc<OptionEntry>>,
    short_opts: HashMap<char, Rc<OptionEntry>>,
    operands: Vec<Operand>,
    commands: BTreeMap<String, Command>,
    action: Option<Action>,
    invoked: bool,
}

impl Command {
    pub fn new(name: &str, brief: &str) -> Self {
        Self {
            name: name.to_string(),
            brief: brief.to_string(),
            long: String::new(),
            entries: Vec::new(),
            long_opts: HashMap::new(),
            short_opts: HashMap::new(),
            operands: Vec::new(),
            commands: BTreeMap::new(),
            action: None,
            invoked: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------------
    // Option registration
    // -----------------------------------------------------------------------

    /// Declares a string option.
    ///
    /// `long` may be empty when `short` is given, and vice versa.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeclaration`] if both names are empty, a name
    /// is malformed, or a name is already taken in this command.
    pub fn string(
        &mut self,
        long: &str,
        short: Option<char>,
        default: &str,
        help: &str,
    ) -> Result<Arg<String>> {
        let cell = ValueCell::new(Value::String(default.to_string()));
        self.register(long, short, help, cell).map(Arg::new)
    }

    /// Declares an integer option.
    pub fn int(
        &mut self,
        long: &str,
        short: Option<char>,
        default: i64,
        help: &str,
    ) -> Result<Arg<i64>> {
        self.register(long, short, help, ValueCell::new(Value::Int(default)))
            .map(Arg::new)
    }

    /// Declares a floating-point option.
    pub fn float(
        &mut self,
        long: &str,
        short: Option<char>,
        default: f64,
        help: &str,
    ) -> Result<Arg<f64>> {
        self.register(long, short, help, ValueCell::new(Value::Float(default)))
            .map(Arg::new)
    }

    /// Declares a boolean switch.
    pub fn bool(
        &mut self,
        long: &str,
        short: Option<char>,
        default: bool,
        help: &str,
    ) -> Result<Arg<bool>> {
        self.register(long, short, help, ValueCell::new(Value::Bool(default)))
            .map(Arg::new)
    }

    /// Declares an option restricted to `choices`.
    ///
    /// The default is not checked against `choices`; only values coming from
    /// the command line or the environment are.
    ///
    /// # Examples
    ///
    /// ```
    /// use optbind_core::{Error, Parser};
    ///
    /// let mut app = Parser::new("app", "");
    /// app.choice(&["foo", "bar", "baz"], "choice", Some('c'), "", "One of %s.").unwrap();
    ///
    /// let err = app.run_args(["--choice", "qux"]).unwrap_err();
    /// assert!(matches!(err, Error::InvalidChoice { ref choices, .. } if choices.len() == 3));
    /// ```
    pub fn choice(
        &mut self,
        choices: &[&str],
        long: &str,
        short: Option<char>,
        default: &str,
        help: &str,
    ) -> Result<Arg<String>> {
        let cell =
            ValueCell::new(Value::Choice(default.to_string())).with_choices(choices.iter().copied());
        self.register(long, short, help, cell).map(Arg::new)
    }

    pub(crate) fn register(
        &mut self,
        long: &str,
        short: Option<char>,
        help: &str,
        cell: ValueCell,
    ) -> Result<Rc<OptionEntry>> {
        self.check_identity(long, short)?;
        if cell.kind() == ValueKind::Choice && cell.choices().is_empty() {
            return Err(Error::InvalidDeclaration(format!(
                "choice option {} declares no choices",
                display_identity(long, short)
            )));
        }

        let long = (!long.is_empty()).then(|| long.to_string());
        let entry = Rc::new(OptionEntry::new(long.clone(), short, help, cell));
        if let Some(long) = long {
            self.long_opts.insert(long, Rc::clone(&entry));
        }
        if let Some(short) = short {
            self.short_opts.insert(short, Rc::clone(&entry));
        }
        self.entries.push(Rc::clone(&entry));
        Ok(entry)
    }

    /// Registers an entry reachable only through its environment variables.
    pub(crate) fn register_env_only(&mut self, entry: OptionEntry) -> Rc<OptionEntry> {
        let entry = Rc::new(entry);
        self.entries.push(Rc::clone(&entry));
        entry
    }

    /// Validates a prospective option identity against this command.
    pub(crate) fn check_identity(&self, long: &str, short: Option<char>) -> Result<()> {
        if long.is_empty() && short.is_none() {
            return Err(Error::InvalidDeclaration(
                "option must define a long or short name".to_string(),
            ));
        }
        if long.starts_with('-') || long.contains(['=', ' ', '\t']) {
            return Err(Error::InvalidDeclaration(format!(
                "invalid long option name: {long}"
            )));
        }
        if let Some(short) = short {
            if short == '-' || short == '=' || short.is_whitespace() {
                return Err(Error::InvalidDeclaration(format!(
                    "invalid short option name: {short:?}"
                )));
            }
            if self.short_opts.contains_key(&short) {
                return Err(Error::InvalidDeclaration(format!(
                    "duplicate option -{short} in command {}",
                    self.name
                )));
            }
        }
        if !long.is_empty() && self.long_opts.contains_key(long) {
            return Err(Error::InvalidDeclaration(format!(
                "duplicate option --{long} in command {}",
                self.name
            )));
        }
        Ok(())
    }

    pub(crate) fn long_entry(&self, name: &str) -> Option<&OptionEntry> {
        self.long_opts.get(name).map(Rc::as_ref)
    }

    pub(crate) fn short_entry(&self, ch: char) -> Option<&OptionEntry> {
        self.short_opts.get(&ch).map(Rc::as_ref)
    }

    /// All declared entries in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = &OptionEntry> {
        self.entries.iter().map(Rc::as_ref)
    }

    // -----------------------------------------------------------------------
    // Operands
    // -----------------------------------------------------------------------

    /// Declares a positional operand with modifier `""`, `"?"` or `"*"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDeclaration`] for an unknown modifier, a
    /// duplicate name, or any operand declared after a `"*"` operand.
    pub fn add_operand(&mut self, name: &str, modifier: &str) -> Result<()> {
        let repeat: Repeat = modifier.parse()?;
        if name.trim().is_empty() {
            return Err(Error::InvalidDeclaration(
                "operand name cannot be empty".to_string(),
            ));
        }
        if self.operands.iter().any(|o| o.name() == name) {
            return Err(Error::InvalidDeclaration(format!(
                "duplicate operand {name} in command {}",
                self.name
            )));
        }
        if let Some(last) = self.operands.last() {
            if last.repeat() == Repeat::Many {
                return Err(Error::InvalidDeclaration(format!(
                    "operand {name} follows repeated operand {}; \"*\" must be last",
                    last.name()
                )));
            }
        }
        self.operands.push(Operand::new(name, repeat));
        Ok(())
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// Returns the first token bound to operand `name`.
    pub fn operand(&self, name: &str) -> Option<&str> {
        self.operand_values(name).first().map(String::as_str)
    }

    /// Returns every token bound to operand `name`.
    pub fn operand_values(&self, name: &str) -> &[String] {
        self.operands
            .iter()
            .find(|o| o.name() == name)
            .map(Operand::values)
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Subcommands
    // -----------------------------------------------------------------------

    /// Creates (or replaces) subcommand `name` and returns it for
    /// configuration.
    pub fn command(&mut self, name: &str, brief: &str) -> &mut Command {
        self.insert_command(Command::new(name, brief))
    }

    fn insert_command(&mut self, cmd: Command) -> &mut Command {
        match self.commands.entry(cmd.name.clone()) {
            btree_map::Entry::Occupied(mut slot) => {
                debug!(command = %self.name, subcommand = %cmd.name, "Replacing subcommand");
                slot.insert(cmd);
                slot.into_mut()
            }
            btree_map::Entry::Vacant(slot) => slot.insert(cmd),
        }
    }

    /// Creates subcommand `name` and configures it with `setup`.
    ///
    /// The command is registered only once `setup` succeeds; on failure any
    /// existing command with the same name is kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use optbind_core::Parser;
    ///
    /// let mut app = Parser::new("app", "");
    /// app.command_with("add", "Sums two numbers.", |cmd| {
    ///     cmd.long = "Runs a computation that returns the sum.".into();
    ///     cmd.command("deep", "A deep subcommand.");
    ///     cmd.add_operand("numbers", "*")
    /// })
    /// .unwrap();
    ///
    /// assert!(app.subcommand("add").unwrap().subcommand("deep").is_some());
    /// ```
    pub fn command_with<F>(&mut self, name: &str, brief: &str, setup: F) -> Result<&mut Command>
    where
        F: FnOnce(&mut Command) -> Result<()>,
    {
        let mut cmd = Command::new(name, brief);
        setup(&mut cmd)?;
        Ok(self.insert_command(cmd))
    }

    pub fn subcommand(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn subcommand_mut(&mut self, name: &str) -> Option<&mut Command> {
        self.commands.get_mut(name)
    }

    pub fn subcommands(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub(crate) fn has_subcommand(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Sets the action executed after this command parsed its arguments.
    pub fn set_action<F>(&mut self, action: F)
    where
        F: FnMut(&Command) -> std::result::Result<(), ActionError> + 'static,
    {
        self.action = Some(Box::new(action));
    }

    /// Returns `true` if this command ran during the last parse.
    pub fn was_invoked(&self) -> bool {
        self.invoked
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    /// Clears cells, operands and invocation flags in this whole subtree.
    pub(crate) fn reset(&mut self) {
        self.invoked = false;
        for entry in &self.entries {
            entry.reset();
        }
        for operand in &mut self.operands {
            operand.clear();
        }
        for cmd in self.commands.values_mut() {
            cmd.reset();
        }
    }

    /// Parses `args` in this command's scope and returns unconsumed tokens.
    ///
    /// Options are scanned first, then unset cells resolve from `env` and
    /// defaults. If the first residual token names a subcommand, that
    /// subcommand runs on the remaining tokens and its residual replaces
    /// ours. Operands then bind, strict mode rejects leftovers, and the run
    /// action executes.
    ///
    /// # Errors
    ///
    /// Any [`Error`] raised by this command or a dispatched subcommand.
    pub fn do_run(
        &mut self,
        args: &[String],
        options: &Options,
        env: &dyn EnvSource,
    ) -> Result<Residual> {
        self.invoked = true;
        let mut residual = engine::scan(self, args, options.strict_parsing)?;

        for entry in &self.entries {
            entry.resolve_env(env)?;
            entry.use_default();
        }

        let target = residual.args.first().cloned();
        if let Some(cmd) = target.and_then(|name| self.commands.get_mut(&name)) {
            debug!(command = %self.name, subcommand = %cmd.name, "Dispatching to subcommand");
            residual = cmd.do_run(&residual.args[1..], options, env)?;
        }

        let leftover = engine::bind_operands(&mut self.operands, residual);
        if options.strict_parsing {
            if let Some(token) = leftover.args.first() {
                return Err(Error::UnknownArgument(token.clone()));
            }
        }

        if let Some(mut action) = self.action.take() {
            let outcome = action(self);
            self.action = Some(action);
            outcome.map_err(|source| Error::Action {
                command: self.name.clone(),
                source,
            })?;
        }

        Ok(leftover)
    }

    /// Captures resolved values of this subtree.
    pub fn snapshot(&self) -> CommandSnapshot {
        CommandSnapshot {
            name: self.name.clone(),
            invoked: self.invoked,
            options: self
                .entries
                .iter()
                .map(|entry| {
                    let cell = entry.cell();
                    (
                        entry.label(),
                        OptionSnapshot {
                            value: cell.value().clone(),
                            state: cell.state(),
                        },
                    )
                })
                .collect(),
            operands: self
                .operands
                .iter()
                .map(|o| OperandSnapshot {
                    name: o.name().to_string(),
                    values: o.values().to_vec(),
                })
                .collect(),
            commands: self.commands.values().map(Command::snapshot).collect(),
        }
    }
}

fn display_identity(long: &str, short: Option<char>) -> String {
    if !long.is_empty() {
        return format!("--{long}");
    }
    short.map_or_else(|| "<unnamed>".to_string(), |s| format!("-{s}"))
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("brief", &self.brief)
            .field("options", &self.entries.len())
            .field("operands", &self.operands)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("invoked", &self.invoked)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use optbind_env::MapEnv;

    use super::*;
    use crate::value::ValueState;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn strict() -> Options {
        Options {
            strict_parsing: true,
            ..Options::default()
        }
    }

    #[test]
    fn test_both_names_empty_rejected() {
        let mut cmd = Command::new("app", "");
        let err = cmd.int("", None, 0, "").unwrap_err();
        assert!(matches!(err, Error::InvalidDeclaration(_)));
    }

    #[test]
    fn test_duplicate_names_rejected_per_command() {
        let mut cmd = Command::new("app", "");
        cmd.int("aint", Some('i'), 0, "").unwrap();
        assert!(cmd.string("aint", None, "", "").is_err());
        assert!(cmd.string("", Some('i'), "", "").is_err());

        // Same names in a subcommand are a separate namespace.
        let sub = cmd.command("sub", "");
        sub.int("aint", Some('i'), 0, "").unwrap();
    }

    #[test]
    fn test_malformed_names_rejected() {
        let mut cmd = Command::new("app", "");
        assert!(cmd.bool("--verbose", None, false, "").is_err());
        assert!(cmd.bool("a=b", None, false, "").is_err());
        assert!(cmd.bool("", Some('-'), false, "").is_err());
        assert!(cmd.choice(&[], "mode", None, "", "").is_err());
    }

    #[test]
    fn test_operand_ordering_rules() {
        let mut cmd = Command::new("app", "");
        cmd.add_operand("src", "?").unwrap();
        cmd.add_operand("dst", "*").unwrap();
        assert!(cmd.add_operand("more", "").is_err());
        assert!(cmd.add_operand("other", "+").is_err());
        assert!(cmd.add_operand("src", "").is_err());
    }

    #[test]
    fn test_failed_setup_discards_command() {
        let mut cmd = Command::new("app", "");
        let err = cmd
            .command_with("add", "", |add| add.add_operand("n", "+"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDeclaration(_)));
        assert!(cmd.subcommand("add").is_none());

        cmd.command("sub", "Subtract two numbers.")
            .add_operand("a", "")
            .unwrap();
        assert!(cmd.command_with("sub", "", |sub| sub.add_operand("b", "?")).is_ok());
        assert!(
            cmd.command_with("sub", "broken", |sub| {
                sub.add_operand("x", "*")?;
                sub.add_operand("y", "")
            })
            .is_err()
        );
        let sub = cmd.subcommand("sub").unwrap();
        assert_eq!(sub.brief, "");
        assert_eq!(sub.operands()[0].name(), "b");
    }

    #[test]
    fn test_do_run_strict_leftover() {
        let mut cmd = Command::new("app", "");
        cmd.add_operand("one", "").unwrap();

        let err = cmd
            .do_run(&argv(&["a", "b"]), &strict(), &MapEnv::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownArgument(ref t) if t == "b"));

        cmd.reset();
        let left = cmd
            .do_run(&argv(&["a", "--", "b"]), &strict(), &MapEnv::new())
            .unwrap();
        assert_eq!(left.verbatim, ["b"]);
    }

    #[test]
    fn test_subcommand_owns_its_arguments() {
        let mut cmd = Command::new("app", "");
        let outer = cmd.bool("", Some('v'), false, "").unwrap();
        let inner = cmd.command("sub", "").bool("", Some('v'), false, "").unwrap();

        let left = cmd
            .do_run(&argv(&["sub", "-v"]), &strict(), &MapEnv::new())
            .unwrap();
        assert!(left.is_empty());
        assert!(inner.get());
        assert!(!outer.get());
        assert_eq!(outer.state(), ValueState::Default);
    }

    #[test]
    fn test_operand_before_command_name_prevents_dispatch() {
        let mut cmd = Command::new("app", "");
        cmd.command("add", "");
        let left = cmd
            .do_run(&argv(&["x", "add"]), &Options::default(), &MapEnv::new())
            .unwrap();
        assert_eq!(left.args, ["x", "add"]);
        assert!(!cmd.subcommand("add").unwrap().was_invoked());
    }

    #[test]
    fn test_action_runs_after_binding() {
        use std::cell::RefCell;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut cmd = Command::new("app", "");
        cmd.add_operand("files", "*").unwrap();
        let sink = Rc::clone(&seen);
        cmd.set_action(move |cmd| {
            sink.borrow_mut().extend(cmd.operand_values("files").to_vec());
            Ok(())
        });

        cmd.do_run(&argv(&["a", "b"]), &Options::default(), &MapEnv::new())
            .unwrap();
        assert_eq!(*seen.borrow(), ["a", "b"]);
    }

    #[test]
    fn test_action_error_is_wrapped() {
        let mut cmd = Command::new("app", "");
        cmd.set_action(|_| Err("boom".into()));
        let err = cmd
            .do_run(&[], &Options::default(), &MapEnv::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "command `app` failed: boom");
    }
}
