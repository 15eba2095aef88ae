//! Declared options and the handles callers read them through.

use std::cell::{Ref, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use optbind_env::EnvSource;
use tracing::debug;

use crate::error::Result;
use crate::value::{FromValue, ValueCell, ValueState};

/// A single declared option: identity, help, environment names and cell.
///
/// Entries are shared between the owning command's lookup tables and any
/// [`Arg`] handles, so the cell lives behind a [`RefCell`].
#[derive(Debug)]
pub struct OptionEntry {
    long: Option<String>,
    short: Option<char>,
    help: String,
    env: RefCell<Vec<String>>,
    cell: RefCell<ValueCell>,
}

impl OptionEntry {
    pub(crate) fn new(
        long: Option<String>,
        short: Option<char>,
        help: &str,
        cell: ValueCell,
    ) -> Self {
        Self {
            long,
            short,
            help: help.to_string(),
            env: RefCell::new(Vec::new()),
            cell: RefCell::new(cell),
        }
    }

    pub fn long(&self) -> Option<&str> {
        self.long.as_deref()
    }

    pub fn short(&self) -> Option<char> {
        self.short
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Environment variable names, in lookup order.
    pub fn env_names(&self) -> Vec<String> {
        self.env.borrow().clone()
    }

    pub(crate) fn add_env<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env
            .borrow_mut()
            .extend(names.into_iter().map(Into::into));
    }

    /// Returns the name used in errors and snapshots: `--long`, `-s`, or
    /// `$VAR` for env-only entries.
    pub fn label(&self) -> String {
        if let Some(long) = &self.long {
            return format!("--{long}");
        }
        if let Some(short) = self.short {
            return format!("-{short}");
        }
        match self.env.borrow().first() {
            Some(name) => format!("${name}"),
            None => "<unnamed>".to_string(),
        }
    }

    pub fn takes_value(&self) -> bool {
        self.cell.borrow().kind().takes_value()
    }

    pub fn cell(&self) -> Ref<'_, ValueCell> {
        self.cell.borrow()
    }

    pub(crate) fn assign(&self, raw: &str, source: ValueState) -> Result<()> {
        let label = self.label();
        self.cell.borrow_mut().assign(&label, raw, source)
    }

    /// Fills an unset cell from the first declared variable present in `env`.
    pub(crate) fn resolve_env(&self, env: &dyn EnvSource) -> Result<()> {
        if self.cell.borrow().state() != ValueState::Unset {
            return Ok(());
        }
        let names = self.env.borrow();
        let Some((name, raw)) = names
            .iter()
            .find_map(|name| env.lookup(name).map(|raw| (name, raw)))
        else {
            return Ok(());
        };
        debug!(option = %self.label(), variable = %name, "Resolved option from environment");
        self.assign(raw, ValueState::Env)
    }

    pub(crate) fn use_default(&self) {
        self.cell.borrow_mut().use_default();
    }

    pub(crate) fn reset(&self) {
        self.cell.borrow_mut().reset();
    }
}

/// Typed handle to a declared option.
///
/// Returned by the typed declaration methods on
/// [`Command`](crate::Command). Read it after the parser ran.
///
/// # Examples
///
/// ```
/// use optbind_core::{Parser, ValueState};
///
/// let mut app = Parser::new("app", "");
/// let count = app.int("count", Some('c'), 1, "How many.").unwrap();
///
/// app.run_args(["-c", "3"]).unwrap();
/// assert_eq!(count.get(), 3);
/// assert_eq!(count.state(), ValueState::Cli);
/// ```
pub struct Arg<T> {
    entry: Rc<OptionEntry>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Arg<T> {
    pub(crate) fn new(entry: Rc<OptionEntry>) -> Self {
        Self {
            entry,
            _marker: PhantomData,
        }
    }

    /// Adds environment variables consulted when the option is absent from
    /// the command line. The first variable found wins.
    pub fn env<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entry.add_env(names);
        self
    }

    pub fn state(&self) -> ValueState {
        self.entry.cell().state()
    }

    /// Returns `true` if the value came from the command line or environment.
    pub fn is_set(&self) -> bool {
        matches!(self.state(), ValueState::Cli | ValueState::Env)
    }

    pub fn entry(&self) -> &OptionEntry {
        &self.entry
    }
}

impl<T: FromValue + Default> Arg<T> {
    /// Returns the current value (the default before parsing).
    pub fn get(&self) -> T {
        T::from_value(self.entry.cell().value()).unwrap_or_default()
    }
}

impl<T> Clone for Arg<T> {
    fn clone(&self) -> Self {
        Self::new(Rc::clone(&self.entry))
    }
}

impl<T> fmt::Debug for Arg<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arg")
            .field("option", &self.entry.label())
            .field("value", self.entry.cell().value())
            .field("state", &self.entry.cell().state())
            .finish()
    }
}
