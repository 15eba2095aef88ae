//! The root parser.

use std::ffi::OsString;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use optbind_env::{EnvLoader, EnvSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::Command;
use crate::error::{Error, Result};

/// Parser-wide behaviour, shared by every command in the tree.
///
/// # Examples
///
/// ```
/// use optbind_core::Options;
///
/// let opts: Options = serde_json::from_str(r#"{ "strict_parsing": true }"#).unwrap();
/// assert!(opts.strict_parsing);
/// assert!(!opts.files_only);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Reject unknown options and leftover tokens instead of returning them.
    pub strict_parsing: bool,
    /// Read environment values from registered files only, ignoring the
    /// process environment.
    pub files_only: bool,
}

/// Root of a command tree plus the environment it resolves against.
///
/// `Parser` dereferences to its root [`Command`], so options, operands,
/// subcommands and the root action ([`Command::set_action`]) are declared on
/// it directly.
///
/// # Examples
///
/// ```
/// use optbind_core::Parser;
///
/// let mut app = Parser::new("app", "some brief description");
/// let aint = app.int("aint", Some('i'), 0, "Sets a int value.").unwrap();
/// let astring = app.string("astring", Some('s'), "", "Sets a string value.").unwrap();
///
/// let residual = app.run_args(["-i", "5", "--astring=hi"]).unwrap();
/// assert_eq!(aint.get(), 5);
/// assert_eq!(astring.get(), "hi");
/// assert!(residual.is_empty());
/// ```
pub struct Parser {
    root: Command,
    options: Options,
    loader: EnvLoader,
    source: Option<Box<dyn EnvSource>>,
}

impl Parser {
    pub fn new(name: &str, brief: &str) -> Self {
        Self {
            root: Command::new(name, brief),
            options: Options::default(),
            loader: EnvLoader::new(),
            source: None,
        }
    }

    /// Replaces the default [`EnvLoader`] with another source.
    ///
    /// Files registered through [`use_file`](Self::use_file) are ignored once
    /// a custom source is installed.
    pub fn with_env_source(mut self, source: impl EnvSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn configure(&mut self, options: Options) {
        self.loader.use_env(!options.files_only);
        self.options = options;
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Registers an env file that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Env`](crate::Error::Env) if the file does not exist.
    pub fn use_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.loader.use_file(path)?;
        Ok(())
    }

    /// Registers optional env files; missing ones are skipped.
    pub fn use_files<I, P>(&mut self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.loader.use_files(paths);
    }

    /// Parses the process arguments, skipping the program name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonUnicodeArgument`] if an argument is not valid
    /// UTF-8, otherwise whatever [`run_args`](Self::run_args) returns.
    pub fn run(&mut self) -> Result<Vec<String>> {
        let args = unicode_args(std::env::args_os().skip(1))?;
        self.run_args(args)
    }

    /// Parses `args` and returns the tokens nothing consumed.
    ///
    /// The environment is loaded once, every cell in the tree is reset, and
    /// the root command runs. Residual tokens are returned in order, with
    /// tokens that followed `--` last.
    ///
    /// # Errors
    ///
    /// The first [`Error`](crate::Error) met; cells resolved before it keep
    /// their values.
    pub fn run_args<I, S>(&mut self, args: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        debug!(command = %self.root.name(), args = args.len(), "Parsing arguments");

        let env: &mut dyn EnvSource = match &mut self.source {
            Some(source) => source.as_mut(),
            None => &mut self.loader,
        };
        env.load_all()?;

        self.root.reset();
        let residual = self.root.do_run(&args, &self.options, env)?;
        Ok(residual.into_vec())
    }

    pub fn root(&self) -> &Command {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Command {
        &mut self.root
    }
}

fn unicode_args<I>(args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            arg.into_string()
                .map_err(|raw| Error::NonUnicodeArgument(raw.to_string_lossy().into_owned()))
        })
        .collect()
}

impl Deref for Parser {
    type Target = Command;

    fn deref(&self) -> &Command {
        &self.root
    }
}

impl DerefMut for Parser {
    fn deref_mut(&mut self) -> &mut Command {
        &mut self.root
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("custom_env", &self.source.is_some())
            .finish_non_exhaustive()
    }
}
