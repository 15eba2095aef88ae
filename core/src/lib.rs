//! Command-line and environment configuration parsing.
//!
//! This crate turns an argument vector plus environment variables into typed
//! option values, bound operands and a dispatched subcommand:
//!
//! - [`Parser`] — root of a command tree; loads the environment and runs the
//!   root command.
//! - [`Command`] — an independent option/operand/subcommand namespace. Every
//!   command runs the same scanning engine recursively.
//! - [`Arg`] — typed handle to a declared option, read after parsing.
//! - [`Bindable`] / [`Bound`] — declare options from a serde record and a
//!   table of field directives.
//! - [`AppManifest`] — build a parser from a YAML or JSON description.
//!
//! Values resolve in a fixed order: command line, then the first declared
//! environment variable found, then the default. [`ValueState`] records which
//! source won.
//!
//! # Example
//!
//! ```
//! use optbind_core::{MapEnv, Options, Parser, ValueState};
//!
//! let mut app = Parser::new("app", "some brief description")
//!     .with_env_source(MapEnv::from_iter([("APP_LEVEL", "3")]));
//! app.configure(Options { strict_parsing: true, ..Options::default() });
//!
//! let verbose = app.bool("verbose", Some('v'), false, "Talk more.").unwrap();
//! let level = app.int("level", Some('l'), 1, "Level.").unwrap().env(["APP_LEVEL"]);
//! let add = app.command("add", "Sums two numbers.");
//! add.add_operand("number1", "").unwrap();
//! add.add_operand("number2", "").unwrap();
//!
//! let residual = app.run_args(["-v", "add", "1", "2"]).unwrap();
//! assert!(residual.is_empty());
//! assert!(verbose.get());
//! assert_eq!(level.get(), 3);
//! assert_eq!(level.state(), ValueState::Env);
//! assert_eq!(app.subcommand("add").unwrap().operand_values("number1"), ["1"]);
//! ```

mod binder;
mod command;
mod engine;
mod entry;
mod error;
mod manifest;
mod operand;
mod parser;
mod snapshot;
mod value;

pub use binder::{Bindable, Bound};
pub use command::Command;
pub use engine::Residual;
pub use entry::{Arg, OptionEntry};
pub use error::{ActionError, Error, Result};
pub use manifest::{AppManifest, CommandDecl, FlagDecl, OperandDecl};
pub use operand::{Operand, Repeat};
pub use optbind_env::{EnvLoader, EnvSource, MapEnv};
pub use parser::{Options, Parser};
pub use snapshot::{CommandSnapshot, OperandSnapshot, OptionSnapshot};
pub use value::{FromValue, Value, ValueCell, ValueKind, ValueState};
