//! Serializable view of a parsed command tree.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::value::{Value, ValueState};

/// Resolved value of one option.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSnapshot {
    pub value: Value,
    pub state: ValueState,
}

/// Tokens bound to one operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperandSnapshot {
    pub name: String,
    pub values: Vec<String>,
}

/// Resolved state of a command and its subcommands.
///
/// Options are keyed by their label (`--long`, `-s` or `$VAR`).
///
/// # Examples
///
/// ```
/// use optbind_core::{Parser, Value};
///
/// let mut app = Parser::new("app", "");
/// app.int("aint", Some('i'), 100, "").unwrap();
/// app.run_args(["-i", "5"]).unwrap();
///
/// let snap = app.snapshot();
/// assert_eq!(snap.options["--aint"].value, Value::Int(5));
/// assert!(snap.invoked);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandSnapshot {
    pub name: String,
    pub invoked: bool,
    pub options: BTreeMap<String, OptionSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operands: Vec<OperandSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandSnapshot>,
}

impl CommandSnapshot {
    /// Follows the chain of invoked subcommands and returns the deepest one.
    pub fn invoked_leaf(&self) -> &CommandSnapshot {
        self.commands
            .iter()
            .find(|c| c.invoked)
            .map_or(self, CommandSnapshot::invoked_leaf)
    }

    /// Returns the names of the invoked command path, root first.
    pub fn invoked_path(&self) -> Vec<&str> {
        let mut path = vec![self.name.as_str()];
        let mut current = self;
        while let Some(next) = current.commands.iter().find(|c| c.invoked) {
            path.push(next.name.as_str());
            current = next;
        }
        path
    }
}
