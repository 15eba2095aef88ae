//! Positional operands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Repetition modifier of an operand.
///
/// Parsed from the same modifiers used in usage lines: `""` for a single
/// required value, `"?"` for an optional one, `"*"` for zero or more.
///
/// # Examples
///
/// ```
/// use optbind_core::Repeat;
///
/// assert_eq!("".parse::<Repeat>().unwrap(), Repeat::Single);
/// assert_eq!("*".parse::<Repeat>().unwrap(), Repeat::Many);
/// assert!("+".parse::<Repeat>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Repeat {
    #[default]
    #[serde(rename = "")]
    Single,
    #[serde(rename = "?")]
    Optional,
    #[serde(rename = "*")]
    Many,
}

impl FromStr for Repeat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Repeat::Single),
            "?" => Ok(Repeat::Optional),
            "*" => Ok(Repeat::Many),
            other => Err(Error::InvalidDeclaration(format!(
                "unknown operand modifier '{other}' (expected \"\", \"?\" or \"*\")"
            ))),
        }
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repeat::Single => Ok(()),
            Repeat::Optional => f.write_str("?"),
            Repeat::Many => f.write_str("*"),
        }
    }
}

/// A declared positional argument and the tokens bound to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    name: String,
    repeat: Repeat,
    values: Vec<String>,
}

impl Operand {
    pub(crate) fn new(name: &str, repeat: Repeat) -> Self {
        Self {
            name: name.to_string(),
            repeat,
            values: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Tokens bound during the last run. At most one unless
    /// [`Repeat::Many`].
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub(crate) fn push(&mut self, value: String) {
        self.values.push(value);
    }

    pub(crate) fn extend(&mut self, values: &[String]) {
        self.values.extend_from_slice(values);
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }
}
