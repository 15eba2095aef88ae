//! Typed option values and the cells that hold them.
//!
//! A [`ValueCell`] stores exactly one [`Value`] kind together with its
//! default and a [`ValueState`] recording where the current value came from.
//! The engine assigns CLI values first, then environment values for cells
//! that are still [`Unset`](ValueState::Unset), then defaults.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The type of value an option accepts.
///
/// # Examples
///
/// ```
/// use optbind_core::ValueKind;
///
/// assert_eq!(ValueKind::Int.to_string(), "int");
/// assert!(!ValueKind::Bool.takes_value());
/// assert!(ValueKind::Choice.takes_value());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Int,
    Float,
    Bool,
    /// A string restricted to a finite set.
    Choice,
}

impl ValueKind {
    /// Returns `true` if options of this kind consume a value token.
    ///
    /// Booleans are switches: `--verbose` sets them without a value, though
    /// `--verbose=false` is still accepted.
    pub fn takes_value(self) -> bool {
        self != ValueKind::Bool
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Choice => "choice",
        };
        f.write_str(name)
    }
}

/// A parsed option value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Choice(String),
}

impl Value {
    /// Returns the zero value for a kind (`""`, `0`, `0.0`, `false`).
    pub fn zero(kind: ValueKind) -> Self {
        match kind {
            ValueKind::String => Value::String(String::new()),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Choice => Value::Choice(String::new()),
        }
    }

    /// Converts a raw string into a value of the given kind.
    ///
    /// Returns `None` when the string is not a valid int, finite float or
    /// bool. Choice membership is not checked here.
    ///
    /// # Examples
    ///
    /// ```
    /// use optbind_core::{Value, ValueKind};
    ///
    /// assert_eq!(Value::coerce(ValueKind::Int, "-12"), Some(Value::Int(-12)));
    /// assert_eq!(Value::coerce(ValueKind::Bool, "yes"), Some(Value::Bool(true)));
    /// assert_eq!(Value::coerce(ValueKind::Float, "abc"), None);
    /// ```
    pub fn coerce(kind: ValueKind, raw: &str) -> Option<Self> {
        match kind {
            ValueKind::String => Some(Value::String(raw.to_string())),
            ValueKind::Choice => Some(Value::Choice(raw.to_string())),
            ValueKind::Int => raw.trim().parse().ok().map(Value::Int),
            ValueKind::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Value::Float),
            ValueKind::Bool => parse_bool(raw).map(Value::Bool),
        }
    }

    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Choice(_) => ValueKind::Choice,
        }
    }

    /// Converts to a JSON value. Non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) | Value::Choice(s) => serde_json::Value::from(s.as_str()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(x) => serde_json::Value::from(*x),
            Value::Bool(b) => serde_json::Value::from(*b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Choice(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Where a cell's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueState {
    /// Nothing assigned yet in this pass.
    #[default]
    Unset,
    /// Assigned from the argument vector.
    Cli,
    /// Assigned from an environment variable.
    Env,
    /// Resolved to the declared default.
    Default,
}

/// Typed storage for one option.
///
/// # Examples
///
/// ```
/// use optbind_core::{Value, ValueCell, ValueState};
///
/// let mut cell = ValueCell::new(Value::Int(10));
/// assert_eq!(cell.state(), ValueState::Unset);
///
/// cell.assign("--count", "3", ValueState::Cli).unwrap();
/// cell.use_default();
/// assert_eq!(cell.value(), &Value::Int(3));
/// assert_eq!(cell.state(), ValueState::Cli);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCell {
    default: Value,
    current: Option<Value>,
    state: ValueState,
    choices: Vec<String>,
}

impl ValueCell {
    /// Creates an unset cell whose kind is the kind of `default`.
    pub fn new(default: Value) -> Self {
        Self {
            default,
            current: None,
            state: ValueState::Unset,
            choices: Vec::new(),
        }
    }

    /// Restricts accepted values to `choices`.
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> ValueKind {
        self.default.kind()
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn state(&self) -> ValueState {
        self.state
    }

    /// Returns the current value, or the default while the cell is unset.
    pub fn value(&self) -> &Value {
        self.current.as_ref().unwrap_or(&self.default)
    }

    /// Parses `raw` and stores it, overwriting any previous value.
    ///
    /// `label` names the option in errors.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeCoercion`] if `raw` does not convert to the cell's kind.
    /// - [`Error::InvalidChoice`] if the cell has choices and `raw` is not
    ///   one of them.
    pub fn assign(&mut self, label: &str, raw: &str, source: ValueState) -> Result<()> {
        let kind = self.kind();
        let value = Value::coerce(kind, raw).ok_or_else(|| Error::TypeCoercion {
            option: label.to_string(),
            value: raw.to_string(),
            expected: kind,
        })?;

        if !self.choices.is_empty() && !self.choices.iter().any(|c| c == raw) {
            return Err(Error::InvalidChoice {
                option: label.to_string(),
                value: raw.to_string(),
                choices: self.choices.clone(),
            });
        }

        self.current = Some(value);
        self.state = source;
        Ok(())
    }

    /// Resolves an unset cell to its default. No-op in any other state.
    pub fn use_default(&mut self) {
        if self.state == ValueState::Unset {
            self.current = Some(self.default.clone());
            self.state = ValueState::Default;
        }
    }

    /// Returns the cell to [`ValueState::Unset`].
    pub fn reset(&mut self) {
        self.current = None;
        self.state = ValueState::Unset;
    }
}

/// Conversion from a [`Value`] to the Rust type an [`Arg`](crate::Arg)
/// hands out.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) | Value::Choice(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_default_only_when_unset() {
        let mut cell = ValueCell::new(Value::String("def".into()));
        cell.use_default();
        assert_eq!(cell.state(), ValueState::Default);
        assert_eq!(cell.value(), &Value::String("def".into()));

        let mut cli = ValueCell::new(Value::String("def".into()));
        cli.assign("--name", "given", ValueState::Cli).unwrap();
        cli.use_default();
        cli.use_default();
        assert_eq!(cli.state(), ValueState::Cli);
        assert_eq!(cli.value(), &Value::String("given".into()));
    }

    #[test]
    fn test_assign_overwrites_previous_state() {
        let mut cell = ValueCell::new(Value::Int(0));
        cell.assign("--n", "1", ValueState::Env).unwrap();
        cell.assign("--n", "2", ValueState::Cli).unwrap();
        assert_eq!(cell.value(), &Value::Int(2));
        assert_eq!(cell.state(), ValueState::Cli);
    }

    #[test]
    fn test_type_coercion_error() {
        let mut cell = ValueCell::new(Value::Int(0));
        let err = cell.assign("--n", "five", ValueState::Cli).unwrap_err();
        match err {
            Error::TypeCoercion {
                option,
                value,
                expected,
            } => {
                assert_eq!(option, "--n");
                assert_eq!(value, "five");
                assert_eq!(expected, ValueKind::Int);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(cell.state(), ValueState::Unset);
    }

    #[test]
    fn test_choice_rejects_unknown_value() {
        let mut cell = ValueCell::new(Value::Choice(String::new())).with_choices(["foo", "bar", "baz"]);
        let err = cell.assign("--mode", "qux", ValueState::Cli).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value 'qux' for option --mode: expected one of foo, bar, baz"
        );
        cell.assign("--mode", "bar", ValueState::Cli).unwrap();
        assert_eq!(cell.value(), &Value::Choice("bar".into()));
    }

    #[test]
    fn test_bool_spellings() {
        for raw in ["1", "t", "TRUE", "yes", "On"] {
            assert_eq!(Value::coerce(ValueKind::Bool, raw), Some(Value::Bool(true)), "{raw}");
        }
        for raw in ["0", "F", "false", "no", "off"] {
            assert_eq!(Value::coerce(ValueKind::Bool, raw), Some(Value::Bool(false)), "{raw}");
        }
        assert_eq!(Value::coerce(ValueKind::Bool, "maybe"), None);
    }

    #[test]
    fn test_float_must_be_finite() {
        assert_eq!(Value::coerce(ValueKind::Float, "1e3"), Some(Value::Float(1000.0)));
        for raw in ["inf", "-inf", "NaN", "infinity"] {
            assert_eq!(Value::coerce(ValueKind::Float, raw), None, "{raw}");
        }
    }

    #[test]
    fn test_reset_returns_to_unset() {
        let mut cell = ValueCell::new(Value::Float(1.5));
        cell.assign("-x", "2.5", ValueState::Cli).unwrap();
        cell.reset();
        assert_eq!(cell.state(), ValueState::Unset);
        assert_eq!(cell.value(), &Value::Float(1.5));
    }
}
