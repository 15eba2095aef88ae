//! Struct binding.
//!
//! A [`Bindable`] record declares its options through a static table of field
//! directives instead of one call per option. Field types and defaults are
//! discovered by serializing the record with [`serde`], and resolved values
//! are written back by deserializing it again.
//!
//! Directives use a tag-like syntax:
//!
//! ```text
//! flag:"port" short:"p" env:"APP_PORT,PORT" help:"Port to listen on." default:"8080"
//! ```
//!
//! | Key | Meaning |
//! |---|---|
//! | `flag` | long option name |
//! | `short` | short option name, exactly one character |
//! | `env` | comma-separated variable names, first found wins |
//! | `help` | help text |
//! | `default` | default value, overriding the record's current field value |
//! | `choices` | comma-separated allowed values (string fields only) |
//!
//! A field with only `env` becomes an environment-only binding, identified by
//! its first variable name; two such bindings on one command may not share it.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::command::Command;
use crate::entry::OptionEntry;
use crate::error::{Error, Result};
use crate::value::{Value, ValueCell, ValueKind, ValueState};

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_]+):"((?:[^"\\]|\\.)*)""#).expect("static regex must compile")
});

/// A record whose fields can be bound to options.
///
/// # Examples
///
/// ```
/// use optbind_core::{Bindable, Parser};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Config {
///     port: i64,
///     host: String,
///     verbose: bool,
/// }
///
/// impl Bindable for Config {
///     fn directives() -> &'static [(&'static str, &'static str)] {
///         &[
///             ("port", r#"flag:"port" short:"p" default:"8080""#),
///             ("host", r#"flag:"host" env:"APP_HOST""#),
///             ("verbose", r#"short:"v""#),
///         ]
///     }
/// }
///
/// let mut app = Parser::new("server", "");
/// let bound = app.bind(&Config::default()).unwrap();
/// app.run_args(["-v", "--host", "localhost"]).unwrap();
///
/// let config = bound.get().unwrap();
/// assert_eq!(config.port, 8080);
/// assert_eq!(config.host, "localhost");
/// assert!(config.verbose);
/// ```
pub trait Bindable: Serialize + DeserializeOwned {
    /// `(field, directive)` pairs. Fields without a directive are left alone.
    fn directives() -> &'static [(&'static str, &'static str)];
}

/// Parsed form of one directive string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Directive {
    flag: Option<String>,
    short: Option<char>,
    env: Vec<String>,
    help: String,
    default: Option<String>,
    choices: Vec<String>,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_directive(field: &str, raw: &str) -> Result<Directive> {
    let mut directive = Directive::default();
    let mut seen = HashSet::new();
    let mut last_end = 0;

    for caps in DIRECTIVE.captures_iter(raw) {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        if !raw[last_end..whole.start].trim().is_empty() {
            return Err(Error::InvalidBinding(format!(
                "field `{field}`: malformed directive near '{}'",
                raw[last_end..whole.start].trim()
            )));
        }
        last_end = whole.end;

        let key = &caps[1];
        let value = caps[2].replace("\\\"", "\"");
        if !seen.insert(key.to_string()) {
            return Err(Error::InvalidBinding(format!(
                "field `{field}`: directive key `{key}` given twice"
            )));
        }

        match key {
            "flag" => directive.flag = (!value.is_empty()).then_some(value),
            "short" => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => directive.short = Some(ch),
                    _ => {
                        return Err(Error::InvalidBinding(format!(
                            "field `{field}`: short name must be one character, got '{value}'"
                        )));
                    }
                }
            }
            "env" => directive.env = split_list(&value),
            "help" => directive.help = value,
            "default" => directive.default = Some(value),
            "choices" => directive.choices = split_list(&value),
            other => {
                return Err(Error::InvalidBinding(format!(
                    "field `{field}`: unknown directive key `{other}`"
                )));
            }
        }
    }

    if !raw[last_end..].trim().is_empty() {
        return Err(Error::InvalidBinding(format!(
            "field `{field}`: malformed directive near '{}'",
            raw[last_end..].trim()
        )));
    }
    Ok(directive)
}

fn field_value(field: &str, json: &serde_json::Value, directive: &Directive) -> Result<Value> {
    let unsupported = || {
        Error::InvalidBinding(format!(
            "field `{field}` has an unsupported type (expected string, integer, float or bool)"
        ))
    };

    let value = match json {
        serde_json::Value::String(s) if directive.choices.is_empty() => Value::String(s.clone()),
        serde_json::Value::String(s) => Value::Choice(s.clone()),
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) if n.is_f64() => {
            Value::Float(n.as_f64().ok_or_else(unsupported)?)
        }
        serde_json::Value::Number(n) => Value::Int(n.as_i64().ok_or_else(unsupported)?),
        _ => return Err(unsupported()),
    };

    if !directive.choices.is_empty() && value.kind() != ValueKind::Choice {
        return Err(Error::InvalidBinding(format!(
            "field `{field}`: choices are only supported on string fields"
        )));
    }

    match &directive.default {
        None => Ok(value),
        Some(raw) => Value::coerce(value.kind(), raw).ok_or_else(|| {
            Error::InvalidBinding(format!(
                "field `{field}`: default '{raw}' is not a valid {}",
                value.kind()
            ))
        }),
    }
}

struct Planned {
    field: &'static str,
    directive: Directive,
    default: Value,
}

/// Option entries bound to the fields of a `T`.
///
/// Obtained from [`Command::bind`]. Read the resolved record with
/// [`get`](Self::get) or copy it into an existing one with
/// [`apply`](Self::apply).
pub struct Bound<T> {
    base: serde_json::Map<String, serde_json::Value>,
    fields: Vec<(&'static str, Rc<OptionEntry>)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Bindable> Bound<T> {
    /// Rebuilds the record with every bound field replaced by its resolved
    /// value. Unbound fields keep the values they had at bind time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBinding`] if a resolved value does not fit
    /// the field (for example a negative number for an unsigned field).
    pub fn get(&self) -> Result<T> {
        let mut map = self.base.clone();
        for (field, entry) in &self.fields {
            map.insert((*field).to_string(), entry.cell().value().to_json());
        }
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| Error::InvalidBinding(format!("cannot rebuild bound record: {e}")))
    }

    /// Writes resolved values back into `target`.
    pub fn apply(&self, target: &mut T) -> Result<()> {
        *target = self.get()?;
        Ok(())
    }

    /// Returns where the value of `field` came from, if it is bound.
    pub fn state(&self, field: &str) -> Option<ValueState> {
        self.fields
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, entry)| entry.cell().state())
    }

    /// Bound field names in directive order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| *name)
    }
}

impl<T> std::fmt::Debug for Bound<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bound")
            .field("fields", &self.fields.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Command {
    /// Declares one option per directive of `T`, using `target`'s current
    /// field values as defaults.
    ///
    /// Nothing is registered unless every directive is valid.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBinding`] for unsupported field types, missing
    /// fields, malformed directives or duplicate option identities.
    pub fn bind<T: Bindable>(&mut self, target: &T) -> Result<Bound<T>> {
        let base = match serde_json::to_value(target) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => {
                return Err(Error::InvalidBinding(
                    "bound target must serialize to a record with named fields".to_string(),
                ));
            }
            Err(e) => {
                return Err(Error::InvalidBinding(format!(
                    "cannot inspect bound target: {e}"
                )));
            }
        };

        let mut plan = Vec::new();
        let mut seen_fields = HashSet::new();
        let mut seen_long = HashSet::new();
        let mut seen_short = HashSet::new();
        let mut seen_env = HashSet::new();

        for &(field, raw) in T::directives() {
            if !seen_fields.insert(field) {
                return Err(Error::InvalidBinding(format!(
                    "field `{field}` has more than one directive"
                )));
            }
            let json = base.get(field).ok_or_else(|| {
                Error::InvalidBinding(format!("directive names unknown field `{field}`"))
            })?;
            let directive = parse_directive(field, raw)?;
            let default = field_value(field, json, &directive)?;

            let long = directive.flag.as_deref().unwrap_or("");
            if directive.flag.is_none() && directive.short.is_none() {
                // Env-only entries are identified by their first variable.
                let Some(var) = directive.env.first() else {
                    return Err(Error::InvalidBinding(format!(
                        "field `{field}` needs a flag, short or env directive"
                    )));
                };
                let taken = self.entries().any(|e| {
                    e.long().is_none() && e.short().is_none() && e.env_names().first() == Some(var)
                });
                if taken || !seen_env.insert(var.clone()) {
                    return Err(Error::InvalidBinding(format!(
                        "field `{field}`: duplicate env-only option ${var}"
                    )));
                }
            } else {
                if !long.is_empty() && !seen_long.insert(long.to_string()) {
                    return Err(Error::InvalidBinding(format!("duplicate option --{long}")));
                }
                if let Some(short) = directive.short {
                    if !seen_short.insert(short) {
                        return Err(Error::InvalidBinding(format!("duplicate option -{short}")));
                    }
                }
                self.check_identity(long, directive.short)
                    .map_err(|e| Error::InvalidBinding(format!("field `{field}`: {e}")))?;
            }

            plan.push(Planned {
                field,
                directive,
                default,
            });
        }

        let mut fields = Vec::with_capacity(plan.len());
        for Planned {
            field,
            directive,
            default,
        } in plan
        {
            let cell = ValueCell::new(default).with_choices(directive.choices);
            let entry = if directive.flag.is_none() && directive.short.is_none() {
                self.register_env_only(OptionEntry::new(None, None, &directive.help, cell))
            } else {
                let long = directive.flag.unwrap_or_default();
                self.register(&long, directive.short, &directive.help, cell)
                    .map_err(|e| Error::InvalidBinding(format!("field `{field}`: {e}")))?
            };
            entry.add_env(directive.env);
            fields.push((field, entry));
        }

        Ok(Bound {
            base,
            fields,
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directive_full() {
        let d = parse_directive(
            "port",
            r#"flag:"port" short:"p" env:"APP_PORT, PORT" help:"Say \"hi\"." default:"8080""#,
        )
        .unwrap();
        assert_eq!(d.flag.as_deref(), Some("port"));
        assert_eq!(d.short, Some('p'));
        assert_eq!(d.env, ["APP_PORT", "PORT"]);
        assert_eq!(d.help, "Say \"hi\".");
        assert_eq!(d.default.as_deref(), Some("8080"));
    }

    #[test]
    fn test_parse_directive_rejects_garbage() {
        assert!(parse_directive("f", r#"flag:"a" oops"#).is_err());
        assert!(parse_directive("f", r#"flag:"a" flag:"b""#).is_err());
        assert!(parse_directive("f", r#"colour:"red""#).is_err());
        assert!(parse_directive("f", r#"short:"ab""#).is_err());
        assert!(parse_directive("f", r#"short:"""#).is_err());
    }

    #[test]
    fn test_field_value_kinds() {
        let d = Directive::default();
        assert_eq!(
            field_value("f", &serde_json::json!(3), &d).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            field_value("f", &serde_json::json!(0.5), &d).unwrap(),
            Value::Float(0.5)
        );
        assert!(field_value("f", &serde_json::json!([1]), &d).is_err());
        assert!(field_value("f", &serde_json::json!(null), &d).is_err());

        let choice = Directive {
            choices: vec!["a".into(), "b".into()],
            ..Directive::default()
        };
        assert_eq!(
            field_value("f", &serde_json::json!("a"), &choice).unwrap(),
            Value::Choice("a".into())
        );
        assert!(field_value("f", &serde_json::json!(1), &choice).is_err());
    }
}
