//! Declarative parser manifests.
//!
//! An [`AppManifest`] describes a command tree in YAML or JSON and builds a
//! ready-to-run [`Parser`] from it.
//!
//! # Example YAML
//!
//! ```yaml
//! name: app
//! brief: some brief description
//! options:
//!   strict_parsing: true
//! env_files: [.env]
//! flags:
//!   - { kind: int, long: aint, short: i, default: "100", env: [AINT] }
//!   - { kind: choice, long: mode, choices: [fast, slow], default: fast }
//! commands:
//!   - name: add
//!     brief: Sums two numbers.
//!     operands:
//!       - { name: number1 }
//!       - { name: number2 }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{Options, Parser};
use crate::value::{Value, ValueCell, ValueKind};

/// One declared option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagDecl {
    pub kind: ValueKind,
    #[serde(default)]
    pub long: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    /// Default in string form, coerced to `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default)]
    pub help: String,
}

/// One declared operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandDecl {
    pub name: String,
    #[serde(default)]
    pub repeat: crate::Repeat,
}

/// A subcommand and its own declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDecl {
    pub name: String,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub long: String,
    #[serde(default)]
    pub flags: Vec<FlagDecl>,
    #[serde(default)]
    pub operands: Vec<OperandDecl>,
    #[serde(default)]
    pub commands: Vec<CommandDecl>,
}

/// Top-level manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppManifest {
    pub name: String,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub long: String,
    #[serde(default)]
    pub options: Options,
    /// Optional env files, later files overriding earlier ones.
    #[serde(default)]
    pub env_files: Vec<PathBuf>,
    #[serde(default)]
    pub flags: Vec<FlagDecl>,
    #[serde(default)]
    pub operands: Vec<OperandDecl>,
    #[serde(default)]
    pub commands: Vec<CommandDecl>,
}

impl AppManifest {
    /// Loads a manifest, choosing JSON for `.json` files and YAML otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Manifest(format!("cannot read {}: {e}", path.display())))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::Manifest(e.to_string()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Manifest(e.to_string()))
    }

    /// Builds a parser from this manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Manifest`] for defaults that do not match their
    /// kind, and [`Error::InvalidDeclaration`] for malformed options or
    /// operands.
    ///
    /// # Examples
    ///
    /// ```
    /// use optbind_core::AppManifest;
    ///
    /// let manifest = AppManifest::from_yaml_str(r#"
    /// name: app
    /// flags:
    ///   - { kind: int, long: aint, short: i, default: "100" }
    /// "#).unwrap();
    ///
    /// let mut app = manifest.build().unwrap();
    /// app.run_args(["--aint", "5"]).unwrap();
    /// assert_eq!(app.snapshot().options["--aint"].value.to_string(), "5");
    /// ```
    pub fn build(&self) -> Result<Parser> {
        let mut parser = Parser::new(&self.name, &self.brief);
        parser.configure(self.options);
        parser.use_files(&self.env_files);
        parser.long = self.long.clone();
        declare(&mut parser, &self.flags, &self.operands)?;
        for decl in &self.commands {
            declare_command(&mut parser, decl)?;
        }
        Ok(parser)
    }
}

fn declare_command(parent: &mut Command, decl: &CommandDecl) -> Result<()> {
    let cmd = parent.command(&decl.name, &decl.brief);
    cmd.long = decl.long.clone();
    declare(cmd, &decl.flags, &decl.operands)?;
    for sub in &decl.commands {
        declare_command(cmd, sub)?;
    }
    Ok(())
}

fn declare(cmd: &mut Command, flags: &[FlagDecl], operands: &[OperandDecl]) -> Result<()> {
    for flag in flags {
        let default = match &flag.default {
            None => Value::zero(flag.kind),
            Some(raw) => Value::coerce(flag.kind, raw).ok_or_else(|| {
                Error::Manifest(format!(
                    "command {}: default '{raw}' is not a valid {} for option {}",
                    cmd.name(),
                    flag.kind,
                    if flag.long.is_empty() {
                        flag.short.map(|s| format!("-{s}")).unwrap_or_default()
                    } else {
                        format!("--{}", flag.long)
                    }
                ))
            })?,
        };
        if !flag.choices.is_empty() && flag.kind != ValueKind::Choice {
            return Err(Error::Manifest(format!(
                "command {}: choices given for non-choice option --{}",
                cmd.name(),
                flag.long
            )));
        }

        let cell = ValueCell::new(default).with_choices(flag.choices.iter().cloned());
        let entry = cmd.register(&flag.long, flag.short, &flag.help, cell)?;
        entry.add_env(flag.env.iter().cloned());
    }

    for operand in operands {
        cmd.add_operand(&operand.name, &operand.repeat.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Repeat;

    const SAMPLE: &str = r#"
name: app
brief: some brief description
options:
  strict_parsing: true
flags:
  - { kind: string, long: astring, short: s, default: somevalue }
  - { kind: int, long: aint, short: i, default: "100", env: [AINT] }
  - { kind: choice, long: mode, choices: [fast, slow], default: fast }
commands:
  - name: add
    brief: Sums two numbers.
    operands:
      - { name: number1 }
      - { name: others, repeat: "*" }
    commands:
      - { name: deep, brief: A deep subcommand. }
"#;

    #[test]
    fn test_deserialize_sample() {
        let manifest = AppManifest::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(manifest.name, "app");
        assert!(manifest.options.strict_parsing);
        assert_eq!(manifest.flags.len(), 3);
        assert_eq!(manifest.flags[1].short, Some('i'));
        assert_eq!(manifest.commands[0].operands[1].repeat, Repeat::Many);
        assert_eq!(manifest.commands[0].commands[0].name, "deep");
    }

    #[test]
    fn test_build_sample() {
        let app = AppManifest::from_yaml_str(SAMPLE).unwrap().build().unwrap();
        assert!(app.options().strict_parsing);
        assert_eq!(app.entries().count(), 3);
        let add = app.subcommand("add").unwrap();
        assert_eq!(add.operands().len(), 2);
        assert!(add.subcommand("deep").is_some());
    }

    #[test]
    fn test_bad_default_rejected() {
        let manifest = AppManifest::from_yaml_str(
            "name: app\nflags:\n  - { kind: int, long: n, default: ten }\n",
        )
        .unwrap();
        let err = manifest.build().unwrap_err();
        assert!(matches!(err, Error::Manifest(ref m) if m.contains("--n")));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = AppManifest::from_yaml_str("name: app\nflags:\n  - { kind: list, long: n }\n")
            .unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn test_json_manifest() {
        let manifest = AppManifest::from_json_str(
            r#"{ "name": "app", "operands": [{ "name": "src", "repeat": "?" }] }"#,
        )
        .unwrap();
        let app = manifest.build().unwrap();
        assert_eq!(app.operands()[0].repeat(), Repeat::Optional);
    }
}
