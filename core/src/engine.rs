//! Token scanning and operand binding.
//!
//! [`scan`] makes a single left-to-right pass over an argument vector,
//! assigning option values straight into the command's cells and collecting
//! everything else as residual tokens. It never backtracks.

use tracing::trace;

use crate::command::Command;
use crate::entry::OptionEntry;
use crate::error::{Error, Result};
use crate::operand::{Operand, Repeat};
use crate::value::ValueState;

/// Tokens left over after a command consumed what it recognised.
///
/// `args` are ordinary leftovers; `verbatim` are tokens that followed `--`.
/// Verbatim tokens never select a command and are exempt from the strict
/// leftover check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Residual {
    pub args: Vec<String>,
    pub verbatim: Vec<String>,
}

impl Residual {
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.verbatim.is_empty()
    }

    /// Concatenates leftovers, ordinary tokens first.
    pub fn into_vec(self) -> Vec<String> {
        let mut out = self.args;
        out.extend(self.verbatim);
        out
    }
}

enum Step {
    Consumed,
    Unknown(String),
}

/// Scans `args` against `cmd`'s option tables.
///
/// Option scanning halts at the first unknown option (non-strict) or at a
/// command name seen before any operand; the halting token and everything
/// after it become residual.
pub(crate) fn scan(cmd: &Command, args: &[String], strict: bool) -> Result<Residual> {
    let mut out = Residual::default();
    let mut i = 0;

    while i < args.len() {
        let start = i;
        let token = &args[i];
        i += 1;

        if token == "--" {
            trace!(command = %cmd.name(), rest = args.len() - i, "Option terminator");
            out.verbatim.extend_from_slice(&args[i..]);
            break;
        }

        let step = if let Some(body) = token.strip_prefix("--") {
            long_option(cmd, body, args, &mut i)?
        } else if token.len() > 1 && token.starts_with('-') {
            short_cluster(cmd, &token[1..], args, &mut i)?
        } else if out.args.is_empty() && cmd.has_subcommand(token) {
            trace!(command = %cmd.name(), subcommand = %token, "Subcommand halts option scanning");
            out.args.extend_from_slice(&args[start..]);
            break;
        } else {
            trace!(command = %cmd.name(), token = %token, "Operand");
            out.args.push(token.clone());
            continue;
        };

        if let Step::Unknown(name) = step {
            if strict {
                return Err(Error::UnknownArgument(name));
            }
            trace!(command = %cmd.name(), option = %name, "Unknown option halts option scanning");
            out.args.extend_from_slice(&args[start..]);
            break;
        }
    }

    Ok(out)
}

fn next_value(entry: &OptionEntry, args: &[String], i: &mut usize) -> Result<String> {
    let value = args
        .get(*i)
        .cloned()
        .ok_or_else(|| Error::MissingValue(entry.label()))?;
    *i += 1;
    Ok(value)
}

fn long_option(cmd: &Command, body: &str, args: &[String], i: &mut usize) -> Result<Step> {
    let (name, inline) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (body, None),
    };

    let Some(entry) = cmd.long_entry(name) else {
        return Ok(Step::Unknown(format!("--{name}")));
    };

    let value = match inline {
        Some("") => return Err(Error::MissingValue(entry.label())),
        Some(value) => value.to_string(),
        None if entry.takes_value() => next_value(entry, args, i)?,
        None => "true".to_string(),
    };

    trace!(option = %entry.label(), value = %value, "Long option");
    entry.assign(&value, ValueState::Cli)?;
    Ok(Step::Consumed)
}

fn short_cluster(cmd: &Command, cluster: &str, args: &[String], i: &mut usize) -> Result<Step> {
    // Nothing is assigned unless every switch up to the first value-taking
    // option is known.
    for (pos, ch) in cluster.char_indices() {
        let Some(entry) = cmd.short_entry(ch) else {
            return Ok(Step::Unknown(format!("-{ch}")));
        };
        if entry.takes_value() || cluster[pos + ch.len_utf8()..].starts_with('=') {
            break;
        }
    }

    for (pos, ch) in cluster.char_indices() {
        let Some(entry) = cmd.short_entry(ch) else {
            return Ok(Step::Unknown(format!("-{ch}")));
        };
        let rest = &cluster[pos + ch.len_utf8()..];

        // `-x=value` works for every kind, including booleans.
        if let Some(inline) = rest.strip_prefix('=') {
            if inline.is_empty() {
                return Err(Error::MissingValue(entry.label()));
            }
            entry.assign(inline, ValueState::Cli)?;
            return Ok(Step::Consumed);
        }

        if !entry.takes_value() {
            trace!(option = %entry.label(), "Short switch");
            entry.assign("true", ValueState::Cli)?;
            continue;
        }

        let value = if rest.is_empty() {
            next_value(entry, args, i)?
        } else {
            rest.to_string()
        };
        trace!(option = %entry.label(), value = %value, "Short option");
        entry.assign(&value, ValueState::Cli)?;
        return Ok(Step::Consumed);
    }
    Ok(Step::Consumed)
}

/// Binds residual tokens to operands left to right and returns what is left.
///
/// Ordinary tokens are offered before verbatim ones. A [`Repeat::Many`]
/// operand takes everything that remains.
pub(crate) fn bind_operands(operands: &mut [Operand], residual: Residual) -> Residual {
    let split = residual.args.len();
    let tokens = residual.into_vec();
    let mut pos = 0;

    for operand in operands.iter_mut() {
        match operand.repeat() {
            Repeat::Single | Repeat::Optional => {
                if let Some(token) = tokens.get(pos) {
                    operand.push(token.clone());
                    pos += 1;
                }
            }
            Repeat::Many => {
                operand.extend(&tokens[pos..]);
                pos = tokens.len();
            }
        }
    }

    Residual {
        args: tokens[pos.min(split)..split].to_vec(),
        verbatim: tokens[pos.max(split)..].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn residual(args: &[&str], verbatim: &[&str]) -> Residual {
        Residual {
            args: argv(args),
            verbatim: argv(verbatim),
        }
    }

    #[test]
    fn test_scan_interleaves_operands_and_options() {
        let mut cmd = Command::new("app", "");
        let verbose = cmd.bool("verbose", Some('v'), false, "").unwrap();

        let out = scan(&cmd, &argv(&["a", "-v", "b"]), false).unwrap();
        assert_eq!(out, residual(&["a", "b"], &[]));
        assert!(verbose.get());
    }

    #[test]
    fn test_scan_terminator_keeps_rest_verbatim() {
        let mut cmd = Command::new("app", "");
        let verbose = cmd.bool("verbose", Some('v'), false, "").unwrap();

        let out = scan(&cmd, &argv(&["x", "--", "-v", "--verbose"]), true).unwrap();
        assert_eq!(out, residual(&["x"], &["-v", "--verbose"]));
        assert_eq!(verbose.state(), ValueState::Unset);
    }

    #[test]
    fn test_scan_unknown_long_halts_when_lenient() {
        let mut cmd = Command::new("app", "");
        let n = cmd.int("n", None, 0, "").unwrap();

        let out = scan(&cmd, &argv(&["--other", "--n", "4"]), false).unwrap();
        assert_eq!(out, residual(&["--other", "--n", "4"], &[]));
        assert_eq!(n.state(), ValueState::Unset);
    }

    #[test]
    fn test_scan_short_forms() {
        let mut cmd = Command::new("app", "");
        let a = cmd.bool("", Some('a'), false, "").unwrap();
        let b = cmd.bool("", Some('b'), false, "").unwrap();
        let n = cmd.int("", Some('n'), 0, "").unwrap();

        scan(&cmd, &argv(&["-abn7"]), true).unwrap();
        assert!(a.get() && b.get());
        assert_eq!(n.get(), 7);

        scan(&cmd, &argv(&["-n", "-3"]), true).unwrap();
        assert_eq!(n.get(), -3);

        scan(&cmd, &argv(&["-n=12", "-a=false"]), true).unwrap();
        assert_eq!(n.get(), 12);
        assert!(!a.get());
    }

    #[test]
    fn test_scan_unknown_short_in_cluster() {
        let mut cmd = Command::new("app", "");
        let a = cmd.bool("", Some('a'), false, "").unwrap();

        let err = scan(&cmd, &argv(&["-az"]), true).unwrap_err();
        assert!(matches!(err, Error::UnknownArgument(ref s) if s == "-z"));
        assert_eq!(a.state(), ValueState::Unset);

        let out = scan(&cmd, &argv(&["-az", "tail"]), false).unwrap();
        assert_eq!(out, residual(&["-az", "tail"], &[]));
        assert_eq!(a.state(), ValueState::Unset);
    }

    #[test]
    fn test_scan_unknown_after_value_option_is_its_value() {
        let mut cmd = Command::new("app", "");
        let a = cmd.bool("", Some('a'), false, "").unwrap();
        let n = cmd.string("", Some('n'), "", "").unwrap();

        let out = scan(&cmd, &argv(&["-anz"]), true).unwrap();
        assert!(out.is_empty());
        assert!(a.get());
        assert_eq!(n.get(), "z");
    }

    #[test]
    fn test_scan_missing_values() {
        let mut cmd = Command::new("app", "");
        cmd.string("name", Some('n'), "", "").unwrap();

        for tokens in [&["--name"][..], &["--name="][..], &["-n"][..], &["-n="][..]] {
            let err = scan(&cmd, &argv(tokens), false).unwrap_err();
            assert!(
                matches!(err, Error::MissingValue(ref s) if s == "--name"),
                "{tokens:?}: {err:?}"
            );
        }
    }

    #[test]
    fn test_scan_lone_dash_is_operand() {
        let cmd = Command::new("app", "");
        let out = scan(&cmd, &argv(&["-"]), true).unwrap();
        assert_eq!(out, residual(&["-"], &[]));
    }

    #[test]
    fn test_bind_operands_greedy_tail() {
        let mut operands = vec![
            Operand::new("src", Repeat::Single),
            Operand::new("rest", Repeat::Many),
        ];
        let left = bind_operands(&mut operands, residual(&["a", "b"], &["c"]));
        assert!(left.is_empty());
        assert_eq!(operands[0].values(), ["a"]);
        assert_eq!(operands[1].values(), ["b", "c"]);
    }

    #[test]
    fn test_bind_operands_leaves_extra_tokens() {
        let mut operands = vec![Operand::new("only", Repeat::Optional)];
        let left = bind_operands(&mut operands, residual(&["a", "b"], &["c"]));
        assert_eq!(left, residual(&["b"], &["c"]));

        let mut operands = vec![Operand::new("first", Repeat::Single)];
        let left = bind_operands(&mut operands, residual(&[], &["v1", "v2"]));
        assert_eq!(operands[0].values(), ["v1"]);
        assert_eq!(left, residual(&[], &["v2"]));
    }
}
