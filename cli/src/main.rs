use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use optbind_core::{AppManifest, Command as ParserCommand, CommandSnapshot, Error};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Output format for `run` reports.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Yaml,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "optbind")]
#[command(about = "Validate and dry-run command-line parser manifests")]
#[command(version)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build parsers from one or more manifests and report declaration errors.
    Validate(ValidateArgs),
    /// Build a parser from a manifest, run it on the given arguments and
    /// print the resolved values.
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Manifest files (YAML, or JSON with a .json extension).
    #[arg(required = true)]
    manifests: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Manifest file (YAML, or JSON with a .json extension).
    manifest: PathBuf,
    /// Output format.
    #[arg(long, default_value = "yaml")]
    format: CliOutputFormat,
    /// Reject unknown options and leftover tokens.
    #[arg(long)]
    strict: bool,
    /// Ignore the process environment and read env files only.
    #[arg(long)]
    files_only: bool,
    /// Additional env file that must exist. May be repeated.
    #[arg(long = "env-file")]
    env_files: Vec<PathBuf>,
    /// Arguments handed to the manifest's parser, after `--`.
    #[arg(last = true)]
    args: Vec<String>,
}

/// Failure of a CLI operation, carrying its exit code.
#[derive(Debug)]
enum Failure {
    /// Manifest, env file or output problem.
    Setup(String),
    /// The dry-run target rejected its arguments.
    Parse(String),
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self {
            Failure::Setup(_) => 1,
            Failure::Parse(_) => 2,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Setup(msg) | Failure::Parse(msg) => f.write_str(msg),
        }
    }
}

/// What `run` prints.
#[derive(Debug, Serialize)]
struct RunReport {
    invoked: Vec<String>,
    residual: Vec<String>,
    snapshot: CommandSnapshot,
}

fn main() {
    let cli = Cli::parse();

    // stdout carries reports; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.parse().unwrap_or_default()),
        )
        .init();

    let result = match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Run(args) => run_dry_run(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

fn run_validate(args: ValidateArgs) -> Result<(), Failure> {
    let mut failed = 0usize;
    for path in &args.manifests {
        match load_parser(path) {
            Ok(parser) => println!(
                "ok    {}: {} option(s), {} command(s)",
                path.display(),
                count_options(&parser),
                count_commands(&parser)
            ),
            Err(err) => {
                failed += 1;
                eprintln!("fail  {}: {err}", path.display());
            }
        }
    }

    if failed > 0 {
        return Err(Failure::Setup(format!(
            "{failed} of {} manifest(s) failed validation",
            args.manifests.len()
        )));
    }
    Ok(())
}

fn run_dry_run(args: RunArgs) -> Result<(), Failure> {
    let mut manifest = AppManifest::load(&args.manifest).map_err(|e| setup(&args.manifest, e))?;
    manifest.options.strict_parsing |= args.strict;
    manifest.options.files_only |= args.files_only;

    let mut parser = manifest.build().map_err(|e| setup(&args.manifest, e))?;
    for file in &args.env_files {
        parser.use_file(file).map_err(|e| setup(file, e))?;
    }

    debug!(manifest = %args.manifest.display(), args = ?args.args, "Dry-running parser");
    let residual = match parser.run_args(args.args) {
        Ok(residual) => residual,
        Err(Error::Env(err)) => return Err(Failure::Setup(err.to_string())),
        Err(err) => return Err(Failure::Parse(err.to_string())),
    };

    let snapshot = parser.snapshot();
    let report = RunReport {
        invoked: snapshot
            .invoked_path()
            .into_iter()
            .map(str::to_string)
            .collect(),
        residual,
        snapshot,
    };
    print!("{}", render(&report, args.format)?);
    Ok(())
}

fn load_parser(path: &Path) -> optbind_core::Result<optbind_core::Parser> {
    AppManifest::load(path)?.build()
}

fn setup(path: &Path, err: impl fmt::Display) -> Failure {
    Failure::Setup(format!("{}: {err}", path.display()))
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn render(report: &RunReport, format: CliOutputFormat) -> Result<String, Failure> {
    match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(report)
            .map(|mut out| {
                out.push('\n');
                out
            })
            .map_err(|e| Failure::Setup(format!("JSON serialization failed: {e}"))),
        CliOutputFormat::Yaml => serde_yaml::to_string(report)
            .map_err(|e| Failure::Setup(format!("YAML serialization failed: {e}"))),
    }
}

fn count_options(cmd: &ParserCommand) -> usize {
    cmd.entries().count() + cmd.subcommands().map(count_options).sum::<usize>()
}

fn count_commands(cmd: &ParserCommand) -> usize {
    cmd.subcommands().map(|sub| 1 + count_commands(sub)).sum()
}
