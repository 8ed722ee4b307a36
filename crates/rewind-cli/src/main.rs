#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use rewind_core::config;
use rewind_core::error::ErrorCode;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rwd: point-in-time reads over an append-only event log",
    long_about = None
)]
struct Cli {
    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Project root holding `.rewind/config.toml`. Defaults to the current directory.
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Show nodes as of a point in time",
        long_about = "Reconstruct every live node selected by an addressing path as of a time bound, \
                      optionally grouped, counted, sorted, and paged.",
        after_help = "EXAMPLES:\n    # Every order as of a moment\n    rwd show /c/orders --at 2019-01-15T14:00:00Z --log events.jsonl\n\n    # Count nodes per collection type\n    rwd show / --group-by type --counts-only --db rewind.sqlite3\n\n    # Second page of a graph, newest ids first\n    rwd show /g/shop --sort desc --skip 20 --limit 20 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        about = "Show nodes whose content matches a predicate",
        long_about = "Reconstruct the nodes selected by an addressing path as of a time bound, \
                      windowed by --pre-skip/--pre-limit, and keep those matching a predicate \
                      over document fields.",
        after_help = "EXAMPLES:\n    # Paid orders as of a moment\n    rwd filter /c/orders 'paid == true && total > 5' --at 2019-01-15T14:00:00Z\n\n    # Only test the newest 100 nodes\n    rwd filter / \"_id =~ '^orders/'\" --sort desc --pre-limit 100 --json"
    )]
    Filter(cmd::filter::FilterArgs),

    #[command(
        about = "Print the compiled query plan",
        long_about = "Resolve and compile a request without executing it.",
        after_help = "EXAMPLES:\n    # Which stages run for a grouped count\n    rwd plan / --group-by collection --counts-only --log events.jsonl --json"
    )]
    Plan(cmd::plan::PlanArgs),

    #[command(
        about = "Load an event log into a SQLite store",
        long_about = "Import a JSON Lines event log into a SQLite store database, creating it if needed.",
        after_help = "EXAMPLES:\n    # Build a store next to the log\n    rwd import events.jsonl --db rewind.sqlite3"
    )]
    Import(cmd::import::ImportArgs),

    #[command(
        about = "Resolve an addressing path",
        long_about = "Classify an addressing path and show what it selects against the store's catalog.",
        after_help = "EXAMPLES:\n    # Which collections a graph glob covers\n    rwd scopes '/g/sh*' --log events.jsonl"
    )]
    Scopes(cmd::scopes::ScopesArgs),
}

impl Cli {
    fn output_mode(&self, configured: Option<&str>) -> OutputMode {
        output::resolve_output_mode(self.format, self.json, configured)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("REWIND_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "rewind=debug,info"
        } else {
            "rewind=info,warn"
        })
    });

    let format = env::var("REWIND_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => env::current_dir()?,
    };

    let effective = match config::resolve_config(&root) {
        Ok(effective) => effective,
        Err(err) => {
            let mode = cli.output_mode(None);
            output::render_error(
                mode,
                &output::CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };
    let ctx = cmd::Context {
        output: cli.output_mode(effective.resolved_output.as_deref()),
        root,
        project: effective.project,
    };
    debug!(root = %ctx.root.display(), output = ?ctx.output, "starting");

    match &cli.command {
        Commands::Show(args) => cmd::show::run_show(args, &ctx),
        Commands::Filter(args) => cmd::filter::run_filter(args, &ctx),
        Commands::Plan(args) => cmd::plan::run_plan(args, &ctx),
        Commands::Import(args) => cmd::import::run_import(args, &ctx),
        Commands::Scopes(args) => cmd::scopes::run_scopes(args, &ctx),
    }
}
