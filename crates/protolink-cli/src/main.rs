//! Protolink CLI
//!
//! Links bundles of parsed `.proto` files and prunes them:
//! - `protolink link`: resolve and validate, then summarize the schema
//! - `protolink prune`: link, keep what the roots need, then summarize
//!
//! Logging goes through `tracing`; set `PROTOLINK_LOG=debug` to follow the
//! linker phases.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use protolink_schema::{Linker, MemoryLoader, Schema};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod bundle;
mod report;

use bundle::{Bundle, Config, Output, RuleFlags};

#[derive(Parser)]
#[command(name = "protolink")]
#[command(author, version, about = "Protolink: link and prune protobuf schemas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link a bundle and report its files.
    Link {
        #[command(flatten)]
        input: InputArgs,
        /// Write the linked files as JSON elements
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Link a bundle and prune it down to what the roots need.
    Prune {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        rules: RuleArgs,
        /// Write the pruned files as JSON elements
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// JSON bundle: `{ "sources": [...], "dependencies": [...] }`
    bundle: PathBuf,
    /// JSON config: `{ "linker": {...}, "pruning": {...} }`
    #[arg(long)]
    config: Option<PathBuf>,
    /// Keep every dependency file whole instead of only what sources use
    #[arg(long)]
    load_exhaustively: bool,
    /// Allow import cycles between packages
    #[arg(long)]
    permit_package_cycles: bool,
    /// Link this message type as bytes (repeatable)
    #[arg(long = "opaque", value_name = "TYPE")]
    opaque_types: Vec<String>,
}

#[derive(Args)]
struct RuleArgs {
    /// Keep this type, member or wildcard (repeatable)
    #[arg(long = "root", value_name = "IDENTIFIER")]
    roots: Vec<String>,
    /// Drop this type, member or wildcard (repeatable)
    #[arg(long = "prune", value_name = "IDENTIFIER")]
    prunes: Vec<String>,
    /// Drop members that ended before this version
    #[arg(long)]
    since: Option<String>,
    /// Drop members that started at or after this version
    #[arg(long)]
    until: Option<String>,
    /// Keep only members live at exactly this version
    #[arg(long, conflicts_with_all = ["since", "until"])]
    only: Option<String>,
}

impl From<RuleArgs> for RuleFlags {
    fn from(args: RuleArgs) -> Self {
        RuleFlags {
            roots: args.roots,
            prunes: args.prunes,
            since: args.since,
            until: args.until,
            only: args.only,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_env("PROTOLINK_LOG"))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Link { input, out } => cmd_link(&input, out.as_deref()),
        Commands::Prune { input, rules, out } => cmd_prune(&input, rules, out.as_deref()),
    }
}

fn load(input: &InputArgs) -> Result<(Config, Bundle)> {
    let mut config = Config::load(input.config.as_deref())?;
    config.apply_linker_flags(input.load_exhaustively, input.permit_package_cycles, &input.opaque_types);
    let bundle = Bundle::read(&input.bundle)?;
    Ok((config, bundle))
}

fn link(config: &Config, bundle: Bundle) -> Result<Schema> {
    let loader = MemoryLoader::with_files(bundle.dependencies);
    match Linker::with_options(loader, config.linker.clone()).link(bundle.sources) {
        Ok(schema) => Ok(schema),
        Err(err) => {
            report::print_errors(&err);
            Err(anyhow!("linking failed with {} error(s)", err.len()))
        }
    }
}

fn write_output(schema: &Schema, out: Option<&Path>) -> Result<()> {
    let Some(out) = out else {
        return Ok(());
    };
    Output {
        files: schema.to_elements(),
    }
    .write(out)?;
    eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    Ok(())
}

fn cmd_link(input: &InputArgs, out: Option<&Path>) -> Result<()> {
    let (config, bundle) = load(input)?;
    let schema = link(&config, bundle)?;
    report::print_summary("Linked", &schema);
    write_output(&schema, out)
}

fn cmd_prune(input: &InputArgs, rules: RuleArgs, out: Option<&Path>) -> Result<()> {
    let (mut config, bundle) = load(input)?;
    config.apply_rule_flags(rules.into());
    let mut rules = config.pruning_rules()?;

    let schema = link(&config, bundle)?;
    let pruned = schema.prune(&mut rules);
    info!(
        before = schema.types().len(),
        after = pruned.types().len(),
        "pruned schema"
    );

    report::print_summary("Pruned", &pruned);
    report::print_unused_rules(&rules);
    write_output(&pruned, out)
}
