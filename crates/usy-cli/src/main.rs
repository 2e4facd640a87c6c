use std::fs;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use usy_reconcile::{merge, parse_text, LineGrammar, TaggedSource};
use usy_schemas::RankTable;

#[derive(Parser)]
#[command(name = "usy")]
#[command(about = "Club usy ledger tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse one feed file and print its directives as JSON
    Parse {
        #[arg(long, value_enum, default_value_t = GrammarArg::Balance)]
        grammar: GrammarArg,

        /// Feed file (`username: payload` per line)
        file: String,
    },

    /// Merge a balance feed (and optional trophy feed) into a player list
    Merge {
        #[arg(long)]
        balance: String,

        #[arg(long)]
        trophy: Option<String>,
    },

    /// Classify a balance into its rank
    Rank {
        #[arg(allow_hyphen_values = true)]
        balance: i64,

        /// Layered config paths; a `ranks` section replaces the club table
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run one reconciliation pass and write the local cache
    Reconcile {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GrammarArg {
    Balance,
    Trophy,
}

impl From<GrammarArg> for LineGrammar {
    fn from(g: GrammarArg) -> Self {
        match g {
            GrammarArg::Balance => LineGrammar::Balance,
            GrammarArg::Trophy => LineGrammar::Trophy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Parse { grammar, file } => {
            let text = read_feed(&file)?;
            let set = parse_text(&text, grammar.into());
            println!("{}", serde_json::to_string_pretty(&set)?);
            eprintln!("entries={} skipped={}", set.len(), set.skipped);
        }

        Commands::Merge { balance, trophy } => {
            let mut sources = vec![TaggedSource::balance(parse_text(
                &read_feed(&balance)?,
                LineGrammar::Balance,
            ))];
            if let Some(path) = trophy {
                sources.push(TaggedSource::trophy(parse_text(
                    &read_feed(&path)?,
                    LineGrammar::Trophy,
                )));
            }
            let report = merge(&sources);
            println!("{}", report.map.to_pretty_json()?);
            eprintln!(
                "players={} balance_entries={} trophy_entries={} trophy_only={}",
                report.map.len(),
                report.balance_entries,
                report.trophy_entries,
                report.trophy_only
            );
        }

        Commands::Rank {
            balance,
            config_paths,
        } => {
            let table = if config_paths.is_empty() {
                RankTable::club_default()
            } else {
                load_config(&config_paths)?.rank_table()?
            };
            let band = table.classify(balance);
            println!("balance={} rank={} class={}", balance, band.name, band.class);
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = usy_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Reconcile { config_paths } => {
            let cfg = load_config(&config_paths)?;
            let secrets = usy_config::resolve_secrets(&cfg);
            let ledger = usy_ledger::build_ledger(&cfg, &secrets)?;
            let outcome = ledger.reconcile().await;
            let fell_through: Vec<String> =
                outcome.fell_through.iter().map(|t| t.to_string()).collect();
            println!("pass_id={}", outcome.pass_id);
            println!("tier={}", outcome.tier);
            println!("players={}", outcome.map.len());
            println!("total_balance={}", outcome.map.total_balance());
            println!("fell_through={}", fell_through.join(","));
            println!("cache_written={}", outcome.cache_written);
            println!("cache_path={}", cfg.ledger.cache_path.display());
        }
    }

    Ok(())
}

fn init_tracing() {
    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

fn read_feed(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read feed failed: {path}"))
}

fn load_config(paths: &[String]) -> Result<usy_config::UsyConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = usy_config::load_layered_yaml(&path_refs)?;
    loaded.typed()
}
