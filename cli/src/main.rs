//! Thicket CLI binary: run one tree-of-thoughts search against an OpenAI-compatible endpoint.
//!
//! The endpoint comes from `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`
//! (a `.env` file in the working directory is loaded first). Ctrl-C cancels the
//! search at the current stage.

mod display;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use thicket::{
    CancellationToken, OpenAiOracle, ResilientOracle, SearchConfig, SearchOutcome, TreeOfThoughts,
};

/// Max chars of a thought shown in `--verbose` progress lines.
const DISPLAY_MAX_LEN: usize = 120;

#[derive(Parser, Debug)]
#[command(name = "thicket")]
#[command(about = "Thicket: best-first tree-of-thoughts search from the command line")]
struct Args {
    /// Search config (TOML); defaults are used when absent
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the final search tree to stderr
    #[arg(long)]
    print_tree: bool,

    /// Print the whole outcome (answers, status, tree, stats) as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, requires = "json")]
    pretty: bool,

    /// Verbose: progress events on stderr and `info` logs
    #[arg(short, long)]
    verbose: bool,

    /// Problem statement (joined with spaces)
    #[arg(required = true, trailing_var_arg = true)]
    problem: Vec<String>,
}

fn print_outcome(args: &Args, outcome: &SearchOutcome) -> Result<(), Box<dyn std::error::Error>> {
    if args.print_tree {
        eprintln!("{}", outcome.tree.outline());
    }
    if args.json {
        let s = if args.pretty {
            serde_json::to_string_pretty(outcome)?
        } else {
            serde_json::to_string(outcome)?
        };
        println!("{s}");
        return Ok(());
    }
    println!();
    println!("FINAL ANSWERS");
    if outcome.answers.is_empty() {
        println!("Answer not found in max steps");
    } else {
        for answer in &outcome.answers {
            println!("{answer}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::init(args.verbose)?;

    let config = match &args.config {
        Some(path) => SearchConfig::load(path),
        None => Ok(SearchConfig::default()),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("thicket: {e}");
            std::process::exit(2);
        }
    };

    let oracle = ResilientOracle::new(OpenAiOracle::from_env(), config.retry.policy());
    let cancel = CancellationToken::new();
    let mut tot = match TreeOfThoughts::from_config(Arc::new(oracle), &config) {
        Ok(t) => t.with_cancellation(cancel.clone()),
        Err(e) => {
            eprintln!("thicket: {e}");
            std::process::exit(2);
        }
    };

    let printer = if args.verbose {
        let (tx, mut rx) = tokio::sync::mpsc::channel(256);
        tot = tot.with_events(tx);
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                eprintln!("{}", display::format_event(&event, DISPLAY_MAX_LEN));
            }
        }))
    } else {
        None
    };

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling search");
            on_interrupt.cancel();
        }
    });

    let problem = args.problem.join(" ");
    let result = tot.reason(&problem).await;
    drop(tot);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    match result {
        Ok(outcome) => print_outcome(&args, &outcome),
        Err(e) => {
            eprintln!("thicket: {e}");
            std::process::exit(1);
        }
    }
}
