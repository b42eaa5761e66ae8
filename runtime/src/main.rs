//! pod-alert command-line entry point.

use clap::{Parser, Subcommand};
use pod_alert::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pod-alert", version, about = "Forward trading-terminal alerts with their event ids")]
struct Cli {
    /// Machine-readable output on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress human-readable progress output.
    #[arg(long, global = true)]
    quiet: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// JSON config file.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the terminal and forward alerts.
    Run(cli::run_cmd::RunArgs),
    /// Check the browser, the sink and the configuration.
    Doctor,
    /// Print the alert records found in a saved grid HTML file.
    Extract(cli::extract_cmd::ExtractArgs),
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    if args.json {
        std::env::set_var("POD_ALERT_JSON", "1");
    }
    if args.quiet {
        std::env::set_var("POD_ALERT_QUIET", "1");
    }
    if args.no_color {
        std::env::set_var("NO_COLOR", "1");
    }

    cli::init_tracing(args.log_json);

    let config = args.config.as_deref();
    let result = match args.command {
        Command::Run(run) => cli::run_cmd::run(config, run).await,
        Command::Doctor => cli::doctor::run(config).await,
        Command::Extract(extract) => cli::extract_cmd::run(config, extract),
    };

    if let Err(e) = result {
        let s = cli::output::Styled::new();
        eprintln!("  {} {e:#}", s.fail_sym());
        std::process::exit(1);
    }
}
