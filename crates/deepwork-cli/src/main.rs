use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "deepwork", version, about = "DeepWork session tracker")]
struct Cli {
    /// Backend URL, overriding `api.base_url` from the config file
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus session management
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Aggregate statistics over all sessions
    Stats,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_logging() {
    let filter = EnvFilter::try_from_env("DEEPWORK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let output = commands::Output { json: cli.json };

    let result = match cli.command {
        Commands::Session { action } => {
            commands::session::run(action, cli.api_url.as_deref(), output).await
        }
        Commands::Stats => commands::stats::run(cli.api_url.as_deref(), output).await,
        Commands::Config { action } => commands::config::run(action, output),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "deepwork", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
