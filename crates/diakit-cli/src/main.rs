use clap::{Parser, Subcommand};

mod commands;
mod delivery;

#[derive(Parser)]
#[command(name = "diakit", version, about = "Diabetes supply tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Supply inventory management
    Supply {
        #[command(subcommand)]
        action: commands::supply::SupplyAction,
    },
    /// Items currently in use
    InUse {
        #[command(subcommand)]
        action: commands::inuse::InUseAction,
    },
    /// Replacement timers
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Action history log
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Reminder settings and reconciliation
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Bulk data operations
    Data {
        #[command(subcommand)]
        action: commands::data::DataAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Supply { action } => commands::supply::run(action),
        Commands::InUse { action } => commands::inuse::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::History { action } => commands::history::run(action),
        Commands::Notify { action } => commands::notify::run(action),
        Commands::Data { action } => commands::data::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
