use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "racfpool",
    about = "Inspect RACF terminal session pool configuration",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a pool configuration, then print a summary.
    ///
    /// Passwords are never printed.
    Check {
        /// Path to racf-pool.toml
        #[arg(short, long, default_value = "racf-pool.toml")]
        config: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Write a racf-pool.toml scaffold
    Init {
        /// Target file
        #[arg(short, long, default_value = "racf-pool.toml")]
        path: String,
        /// Mainframe host name or address
        #[arg(long)]
        host: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("racf_pool=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config, format } => commands::check(&config, &format),
        Commands::Init { path, host } => commands::init(&path, &host),
    }
}
