mod commands;
mod station;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use crate::station::StationCommands;

#[derive(Debug, Parser)]
#[command(name = "fuelwatch")]
#[command(about = "Fuel price alerts: ingest listings, manage subscriptions, send alerts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run one ingest, match and notify cycle now
    Cycle {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the cheapest stations per grade
    Prices {
        /// Only this grade (e.g. diesel, 95, 98)
        #[arg(long)]
        grade: Option<String>,
        /// Add distances from this subscriber's stored location
        #[arg(long)]
        email: Option<String>,
        /// Stations per grade (defaults to FUELWATCH_TOP_K)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Create or replace the subscription for an email
    Subscribe {
        email: String,
        threshold: Decimal,
        grade: String,
        /// Address to geocode for distance ranking
        #[arg(long)]
        address: Option<String>,
    },
    /// Remove the subscription for an email
    Unsubscribe { email: String },
    /// Geocode an address and store it as a subscriber's location
    Locate { email: String, address: String },
    /// Manage the station registry
    Station {
        #[command(subcommand)]
        command: StationCommands,
    },
    /// List recent cycle runs
    Runs {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("fuelwatch: no command given; see --help");
        return Ok(());
    };

    let config = fuelwatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let store = commands::open_store(&config).await?;
    if !matches!(command, Commands::Migrate) {
        store.run_migrations().await?;
    }
    tracing::debug!(?command, "running command");
    let result = match command {
        Commands::Migrate => commands::run_migrate(&store).await,
        Commands::Cycle { json } => commands::run_cycle(&store, &config, json).await,
        Commands::Prices {
            grade,
            email,
            limit,
        } => {
            let k = limit.unwrap_or(config.cycle.top_k).max(1);
            commands::run_prices(&store, &config, grade.as_deref(), email.as_deref(), k).await
        }
        Commands::Subscribe {
            email,
            threshold,
            grade,
            address,
        } => {
            commands::run_subscribe(&store, &config, &email, threshold, &grade, address.as_deref())
                .await
        }
        Commands::Unsubscribe { email } => commands::run_unsubscribe(&store, &config, &email).await,
        Commands::Locate { email, address } => {
            commands::run_locate(&store, &config, &email, &address).await
        }
        Commands::Station { command } => station::run(&store, command).await,
        Commands::Runs { limit } => commands::run_runs(&store, limit).await,
    };
    store.close().await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "command failed");
    }
    result
}

#[cfg(test)]
mod tests;
