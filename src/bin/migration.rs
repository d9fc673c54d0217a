use clap::{Parser, Subcommand};
use partstore_api::{config, migrator::Migrator};
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "migration", about = "Manage the parts store database schema")]
struct Cli {
    /// Connection string; defaults to the configured `database_url`
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending migrations (the default)
    Up {
        #[arg(long)]
        steps: Option<u32>,
    },
    /// Roll back applied migrations, one step unless told otherwise
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Print the state of every migration
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let database_url = match cli.database_url {
        Some(url) => url,
        None => config::load_config()?.database_url,
    };

    info!("Connecting to database");
    let mut options = ConnectOptions::new(database_url);
    options
        .max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .sqlx_logging(true);
    let db = Database::connect(options).await?;

    match cli.command.unwrap_or(Command::Up { steps: None }) {
        Command::Up { steps } => {
            Migrator::up(&db, steps).await?;
            info!("Migrations applied");
        }
        Command::Down { steps } => {
            Migrator::down(&db, Some(steps)).await?;
            info!(steps, "Migrations rolled back");
        }
        Command::Status => Migrator::status(&db).await?,
    }

    Ok(())
}
