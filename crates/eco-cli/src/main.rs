use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "eco", version, about = "EcoShare platform CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API server.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = eco_api::load_config()?;
            eco_api::run(config).await?;
        }
        Commands::Migrate => {
            eco_core::logging::init("eco-cli");
            let database_url = eco_core::config::required_env("DATABASE_URL")?;
            let pool = eco_core::db::connect(&database_url).await?;
            eco_core::migrations::run(&pool).await?;
            tracing::info!("migrations applied");
        }
    }

    Ok(())
}
