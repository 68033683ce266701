use clap::Parser;
use cli::{Cli, Command};

mod cli;
mod config;
mod forecast;
mod geometry;
mod json_repair;
mod models;
mod retry;
mod server;
mod snapshots;
mod store;
mod telemetry;
mod tools;
mod wind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Cli::parse();

    match args.cmd {
        Command::Http { address } => {
            server::run(address).await;
            Ok(())
        }
        Command::Fetch => tools::fetch().await,
        Command::Forecast(forecast_args) => tools::forecast(forecast_args).await,
    }
}
