use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(about = "Aloft CLI.")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the balloon API over HTTP.
    Http {
        #[arg(env = "ALOFT_SERVER_ADDRESS", default_value = "127.0.0.1:3030")]
        address: std::net::SocketAddr,
    },
    /// Fetch and repair the current snapshot window, printing a summary.
    Fetch,
    /// Print a 24-hour drift forecast as JSON.
    Forecast(ForecastArgs),
}

#[derive(Debug, Args)]
pub struct ForecastArgs {
    /// Origin latitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,
    /// Origin longitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,
    /// Origin altitude in kilometers.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub alt: f64,
    /// Forecast from this balloon slot's last known position instead,
    /// with the slot's history prepended to the output.
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    pub slot: Option<usize>,
    /// Print hourly vertices without interpolation or smoothing.
    #[arg(long)]
    pub raw: bool,
}
