use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to an ingestor config file (defaults apply when omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the latest reading of one or more sensors
    Sensor {
        /// Comma-separated sensor ids (e.g. "@13986,A60886")
        #[arg(long)]
        ids: String,
    },

    /// Fetch daily weather for every place in a places file
    Weather {
        /// Path to places.json
        #[arg(long)]
        places: String,

        /// Forecast horizon in days (1-16); mutually exclusive with --start/--end
        #[arg(long, conflicts_with_all = ["start", "end"])]
        forecast_days: Option<u8>,

        /// Archive start date, YYYY-MM-DD
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Archive end date, YYYY-MM-DD
        #[arg(long, requires = "start")]
        end: Option<String>,
    },

    /// Read a per-sensor history export
    History {
        /// Path to <sensor id>.csv
        #[arg(long)]
        file: String,
    },
}
