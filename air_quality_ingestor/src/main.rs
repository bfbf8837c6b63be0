use std::error::Error;

use air_quality_ingestor::{
    cli::{
        commands::{Cli, Commands},
        params::{parse_sensor_list, weather_window},
    },
    config::IngestConfig,
    io::historical::read_history_file,
    models::{
        place::load_places,
        request_params::{WeatherLocation, WeatherRequest},
        weather::DAILY_VARIABLES,
    },
    providers::{
        AirQualityProvider, WeatherProvider, aqicn::AqicnProvider, open_meteo::OpenMeteoProvider,
    },
};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

fn print_json_lines<T: Serialize>(rows: &[T]) -> Result<(), Box<dyn Error>> {
    for row in rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .compact()
        .init();
    shared_utils::env::load_dotenv(None);

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => IngestConfig::from_path(path)?,
        None => IngestConfig::default(),
    };

    match cli.command {
        Commands::Sensor { ids } => {
            let provider = AqicnProvider::new(&config)?;
            let mut readings = Vec::new();
            for sensor in parse_sensor_list(&ids)? {
                readings.push(provider.latest(&sensor).await?);
            }
            print_json_lines(&readings)?;
        }
        Commands::Weather {
            places,
            forecast_days,
            start,
            end,
        } => {
            let places = load_places(&places)?;
            let locations: Vec<WeatherLocation> = places
                .values()
                .map(|p| WeatherLocation {
                    place_id: p.id.clone(),
                    coords: p.coords(),
                })
                .collect();
            let window =
                weather_window(forecast_days, start.as_deref(), end.as_deref(), locations.len())?;
            let request = WeatherRequest {
                locations,
                window,
                variables: DAILY_VARIABLES.iter().map(|v| v.to_string()).collect(),
            };
            let provider = OpenMeteoProvider::new(&config)?;
            print_json_lines(&provider.daily(&request).await?)?;
        }
        Commands::History { file } => {
            print_json_lines(&read_history_file(&file)?)?;
        }
    }

    Ok(())
}
