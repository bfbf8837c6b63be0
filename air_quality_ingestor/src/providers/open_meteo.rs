//! Open-Meteo daily weather (historical archive and forecast).

pub mod params;
pub mod provider;
pub mod response;

pub use provider::OpenMeteoProvider;
