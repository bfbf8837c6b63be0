use std::path::Path;

use secrecy::SecretString;
use thiserror::Error;
use tracing::debug;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty values count as missing; a blank API token is never useful.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}

/// Reads an environment variable holding a credential.
///
/// The value is wrapped in a [`SecretString`] straight away so it never ends
/// up in `Debug` output or logs.
pub fn get_secret_env_var(name: &str) -> Result<SecretString, MissingEnvVarError> {
    get_env_var(name).map(SecretString::from)
}

/// Loads a `.env` file into the process environment if one can be found.
///
/// Looks in the given directory first, then falls back to dotenvy's upward
/// search from the working directory. Variables already set win. Returns
/// whether a file was loaded.
pub fn load_dotenv(dir: Option<&Path>) -> bool {
    let loaded = match dir {
        Some(dir) => dotenvy::from_path(dir.join(".env")).is_ok() || dotenvy::dotenv().is_ok(),
        None => dotenvy::dotenv().is_ok(),
    };
    debug!(loaded, "dotenv lookup finished");
    loaded
}
