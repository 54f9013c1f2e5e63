//! Everything used to handle the application configuration.
//!
//! Create a new configuration as follows:
//! ```rust,no_run
//! use sotd_common::prelude::*;
//! let config = SotdConfig::from_env().unwrap();
//! // or when you want to use a file and only overwrite from env
//! let config = SotdConfig::from_env_and_file("../.config/config.toml").unwrap();
//! ```

use tracing::{event, Level};

pub use figment::Error;
use figment::{providers::{Env, Format, Toml}, Figment};

/// The application configuration.
///
/// You can use [from_env()](#from_env) or [from_env_and_file(path: &str)](#from_env_and_file) to create a configuration.
///
/// Settings:
/// * `discord_token`: `String`
/// * `data_file`: `String`
/// * `spotify_client_id`: `String`
/// * `spotify_client_secret`: `String`
/// * `apply_timezone_offset`: `bool`
/// * `job_interval_min`: `u32`
#[derive(Debug, serde::Deserialize, serde::Serialize, PartialEq, Eq, Clone)]
pub struct SotdConfig {
    /// The Discord API token.
    pub discord_token: String,
    /// Path of the json document holding the songs and settings of every server.
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// Spotify client id used for the client credentials flow.
    pub spotify_client_id: String,
    /// Spotify client secret. For security reasons this can only be set from the environment.
    pub spotify_client_secret: String,
    /// When set, the daily trigger compares the configured post time against UTC shifted by the
    /// server's timezone offset. Off by default, so post times are read as UTC.
    #[serde(default)]
    pub apply_timezone_offset: bool,
    /// Job interval in minutes
    #[serde(default = "default_job_interval")]
    pub job_interval_min: u32,
}

const ENV_PREFIX: &str = "SOTD_";

fn default_data_file() -> String {
    String::from("sotd_data.json")
}

fn default_job_interval() -> u32 {
    1
}

impl SotdConfig {
    /// Create a configuration just from environment variables.
    ///
    /// This will read all variables prefixed with `SOTD_` and try to serialize them into a `SotdConfig`.
    #[allow(dead_code)]
    #[tracing::instrument]
    pub fn from_env() -> Result<Self, Error> {
        let figment = Figment::new()
            .merge(Env::prefixed(ENV_PREFIX));

        figment.extract()
    }

    /// Create a configuration from the environment variables and the indicated file.
    ///
    /// The file is prioritised. You can use the environment variables to overwrite certain file values.
    ///
    /// For more info about how the environment variables are read, see [from_env()](#from_env).
    #[tracing::instrument]
    pub fn from_env_and_file(path: &str) -> Result<Self, Error> {
        event!(
            Level::DEBUG,
            "Building configuration from environment and file {}",
            path
        );

        let file_figment = Figment::new()
            .merge(Toml::file_exact(path));

        if file_figment.extract_inner::<String>("spotify_client_secret").is_ok() {
            return Err(Error::from("Setting the spotify client secret is not allowed from a config file"));
        }

        let env_figment = Figment::new()
            .merge(Env::prefixed(ENV_PREFIX));

        file_figment.merge(env_figment).extract()
    }
}
