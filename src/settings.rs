use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ledger {
    /// Credits granted for every recorded donation.
    #[serde(default = "default_donation_credits")]
    pub donation_credits: i32,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            donation_credits: default_donation_credits(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    #[serde(default)]
    pub ledger: Ledger,
}

fn default_max_connections() -> u32 {
    5
}

fn default_donation_credits() -> i32 {
    5
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("PULSE").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
