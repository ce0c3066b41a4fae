use anyhow::{anyhow, Result};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

const CONFIG_PATH_REL_HOME: &str = ".config/cogbot/config.toml";

/// Bot configuration
///
/// Only `general.discord_token` is required; every plugin section falls back to its defaults.
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub general: General,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub chest: Chest,
    #[serde(default)]
    pub counting: Counting,
    #[serde(default)]
    pub earthquake: Earthquake,
    #[serde(default)]
    pub easter: Easter,
    #[serde(default)]
    pub heist: Heist,
    #[serde(default)]
    pub pokemon: Pokemon,
    #[serde(default)]
    pub roleplay: Roleplay,
    #[serde(default)]
    pub holidays: Holidays,
}

#[derive(serde::Serialize, serde::Deserialize)]
pub struct General {
    pub discord_token: String,
    #[serde(default)]
    pub bot_owners: Vec<String>,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Scheduler interval.  Every deadline in the bot is checked this often.
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

fn default_command_prefix() -> String {
    ";".to_owned()
}

fn default_tick_seconds() -> u64 {
    10
}

fn default_http_timeout_seconds() -> u64 {
    15
}

/// Third-party API credentials
#[derive(Default, serde::Serialize, serde::Deserialize)]
pub struct Credentials {
    pub tmdb_api_key: Option<String>,
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Chest {
    pub default_min_minutes: u64,
    pub default_max_minutes: u64,
    pub claim_window_seconds: i64,
}

impl Default for Chest {
    fn default() -> Self {
        Self {
            default_min_minutes: 30,
            default_max_minutes: 120,
            claim_window_seconds: 120,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Counting {
    pub default_ruin_minutes: u64,
}

impl Default for Counting {
    fn default() -> Self {
        Self {
            default_ruin_minutes: 60,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Earthquake {
    pub feed_url: String,
    pub poll_seconds: u64,
    pub max_retries: u32,
}

impl Default for Earthquake {
    fn default() -> Self {
        Self {
            feed_url: "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/2.5_hour.geojson"
                .to_owned(),
            poll_seconds: 120,
            max_retries: 3,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Easter {
    pub hunt_seconds: i64,
    pub cooldown_seconds: i64,
    /// Weight added to the golden egg per hunt without one
    pub golden_pity_bonus: f64,
}

impl Default for Easter {
    fn default() -> Self {
        Self {
            hunt_seconds: 60,
            cooldown_seconds: 300,
            golden_pity_bonus: 1.0,
        }
    }
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Heist {
    pub starting_credits: u64,
    pub starting_vault: u64,
    pub entry_fee: u64,
    pub lobby_seconds: i64,
    pub cooldown_seconds: i64,
    pub jail_seconds: i64,
    pub bail_cost: u64,
    pub payday_amount: u64,
    pub payday_cooldown_seconds: i64,
}

impl Default for Heist {
    fn default() -> Self {
        Self {
            starting_credits: 500,
            starting_vault: 10_000,
            entry_fee: 50,
            lobby_seconds: 60,
            cooldown_seconds: 600,
            jail_seconds: 1800,
            bail_cost: 250,
            payday_amount: 200,
            payday_cooldown_seconds: 86_400,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Pokemon {
    pub api_url: String,
    pub quiz_seconds: i64,
}

impl Default for Pokemon {
    fn default() -> Self {
        Self {
            api_url: "https://pokeapi.co/api/v2".to_owned(),
            quiz_seconds: 30,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Roleplay {
    pub api_url: String,
}

impl Default for Roleplay {
    fn default() -> Self {
        Self {
            api_url: "https://nekos.best/api/v2".to_owned(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Holidays {
    pub default_country: String,
}

impl Default for Holidays {
    fn default() -> Self {
        Self {
            default_country: "US".to_owned(),
        }
    }
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    pub async fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| {
            anyhow!(
                "Could not open configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await.map_err(|e| {
            anyhow!(
                "Could not read configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })?;

        Self::parse(&contents).map_err(|e| {
            anyhow!(
                "Could not parse configuration at `{}`: {}",
                path.to_string_lossy(),
                e
            )
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub async fn reload(&mut self) -> Result<()> {
        let new = Self::load().await?;
        *self = new;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_alone_is_enough() {
        let cfg = Config::parse("[general]\ndiscord_token = \"abc\"\n").unwrap();
        assert_eq!(cfg.general.discord_token, "abc");
        assert_eq!(cfg.general.command_prefix, ";");
        assert_eq!(cfg.general.tick_seconds, 10);
        assert!(cfg.credentials.tmdb_api_key.is_none());
        assert_eq!(cfg.heist.entry_fee, 50);
        assert_eq!(cfg.holidays.default_country, "US");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::parse(
            r#"
            [general]
            discord_token = "abc"
            command_prefix = "!"

            [easter]
            hunt_seconds = 5

            [credentials]
            tmdb_api_key = "key"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.general.command_prefix, "!");
        assert_eq!(cfg.easter.hunt_seconds, 5);
        assert_eq!(cfg.easter.cooldown_seconds, 300);
        assert_eq!(cfg.credentials.tmdb_api_key.as_deref(), Some("key"));
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(Config::parse("[general]\ncommand_prefix = \";\"\n").is_err());
    }
}
