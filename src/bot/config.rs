use std::{collections::HashSet, str::FromStr, time::Duration};

/* Config holds every setting the bot reads from its environment.
 * Loaded once at startup, after dotenv has filled in the .env file.
 * The bot token itself is read by teloxide (TELOXIDE_TOKEN).
 */

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1/";
const DEFAULT_DEPLOY_COST: i64 = 500;
const DEFAULT_RAM: u32 = 2;
const DEFAULT_CORES: u32 = 1;
const DEFAULT_DAILY_REWARD: i64 = 100;
const DEFAULT_DAILY_COOLDOWN_SECS: i64 = 24 * 60 * 60;
const DEFAULT_API_TIMEOUT_SECS: u64 = 15;
const DEFAULT_EMAIL_DOMAIN: &str = "gmail.com";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub panel_url: String,
    pub api_key: String,
    pub admin_ids: HashSet<u64>,
    pub redis_url: String,
    pub deploy_cost: i64,
    pub default_ram: u32,
    pub default_cores: u32,
    pub daily_reward: i64,
    pub daily_cooldown_secs: i64,
    pub api_timeout: Duration,
    pub email_domain: String,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Config::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(ConfigError::Missing(name)),
            }
        };

        Ok(Config {
            panel_url: required("PANEL_URL")?,
            api_key: required("API_KEY")?,
            admin_ids: parse_admin_ids(lookup("ADMIN_IDS").as_deref().unwrap_or(""))?,
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            deploy_cost: parse_or(&lookup, "DEPLOY_COST", DEFAULT_DEPLOY_COST)?,
            default_ram: parse_or(&lookup, "DEFAULT_RAM", DEFAULT_RAM)?,
            default_cores: parse_or(&lookup, "DEFAULT_CORES", DEFAULT_CORES)?,
            daily_reward: parse_or(&lookup, "DAILY_REWARD", DEFAULT_DAILY_REWARD)?,
            daily_cooldown_secs: parse_or(
                &lookup,
                "DAILY_COOLDOWN_SECS",
                DEFAULT_DAILY_COOLDOWN_SECS,
            )?,
            api_timeout: Duration::from_secs(parse_or(
                &lookup,
                "API_TIMEOUT_SECS",
                DEFAULT_API_TIMEOUT_SECS,
            )?),
            email_domain: lookup("REGISTER_EMAIL_DOMAIN")
                .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string()),
        })
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            value: value.clone(),
        }),
        None => Ok(default),
    }
}

// Parses a comma separated list of user ids. Blank entries are skipped.
fn parse_admin_ids(raw: &str) -> Result<HashSet<u64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "ADMIN_IDS",
                value: id.to_string(),
            })
        })
        .collect()
}
