use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{Balances, UserId};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default = "default_users")]
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketConfig {
    pub base_asset: String,
    pub quote_asset: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub id: UserId,
    #[serde(default)]
    pub balances: Balances,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_asset: "GOOGLE".to_string(),
            quote_asset: "USD".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { channel_capacity: 1024 }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            market: MarketConfig::default(),
            users: default_users(),
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_users() -> Vec<UserConfig> {
    let market = MarketConfig::default();
    ["1", "2"]
        .into_iter()
        .map(|id| UserConfig {
            id: id.to_string(),
            balances: Balances::from([
                (market.base_asset.clone(), Decimal::from(10)),
                (market.quote_asset.clone(), Decimal::from(50_000)),
            ]),
        })
        .collect()
}

impl Settings {
    /// Reads `path` (any format the `config` crate recognises) with `SPOT_CLOB__*`
    /// environment overrides on top.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SPOT_CLOB").separator("__"));
        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn load_or_default(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
