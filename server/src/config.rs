use serde::Deserialize;

pub const STARTING_BALANCE: i64 = 1000;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// `mem://` for an in-process store, `ws://host:port` for a server.
    pub database_url: String,
    pub namespace: String,
    pub database: String,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub starting_balance: i64,
    pub settlement_interval_secs: u64,
    /// Wagers of one match settled at once. Transactions still serialize on
    /// the store's write lock.
    pub settlement_concurrency: usize,
}

impl Config {
    /// Defaults overridden by `LEDGER_*` variables, after loading `.env`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        Self::builder()?
            .add_source(config::Environment::with_prefix("LEDGER").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn in_memory() -> Self {
        Self {
            database_url: "mem://".to_string(),
            namespace: "esports".to_string(),
            database: "ledger".to_string(),
            db_username: None,
            db_password: None,
            starting_balance: STARTING_BALANCE,
            settlement_interval_secs: 3600,
            settlement_concurrency: 1,
        }
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
    {
        let defaults = Self::in_memory();
        config::Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("namespace", defaults.namespace)?
            .set_default("database", defaults.database)?
            .set_default("starting_balance", defaults.starting_balance)?
            .set_default("settlement_interval_secs", defaults.settlement_interval_secs)?
            .set_default("settlement_concurrency", defaults.settlement_concurrency as u64)
    }
}
