use std::sync::Arc;

use super::{
    api::{ApiError, PanelApi, PanelClient},
    codes::CodeStore,
    config::Config,
    deploy::{DeploySettings, Orchestrator},
    ledger::Ledger,
    redis::{open, test_redis_connection, DBError, RedisStore},
    registration::Gateway,
    store::Store,
};

/* BotContext holds everything a handler needs: configuration, storage, and the panel client.
 * Built once in main and handed to the dispatcher, instead of living in globals.
 */
pub struct BotContext {
    pub config: Config,
    pub ledger: Arc<Ledger>,
    pub codes: CodeStore,
    pub gateway: Arc<Gateway>,
    pub orchestrator: Orchestrator,
}

#[derive(thiserror::Error, Debug)]
pub enum StartupError {
    #[error("Redis database error: {0}")]
    DBError(DBError),
    #[error("Redis did not echo back the test value")]
    RedisCheckFailed,
    #[error("Panel client error: {0}")]
    ApiError(ApiError),
}

impl From<DBError> for StartupError {
    fn from(db_error: DBError) -> StartupError {
        StartupError::DBError(db_error)
    }
}

impl From<ApiError> for StartupError {
    fn from(api_error: ApiError) -> StartupError {
        StartupError::ApiError(api_error)
    }
}

impl BotContext {
    pub fn new(config: Config, store: Arc<dyn Store>, panel: Arc<dyn PanelApi>) -> BotContext {
        let ledger = Arc::new(Ledger::new(store.clone()));
        let codes = CodeStore::new(ledger.clone());
        let gateway = Arc::new(Gateway::new(store, panel.clone(), &config.email_domain));
        let orchestrator = Orchestrator::new(
            ledger.clone(),
            gateway.clone(),
            panel,
            DeploySettings {
                cost: config.deploy_cost,
                memory_gb: config.default_ram,
                cores: config.default_cores,
            },
        );

        BotContext {
            config,
            ledger,
            codes,
            gateway,
            orchestrator,
        }
    }

    // Connects to Redis and builds the panel client from the config
    pub fn connect(config: Config) -> Result<BotContext, StartupError> {
        let client = open(&config.redis_url)?;
        if !test_redis_connection(&client)? {
            return Err(StartupError::RedisCheckFailed);
        }

        let panel = PanelClient::new(&config.panel_url, &config.api_key, config.api_timeout)?;
        Ok(BotContext::new(
            config,
            Arc::new(RedisStore::new(client)),
            Arc::new(panel),
        ))
    }
}
