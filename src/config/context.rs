use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::{
    context::PlaygroundContext,
    repository::{
        interface::Repository,
        postgres::{PoolSettings, PostgresRepository},
    },
    translate::{OpenAiTranslator, Translator},
};

use super::schema;

async fn build_repository(
    config: &schema::Database,
) -> Result<Arc<dyn Repository>, sqlx::Error> {
    let settings = PoolSettings {
        min_connections: config.min_connections,
        max_connections: config.max_connections,
        idle_timeout: Duration::from_millis(config.idle_timeout_ms),
    };

    let repository =
        PostgresRepository::try_new(&config.dsn, config.schema.clone(), settings).await?;
    info!(
        "Connected to the database (schema {:?}, up to {} connections)",
        config.schema, config.max_connections
    );
    Ok(Arc::new(repository))
}

pub async fn build_context(
    cfg: &schema::TidepoolConfig,
) -> Result<PlaygroundContext, sqlx::Error> {
    let repository = build_repository(&cfg.database).await?;

    if cfg.completion.api_key.is_none() {
        info!("No language model API key configured, natural language queries will fail");
    }
    let translator: Arc<dyn Translator> =
        Arc::new(OpenAiTranslator::new(cfg.completion.clone()));

    Ok(PlaygroundContext::new(repository, translator))
}
