use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    repository::interface::Repository,
    translate::{self, system_prompt, Translator},
};

/// Everything a request handler needs. Built once at startup and shared by all handlers;
/// the connection pool inside the repository is the only state shared across requests.
#[derive(Debug, Clone)]
pub struct PlaygroundContext {
    pub repository: Arc<dyn Repository>,
    pub translator: Arc<dyn Translator>,
}

impl PlaygroundContext {
    pub fn new(repository: Arc<dyn Repository>, translator: Arc<dyn Translator>) -> Self {
        Self {
            repository,
            translator,
        }
    }

    /// Turn an English question into candidate SQL. The visible tables are listed in
    /// the instruction when the catalog can be read.
    pub async fn translate_question(&self, question: &str) -> Result<String, translate::Error> {
        let tables = match self.repository.list_tables().await {
            Ok(tables) => tables.into_iter().map(|t| t.table_name).collect(),
            Err(e) => {
                warn!("Couldn't list tables for the translation prompt: {e}");
                vec![]
            }
        };

        let sql = self
            .translator
            .translate(&system_prompt(&tables), question)
            .await?;
        debug!("Translated {question:?} into {sql:?}");
        Ok(sql)
    }
}
