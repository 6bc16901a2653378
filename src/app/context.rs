use std::sync::Arc;

use crate::app::Result;
use crate::config::Config;
use crate::fetcher::http_fetcher::TimelineClient;
use crate::fetcher::Fetcher;
use crate::mailer::smtp::parse_mailbox;
use crate::mailer::{Mailer, SmtpMailer};
use crate::normalizer::Normalizer;
use crate::store::{CheckpointStore, JsonCheckpointStore};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn CheckpointStore + Send + Sync>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub mailer: Arc<dyn Mailer + Send + Sync>,
    pub normalizer: Normalizer,
}

impl AppContext {
    /// Wire up the real collaborators. Fails before any network traffic if
    /// the configuration cannot be used.
    pub fn new(config: Config) -> Result<Self> {
        parse_mailbox(&config.email.to)?;
        parse_mailbox(&config.email.from)?;

        let store = Arc::new(JsonCheckpointStore::new(&config.record_path));
        let fetcher = Arc::new(TimelineClient::new(&config)?);
        let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);

        Ok(Self::with_parts(config, store, fetcher, mailer))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn CheckpointStore + Send + Sync>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        mailer: Arc<dyn Mailer + Send + Sync>,
    ) -> Self {
        let normalizer = Normalizer::new(config.timezone);
        Self {
            config,
            store,
            fetcher,
            mailer,
            normalizer,
        }
    }
}
