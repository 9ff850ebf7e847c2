use std::sync::Arc;

use slog::Logger;

use crate::config::Config;
use crate::db::Db;
use crate::notify::Notifier;
use crate::rate_limit::Limiter;

/// Everything a request handler needs, constructed once per process
/// and cloned into each route.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db + Send + Sync>,
    pub limiter: Arc<dyn Limiter + Send + Sync>,
    pub notifier: Notifier,
    pub config: Arc<Config>,
}

impl Environment {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<dyn Db + Send + Sync>,
        limiter: Arc<dyn Limiter + Send + Sync>,
        notifier: Notifier,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            limiter,
            notifier,
            config: Arc::new(config),
        }
    }
}
