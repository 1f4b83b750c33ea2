use std::sync::Arc;

use db::DBService;

use crate::{config::ServerConfig, response::UrlBuilder};

pub mod config;
pub mod error;
pub mod http;
pub mod list_params;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod validation;

#[cfg(test)]
pub mod test_support;

/// Shared handler state: the database service and the immutable server configuration.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<ServerConfig>,
    urls: UrlBuilder,
}

impl AppState {
    pub fn new(db: DBService, config: ServerConfig) -> Self {
        let urls = UrlBuilder::new(&config.public_base_url);
        Self {
            db,
            config: Arc::new(config),
            urls,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }
}
