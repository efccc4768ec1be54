// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations and the shared wiring they run on

pub mod interactive;
pub mod list;
pub mod render;
pub mod search;
pub mod show;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;

use udash::api::{HttpRecordSource, RecordSource, StaticRecordSource};
use udash::clock::SystemClock;
use udash::config::Config;
use udash::dashboard::{Dashboard, DashboardOptions};
use udash::persist::{ExternalWatch, FileStore, LocalStore, MemoryStore};
use udash::search::TokenMatch;
use udash::store::RecordStore;

use crate::cli::{Cli, OutputFormat};

/// Everything a command needs, resolved from config and global flags.
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub compact: bool,
    store: Arc<RecordStore>,
    persistence: Arc<dyn LocalStore>,
    file_store: Option<FileStore>,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = Config::load();

        let source: Arc<dyn RecordSource> = match &cli.fixture {
            Some(path) => Arc::new(StaticRecordSource::from_json_file(path)?),
            None => Arc::new(HttpRecordSource::new(
                config.merge_api_url(cli.api_url.as_deref()),
                config.request_timeout(),
            )),
        };
        debug!(endpoint = source.endpoint(), "record source");
        let store = Arc::new(RecordStore::new(
            source,
            Arc::new(SystemClock),
            config.cache_ttl(),
        ));

        let file_store = match config.state_file() {
            Some(path) if !cli.no_persist => Some(
                FileStore::open(&path)
                    .with_context(|| format!("failed to open state file {}", path.display()))?,
            ),
            _ => None,
        };
        let persistence: Arc<dyn LocalStore> = match &file_store {
            Some(store) => Arc::new(store.clone()),
            None => Arc::new(MemoryStore::new()),
        };

        Ok(Self {
            format: cli.format.unwrap_or(OutputFormat::Text),
            compact: cli.compact,
            config,
            store,
            persistence,
            file_store,
        })
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn dashboard(&self, per_page: Option<usize>) -> Dashboard {
        let options = DashboardOptions {
            items_per_page: self.config.merge_items_per_page(per_page),
            debounce: self.config.debounce_policy(),
            strategy: Box::new(TokenMatch),
        };
        Dashboard::new(Arc::clone(&self.store), Arc::clone(&self.persistence), options)
    }

    /// Start watching the state file for other sessions, when there is one.
    pub fn watch_external(&self) -> Result<Option<ExternalWatch>> {
        self.file_store
            .as_ref()
            .map(|store| store.watch_external().context("failed to watch state file"))
            .transpose()
    }

    /// Wait for queued state writes before the process exits.
    pub fn finish(&self) {
        if let Some(store) = &self.file_store {
            store.flush();
        }
    }
}
