// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard state: the glue between the record store, search, debounce,
//! pagination and persisted session state.
//!
//! Presentation layers never touch the parts directly. They send
//! [`Action`]s, refresh when the settled term changes, and render
//! [`DashboardView`] snapshots.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::debounce::{DebouncePolicy, QueryController};
use crate::errors::FetchError;
use crate::pagination::{PageMarker, PageWindow, Paginator, DEFAULT_ITEMS_PER_PAGE};
use crate::persist::{self, keys, LocalStore, StorageEvent};
use crate::record::User;
use crate::search::{FieldFilter, MatchStrategy, SearchSession, SearchStats, TokenMatch};
use crate::store::RecordStore;

pub struct DashboardOptions {
    pub items_per_page: usize,
    pub debounce: DebouncePolicy,
    pub strategy: Box<dyn MatchStrategy>,
}

impl Default for DashboardOptions {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            debounce: DebouncePolicy::Optimized,
            strategy: Box::new(TokenMatch),
        }
    }
}

/// Presentation callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    UserClick(u64),
    Back,
    PageChange(usize),
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    SearchChange(String),
    SetFilter(FieldFilter),
    Clear,
    Retry,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub search_term: String,
    pub settled_term: String,
    pub filter: FieldFilter,
    pub is_searching: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub total_users: usize,
    pub filtered_count: usize,
    pub page: PageWindow,
    pub markers: Vec<PageMarker>,
    pub records: Vec<Arc<User>>,
    pub stats: SearchStats,
    pub selected: Option<Arc<User>>,
}

pub struct Dashboard {
    store: Arc<RecordStore>,
    persistence: Arc<dyn LocalStore>,
    session: SearchSession,
    controller: QueryController,
    pager: Paginator,
    filter: FieldFilter,
    /// Engine output for `searched_for`, before the field filter.
    searched: Vec<Arc<User>>,
    searched_for: Option<String>,
    filtered: Vec<Arc<User>>,
    loaded: bool,
    loading: bool,
    error: Option<String>,
    selected: Option<Arc<User>>,
}

impl Dashboard {
    /// Build a dashboard, restoring the search term and page from
    /// `persistence`. Malformed stored values fall back to defaults.
    pub fn new(
        store: Arc<RecordStore>,
        persistence: Arc<dyn LocalStore>,
        options: DashboardOptions,
    ) -> Self {
        let term: String =
            persist::read_or_default(&*persistence, keys::SEARCH_TERM, String::new());
        let page: usize = persist::read_or_default(&*persistence, keys::CURRENT_PAGE, 1);
        debug!(%term, page, "restored session state");

        Self {
            store,
            persistence,
            session: SearchSession::new(options.strategy),
            controller: QueryController::with_initial(term, options.debounce),
            // The restored page is reconciled once records arrive.
            pager: Paginator::new(options.items_per_page).with_page(page),
            filter: FieldFilter::All,
            searched: Vec::new(),
            searched_for: None,
            filtered: Vec::new(),
            loaded: false,
            loading: false,
            error: None,
            selected: None,
        }
    }

    /// Run the fetch path. On failure the error is kept for display and
    /// the term, filter and page are left alone.
    pub async fn load(&mut self) -> Result<(), FetchError> {
        self.loading = true;
        let result = self.store.get_all().await;
        self.loading = false;
        match result {
            Ok(records) => {
                self.error = None;
                self.loaded = true;
                if self.session.set_records(records) {
                    self.searched_for = None;
                }
                self.refresh();
                Ok(())
            }
            Err(error) => {
                warn!(%error, "failed to load users");
                self.error = Some(error.user_message());
                Err(error)
            }
        }
    }

    pub async fn retry(&mut self) -> Result<(), FetchError> {
        self.load().await
    }

    pub async fn handle(&mut self, action: Action) {
        match action {
            Action::UserClick(id) => {
                self.selected = self
                    .filtered
                    .iter()
                    .chain(self.session.records())
                    .find(|user| user.id == id)
                    .cloned();
            }
            Action::Back => self.selected = None,
            Action::PageChange(page) => {
                self.pager.go_to_page(page);
                self.persist_page();
            }
            Action::NextPage => {
                self.pager.go_to_next();
                self.persist_page();
            }
            Action::PreviousPage => {
                self.pager.go_to_previous();
                self.persist_page();
            }
            Action::FirstPage => {
                self.pager.go_to_first();
                self.persist_page();
            }
            Action::LastPage => {
                self.pager.go_to_last();
                self.persist_page();
            }
            Action::SearchChange(term) => {
                persist::write_value(&*self.persistence, keys::SEARCH_TERM, &term);
                self.controller.set_term(term);
                self.refresh();
            }
            Action::SetFilter(filter) => {
                self.filter = filter;
                self.refresh();
            }
            Action::Clear => {
                self.controller.clear();
                self.filter = FieldFilter::All;
                persist::write_value(&*self.persistence, keys::SEARCH_TERM, &"");
                self.refresh();
                let total = self.session.records().len();
                self.session.engine_mut().clear_stats(total);
            }
            Action::Retry => {
                // The error is already recorded in the view.
                let _ = self.retry().await;
            }
        }
    }

    /// Bring results up to date with the settled term and filter.
    ///
    /// Call whenever [`settled_updates`](Dashboard::settled_updates) fires.
    /// The search engine only runs when the settled term or the record set
    /// changed; otherwise only the field filter is reapplied. Does nothing
    /// until the first successful load, so a restored page survives a
    /// failed fetch.
    pub fn refresh(&mut self) {
        if !self.loaded {
            return;
        }
        let settled = self.controller.settled_term();
        if self.searched_for.as_deref() != Some(settled.as_str()) {
            self.searched = self.session.search(&settled);
            self.searched_for = Some(settled);
        }
        let raw = self.controller.raw_term();
        self.filtered = self.filter.apply(self.searched.clone(), &raw);

        let before = self.pager.current_page();
        self.pager.set_total_items(self.filtered.len());
        if self.pager.current_page() != before {
            self.persist_page();
        }
    }

    /// Apply a pending search term immediately.
    pub fn settle_now(&mut self) {
        self.controller.flush();
        self.refresh();
    }

    /// Settled-term notifications from the debounce controller.
    pub fn settled_updates(&self) -> watch::Receiver<String> {
        self.controller.subscribe()
    }

    /// Notifications for keys changed by another session.
    pub fn storage_events(&self) -> tokio::sync::broadcast::Receiver<StorageEvent> {
        self.persistence.subscribe()
    }

    /// Adopt a search term or page written by another session. The value is
    /// applied without being written back.
    pub fn apply_storage_event(&mut self, event: &StorageEvent) {
        match event.key.as_str() {
            keys::SEARCH_TERM => {
                let term = decode_or(event, String::new());
                if term != self.controller.raw_term() {
                    self.controller.set_term(term);
                    self.refresh();
                }
            }
            keys::CURRENT_PAGE => {
                let page = decode_or(event, 1usize);
                self.pager.go_to_page(page);
            }
            _ => {}
        }
    }

    fn persist_page(&self) {
        persist::write_value(&*self.persistence, keys::CURRENT_PAGE, &self.pager.current_page());
    }

    pub fn view(&self) -> DashboardView {
        let page = self.pager.view();
        DashboardView {
            search_term: self.controller.raw_term(),
            settled_term: self.controller.settled_term(),
            filter: self.filter,
            is_searching: self.controller.is_settling(),
            loading: self.loading,
            error: self.error.clone(),
            total_users: self.session.records().len(),
            filtered_count: self.filtered.len(),
            page,
            markers: self.pager.markers(),
            records: page.slice(&self.filtered).to_vec(),
            stats: self.session.engine().stats(),
            selected: self.selected.clone(),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn filtered(&self) -> &[Arc<User>] {
        &self.filtered
    }
}

fn decode_or<T: serde::de::DeserializeOwned>(event: &StorageEvent, default: T) -> T {
    let Some(raw) = event.new_value.as_deref() else {
        return default;
    };
    match persist::parse_value(&event.key, raw) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, "ignoring external state change");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StaticRecordSource;
    use crate::persist::MemoryStore;
    use crate::record::sample_user;

    fn users(count: u64) -> Vec<User> {
        (1..=count)
            .map(|id| {
                let name = if id == 7 {
                    "Kurtis Weissnat".to_string()
                } else {
                    format!("Person{id} Example")
                };
                sample_user(id, &name, &format!("person{id}@example.test"))
            })
            .collect()
    }

    fn dashboard_with(
        source: Arc<StaticRecordSource>,
        persistence: Arc<MemoryStore>,
    ) -> Dashboard {
        let store = Arc::new(RecordStore::with_source(source));
        Dashboard::new(store, persistence, DashboardOptions::default())
    }

    #[tokio::test(start_paused = true)]
    async fn search_change_applies_after_settling() {
        let source = Arc::new(StaticRecordSource::new(users(13)));
        let persistence = Arc::new(MemoryStore::new());
        let mut dashboard = dashboard_with(source, persistence.clone());
        dashboard.load().await.expect("load");
        assert_eq!(dashboard.view().page.total_pages, 3);

        let mut settled = dashboard.settled_updates();
        dashboard.handle(Action::SearchChange("kurtis".into())).await;
        assert!(dashboard.view().is_searching);
        assert_eq!(dashboard.view().filtered_count, 13);
        assert_eq!(persistence.get_raw(keys::SEARCH_TERM).as_deref(), Some("\"kurtis\""));

        settled.changed().await.expect("settled");
        dashboard.refresh();

        let view = dashboard.view();
        assert!(!view.is_searching);
        assert_eq!(view.filtered_count, 1);
        assert_eq!(view.records[0].id, 7);
        assert_eq!(view.page.total_pages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unsettled_keystrokes_do_not_rerun_search() {
        let source = Arc::new(StaticRecordSource::new(users(13)));
        let mut dashboard = dashboard_with(source, Arc::new(MemoryStore::new()));
        dashboard.load().await.expect("load");

        let mut settled = dashboard.settled_updates();
        dashboard.handle(Action::SearchChange("kurtis".into())).await;
        settled.changed().await.expect("settled");
        dashboard.refresh();
        let computed = dashboard.view().stats;
        assert!(!computed.cache_hit);
        assert_eq!(computed.total_results, 1);
        assert_eq!(dashboard.session.engine().cache().len(), 1);

        dashboard.handle(Action::SearchChange("kurtis x".into())).await;
        assert!(dashboard.view().is_searching);
        assert_eq!(dashboard.view().stats, computed);

        dashboard.handle(Action::SetFilter(FieldFilter::Name)).await;
        dashboard.refresh();
        let view = dashboard.view();
        assert_eq!(view.stats, computed);
        assert_eq!(view.filtered_count, 0);
        assert_eq!(dashboard.session.engine().cache().len(), 1);
    }

    #[tokio::test]
    async fn page_state_is_restored_and_persisted() {
        let persistence = Arc::new(MemoryStore::new());
        persist::write_value(&*persistence, keys::CURRENT_PAGE, &2usize);
        let source = Arc::new(StaticRecordSource::new(users(13)));
        let mut dashboard = dashboard_with(source, persistence.clone());

        dashboard.load().await.expect("load");
        assert_eq!(dashboard.view().page.current_page, 2);

        dashboard.handle(Action::NextPage).await;
        assert_eq!(dashboard.view().page.current_page, 3);
        assert_eq!(dashboard.view().records.len(), 1);
        dashboard.handle(Action::NextPage).await;
        assert_eq!(dashboard.view().page.current_page, 3);
        assert_eq!(persistence.get_raw(keys::CURRENT_PAGE).as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn malformed_persisted_state_uses_defaults() {
        let persistence = Arc::new(MemoryStore::new());
        persistence.set_raw(keys::SEARCH_TERM, "{oops".to_string());
        persistence.set_raw(keys::CURRENT_PAGE, "\"two\"".to_string());
        let source = Arc::new(StaticRecordSource::new(users(3)));
        let mut dashboard = dashboard_with(source, persistence);

        dashboard.load().await.expect("load");
        let view = dashboard.view();
        assert_eq!(view.search_term, "");
        assert_eq!(view.page.current_page, 1);
        assert_eq!(view.filtered_count, 3);
    }

    #[tokio::test]
    async fn failed_load_keeps_ui_state_until_retry_succeeds() {
        let persistence = Arc::new(MemoryStore::new());
        persist::write_value(&*persistence, keys::SEARCH_TERM, &"person");
        persist::write_value(&*persistence, keys::CURRENT_PAGE, &2usize);
        let source = Arc::new(StaticRecordSource::failing(FetchError::Status {
            status: 503,
            url: "fake".into(),
        }));
        let mut dashboard = dashboard_with(source.clone(), persistence);
        dashboard.handle(Action::SetFilter(FieldFilter::Name)).await;

        assert!(dashboard.load().await.is_err());
        let view = dashboard.view();
        assert!(view.error.as_deref().is_some_and(|e| e.contains("503")));
        assert_eq!(view.search_term, "person");
        assert_eq!(view.filter, FieldFilter::Name);

        source.set_users(users(13));
        dashboard.handle(Action::Retry).await;
        let view = dashboard.view();
        assert!(view.error.is_none());
        assert_eq!(view.filtered_count, 12);
        assert_eq!(view.page.current_page, 2);
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn clear_resets_term_filter_and_stats() {
        let persistence = Arc::new(MemoryStore::new());
        persist::write_value(&*persistence, keys::SEARCH_TERM, &"kurtis");
        let source = Arc::new(StaticRecordSource::new(users(8)));
        let mut dashboard = dashboard_with(source, persistence.clone());
        dashboard.load().await.expect("load");
        dashboard.handle(Action::SetFilter(FieldFilter::Email)).await;
        assert_eq!(dashboard.view().filtered_count, 0);

        dashboard.handle(Action::Clear).await;
        let view = dashboard.view();
        assert_eq!(view.search_term, "");
        assert_eq!(view.filter, FieldFilter::All);
        assert_eq!(view.filtered_count, 8);
        assert_eq!(view.stats.total_results, 8);
        assert_eq!(view.stats.search_time_ms, 0.0);
        assert_eq!(persistence.get_raw(keys::SEARCH_TERM).as_deref(), Some("\"\""));
    }

    #[tokio::test]
    async fn user_click_selects_and_back_deselects() {
        let source = Arc::new(StaticRecordSource::new(users(3)));
        let mut dashboard = dashboard_with(source, Arc::new(MemoryStore::new()));
        dashboard.load().await.expect("load");

        dashboard.handle(Action::UserClick(2)).await;
        assert_eq!(dashboard.view().selected.map(|u| u.id), Some(2));
        dashboard.handle(Action::Back).await;
        assert!(dashboard.view().selected.is_none());
        dashboard.handle(Action::UserClick(99)).await;
        assert!(dashboard.view().selected.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn external_changes_are_applied() {
        let persistence = Arc::new(MemoryStore::new());
        let source = Arc::new(StaticRecordSource::new(users(13)));
        let mut dashboard = dashboard_with(source, persistence.clone());
        dashboard.load().await.expect("load");
        let mut events = dashboard.storage_events();

        persistence.apply_external(keys::CURRENT_PAGE, Some("3".to_string()));
        let event = events.recv().await.expect("page event");
        dashboard.apply_storage_event(&event);
        assert_eq!(dashboard.view().page.current_page, 3);

        persistence.apply_external(keys::SEARCH_TERM, Some("\"kurtis\"".to_string()));
        let event = events.recv().await.expect("term event");
        dashboard.apply_storage_event(&event);
        assert_eq!(dashboard.view().search_term, "kurtis");

        let mut settled = dashboard.settled_updates();
        settled.changed().await.expect("settled");
        dashboard.refresh();
        assert_eq!(dashboard.view().filtered_count, 1);
    }
}
