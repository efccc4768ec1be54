// SPDX-License-Identifier: MIT OR Apache-2.0

//! Page boundaries, navigation and page-number markers.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ITEMS_PER_PAGE: usize = 6;

/// Pages shown on each side of the current page.
const MARKER_DELTA: usize = 2;

/// Derived boundaries for one page of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub current_page: usize,
    pub total_pages: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub items_on_page: usize,
}

impl PageWindow {
    /// Boundaries of `current_page` (1-based).
    ///
    /// `total_pages` is 0 for an empty set; clamping the page is the caller's
    /// job. Out-of-range pages produce an empty window at the end of the set.
    pub fn compute(total_items: usize, current_page: usize, items_per_page: usize) -> Self {
        let per_page = items_per_page.max(1);
        let total_pages = total_items.div_ceil(per_page);
        let start_index = current_page
            .saturating_sub(1)
            .saturating_mul(per_page)
            .min(total_items);
        let end_index = (start_index + per_page).min(total_items);
        Self {
            current_page,
            total_pages,
            start_index,
            end_index,
            has_next: current_page < total_pages,
            has_previous: current_page > 1,
            items_on_page: end_index - start_index,
        }
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let end = self.end_index.min(items.len());
        let start = self.start_index.min(end);
        &items[start..end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "page")]
pub enum PageMarker {
    Page(usize),
    Ellipsis,
}

/// Page numbers for a pager control.
///
/// First and last pages are always shown with a window of two pages around
/// `current`; larger gaps collapse into a single ellipsis on either side.
pub fn page_markers(current: usize, total_pages: usize) -> Vec<PageMarker> {
    if total_pages == 0 {
        return Vec::new();
    }

    let mut markers = Vec::new();
    if current > MARKER_DELTA + 2 {
        markers.push(PageMarker::Page(1));
        markers.push(PageMarker::Ellipsis);
    } else {
        markers.push(PageMarker::Page(1));
    }

    let low = current.saturating_sub(MARKER_DELTA).max(2);
    let high = (current + MARKER_DELTA).min(total_pages.saturating_sub(1));
    markers.extend((low..=high).map(PageMarker::Page));

    if current + MARKER_DELTA + 1 < total_pages {
        markers.push(PageMarker::Ellipsis);
        markers.push(PageMarker::Page(total_pages));
    } else if total_pages > 1 {
        markers.push(PageMarker::Page(total_pages));
    }

    markers
}

/// Stateful pager over a changing item count.
#[derive(Debug, Clone)]
pub struct Paginator {
    current_page: usize,
    items_per_page: usize,
    total_items: usize,
    reset_on_items_change: bool,
}

impl Paginator {
    pub fn new(items_per_page: usize) -> Self {
        Self {
            current_page: 1,
            items_per_page: items_per_page.max(1),
            total_items: 0,
            reset_on_items_change: true,
        }
    }

    /// Start from a restored page; it is reconciled on the next item count.
    pub fn with_page(mut self, page: usize) -> Self {
        self.current_page = page.max(1);
        self
    }

    pub fn reset_on_items_change(mut self, enabled: bool) -> Self {
        self.reset_on_items_change = enabled;
        self
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn total_items(&self) -> usize {
        self.total_items
    }

    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.items_per_page)
    }

    /// Record a new item count. When the set shrinks past the current
    /// page, the pager falls back to page 1.
    pub fn set_total_items(&mut self, total_items: usize) {
        self.total_items = total_items;
        if self.reset_on_items_change
            && self.current_page > 1
            && self.current_page > self.total_pages()
        {
            self.current_page = 1;
        }
    }

    pub fn view(&self) -> PageWindow {
        PageWindow::compute(self.total_items, self.current_page, self.items_per_page)
    }

    pub fn markers(&self) -> Vec<PageMarker> {
        page_markers(self.current_page, self.total_pages())
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        self.view().slice(items)
    }

    fn last_page(&self) -> usize {
        self.total_pages().max(1)
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.current_page = page.clamp(1, self.last_page());
    }

    pub fn go_to_next(&mut self) {
        if self.view().has_next {
            self.current_page += 1;
        }
    }

    pub fn go_to_previous(&mut self) {
        if self.view().has_previous {
            self.current_page -= 1;
        }
    }

    pub fn go_to_first(&mut self) {
        self.current_page = 1;
    }

    pub fn go_to_last(&mut self) {
        self.current_page = self.last_page();
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_ITEMS_PER_PAGE)
    }
}
