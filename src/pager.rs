//! "Load more" pagination over a paged data source.
//!
//! [`PageLoader`] requests one page at a time and appends each successful
//! page to its accumulated items. `current_page` only moves forward after a
//! success, so calling [`PageLoader::load_next`] after a failure asks for the
//! very same page again and no page is ever ingested twice.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::future::{AbortHandle, Abortable, Aborted, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::Listener;

/// One page as produced by a [`PageSource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<I> {
    pub items: Vec<I>,
    pub has_more: bool,
    pub next_page: Option<u32>,
}

/// Asynchronous provider of numbered pages (1-based).
pub trait PageSource<I> {
    fn fetch_page(&self, page: u32, page_size: u32) -> LocalBoxFuture<'static, Result<Page<I>, FetchError>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationState<I> {
    /// Every item received so far, in arrival order.
    pub items: Vec<I>,
    /// Page requested by the next `load_next`.
    pub current_page: u32,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<FetchError>,
}

impl<I> PaginationState<I> {
    fn initial() -> Self {
        Self {
            items: Vec::new(),
            current_page: 1,
            has_more: true,
            loading: false,
            error: None,
        }
    }
}

impl<I> Default for PaginationState<I> {
    fn default() -> Self {
        Self::initial()
    }
}

struct Shared<I> {
    state: PaginationState<I>,
    /// Bumped on reset; results from an older epoch are dropped.
    epoch: u64,
    in_flight: Option<AbortHandle>,
    listener: Option<Listener<PaginationState<I>>>,
}

/// Sequential pagination controller.
///
/// At most one request is in flight per loader. Dropping the loader aborts it.
pub struct PageLoader<I> {
    shared: Rc<RefCell<Shared<I>>>,
    source: Rc<dyn PageSource<I>>,
    spawner: Rc<dyn LocalSpawn>,
    page_size: u32,
}

impl<I: Clone + 'static> PageLoader<I> {
    /// Create a loader and immediately request the first page.
    pub fn new(
        source: impl PageSource<I> + 'static,
        spawner: impl LocalSpawn + 'static,
        page_size: u32,
    ) -> Self {
        Self::build(Rc::new(source), Rc::new(spawner), page_size, None)
    }

    /// Like [`PageLoader::new`], calling `listener` on every state change.
    pub fn with_listener(
        source: impl PageSource<I> + 'static,
        spawner: impl LocalSpawn + 'static,
        page_size: u32,
        listener: impl Fn(&PaginationState<I>) + 'static,
    ) -> Self {
        Self::build(Rc::new(source), Rc::new(spawner), page_size, Some(Rc::new(listener)))
    }

    fn build(
        source: Rc<dyn PageSource<I>>,
        spawner: Rc<dyn LocalSpawn>,
        page_size: u32,
        listener: Option<Listener<PaginationState<I>>>,
    ) -> Self {
        let loader = Self {
            shared: Rc::new(RefCell::new(Shared {
                state: PaginationState::initial(),
                epoch: 0,
                in_flight: None,
                listener,
            })),
            source,
            spawner,
            page_size,
        };
        loader.load_next();
        loader
    }

    pub fn state(&self) -> PaginationState<I> {
        self.shared.borrow().state.clone()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Request the next page. Returns `false` without doing anything while a
    /// request is already in flight or once the source is exhausted.
    pub fn load_next(&self) -> bool {
        let (page, epoch, registration) = {
            let mut shared = self.shared.borrow_mut();
            if shared.state.loading {
                debug!("pager: page {} already loading", shared.state.current_page);
                return false;
            }
            if !shared.state.has_more {
                debug!("pager: no more pages");
                return false;
            }
            shared.state.loading = true;
            shared.state.error = None;
            let (handle, registration) = AbortHandle::new_pair();
            shared.in_flight = Some(handle);
            (shared.state.current_page, shared.epoch, registration)
        };
        debug!("pager: requesting page {} (size {})", page, self.page_size);
        self.notify();

        let request = Abortable::new(self.source.fetch_page(page, self.page_size), registration);
        let shared = Rc::downgrade(&self.shared);
        let task = async move {
            let outcome = request.await;
            apply_page(&shared, epoch, page, outcome);
        };

        if let Err(err) = self.spawner.spawn_local(task) {
            warn!("pager: could not spawn request for page {}: {}", page, err);
            {
                let mut shared = self.shared.borrow_mut();
                shared.in_flight = None;
                shared.state.loading = false;
                shared.state.error = Some(FetchError::Network(err.to_string()));
            }
            self.notify();
        }
        true
    }

    /// Drop all accumulated items and start again from page 1.
    pub fn reset(&self) {
        {
            let mut shared = self.shared.borrow_mut();
            if let Some(handle) = shared.in_flight.take() {
                handle.abort();
            }
            shared.epoch += 1;
            shared.state = PaginationState::initial();
        }
        info!("pager: reset");
        self.load_next();
    }

    fn notify(&self) {
        let (state, listener) = {
            let shared = self.shared.borrow();
            (shared.state.clone(), shared.listener.clone())
        };
        if let Some(listener) = listener {
            listener(&state);
        }
    }
}

impl<I> Drop for PageLoader<I> {
    fn drop(&mut self) {
        if let Ok(mut shared) = self.shared.try_borrow_mut() {
            if let Some(handle) = shared.in_flight.take() {
                handle.abort();
            }
        }
    }
}

fn apply_page<I: Clone>(
    shared: &Weak<RefCell<Shared<I>>>,
    epoch: u64,
    page: u32,
    outcome: Result<Result<Page<I>, FetchError>, Aborted>,
) {
    let Some(shared) = shared.upgrade() else {
        return;
    };

    let (state, listener) = {
        let mut sh = shared.borrow_mut();
        if sh.epoch != epoch {
            debug!("pager: dropping page {} from before reset", page);
            return;
        }
        sh.in_flight = None;
        sh.state.loading = false;

        match outcome {
            Err(Aborted) => {
                debug!("pager: page {} aborted", page);
            }
            Ok(Err(err)) if err.is_cancelled() => {
                debug!("pager: page {} cancelled", page);
            }
            Ok(Ok(received)) => {
                info!(
                    "pager: page {} delivered {} items (more: {})",
                    page,
                    received.items.len(),
                    received.has_more
                );
                sh.state.items.extend(received.items);
                sh.state.has_more = received.has_more;
                if let Some(next) = received.next_page {
                    sh.state.current_page = next;
                }
                sh.state.error = None;
            }
            Ok(Err(err)) => {
                warn!("pager: page {} failed: {}", page, err);
                sh.state.error = Some(err);
            }
        }
        (sh.state.clone(), sh.listener.clone())
    };

    if let Some(listener) = listener {
        listener(&state);
    }
}
