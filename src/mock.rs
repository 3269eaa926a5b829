//! A tiny mock API that returns paginated data with a delay and occasional errors.

use std::cell::RefCell;
use std::ops::RangeInclusive;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{
    MOCK_FAILURE_MESSAGE, MOCK_FAILURE_RATE, MOCK_ITEM_COUNT, MOCK_MAX_LATENCY_MS, MOCK_MIN_LATENCY_MS,
};
use crate::error::FetchError;
use crate::pager::{Page, PageSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockItem {
    pub id: u32,
    pub title: String,
}

/// Async sleep used to simulate latency, in milliseconds.
pub type Sleep = Rc<dyn Fn(u32) -> LocalBoxFuture<'static, ()>>;

pub fn mock_items(count: u32) -> Vec<MockItem> {
    (1..=count)
        .map(|id| MockItem {
            id,
            title: format!("Mock Item #{}", id),
        })
        .collect()
}

/// Slice page `page` (1-based) of `page_size` items out of `items`.
pub fn paginate<I: Clone>(items: &[I], page: u32, page_size: u32) -> Page<I> {
    let start = (page.saturating_sub(1) as usize).saturating_mul(page_size as usize);
    let end = start.saturating_add(page_size as usize);
    let slice = items
        .get(start.min(items.len())..end.min(items.len()))
        .unwrap_or_default()
        .to_vec();
    let has_more = end < items.len();
    Page {
        items: slice,
        has_more,
        next_page: has_more.then_some(page + 1),
    }
}

/// In-memory [`PageSource`] with optional latency and random failures.
///
/// Each request rolls its delay and failure at call time.
pub struct MockApi {
    items: Rc<Vec<MockItem>>,
    failure_rate: f64,
    latency: RangeInclusive<u32>,
    sleep: Option<Sleep>,
    rng: RefCell<StdRng>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockApi {
    /// The standard dataset, answering instantly and never failing.
    pub fn new() -> Self {
        Self {
            items: Rc::new(mock_items(MOCK_ITEM_COUNT)),
            failure_rate: 0.0,
            latency: 0..=0,
            sleep: None,
            rng: RefCell::new(StdRng::from_os_rng()),
        }
    }

    /// The standard dataset with the configured latency and failure rate.
    pub fn simulated(sleep: Sleep) -> Self {
        Self::new()
            .with_latency(MOCK_MIN_LATENCY_MS, MOCK_MAX_LATENCY_MS, sleep)
            .with_failure_rate(MOCK_FAILURE_RATE)
    }

    /// Probability in `[0, 1]` that a request fails; out-of-range values are clamped.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self
    }

    pub fn with_latency(mut self, min_ms: u32, max_ms: u32, sleep: Sleep) -> Self {
        self.latency = min_ms.min(max_ms)..=min_ms.max(max_ms);
        self.sleep = Some(sleep);
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.borrow_mut() = StdRng::seed_from_u64(seed);
        self
    }
}

impl PageSource<MockItem> for MockApi {
    fn fetch_page(&self, page: u32, page_size: u32) -> LocalBoxFuture<'static, Result<Page<MockItem>, FetchError>> {
        let (delay, fail) = {
            let mut rng = self.rng.borrow_mut();
            (
                rng.random_range(self.latency.clone()),
                rng.random_bool(self.failure_rate),
            )
        };
        let result = if fail {
            Err(FetchError::Network(MOCK_FAILURE_MESSAGE.to_string()))
        } else {
            Ok(paginate(&self.items, page, page_size))
        };
        let sleep = self.sleep.clone();

        async move {
            if let Some(sleep) = sleep {
                sleep(delay).await;
            }
            result
        }
        .boxed_local()
    }
}
