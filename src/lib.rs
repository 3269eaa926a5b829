//! Filterable product list with URL-synced filters, a cached fetch hook and a
//! "load more" paginated list.
//!
//! The engine modules (`cache`, `fetch`, `pager`, `query`, `filter`,
//! `debounce`) are platform independent and driven by any
//! [`futures::task::LocalSpawn`]. The `browser` and `hooks` modules bind them
//! to `web_sys` and Yew.

use std::rc::Rc;

pub mod browser;
pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod hooks;
pub mod mock;
pub mod pager;
pub mod posts;
pub mod query;

/// Callback invoked with a controller's state after every change.
pub type Listener<S> = Rc<dyn Fn(&S)>;

pub use cache::{ResourceCache, ResourceKey};
pub use error::FetchError;
pub use fetch::{FetchController, FetchState, ResolutionPolicy, Subscription, Transport};
pub use filter::{FilterView, PriceBounds};
pub use pager::{Page, PageLoader, PageSource, PaginationState};
pub use query::{QueryPatch, QueryState, QueryStateRecord, QueryStore};
