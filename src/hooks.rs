use std::cell::RefCell;
use std::rc::Rc;

use yew::prelude::*;

use crate::browser::{GlooTimer, HttpTransport, LocationStore, WasmSpawner};
use crate::cache::ResourceCache;
use crate::debounce::Debouncer;
use crate::fetch::{FetchController, FetchState, Subscription};
use crate::pager::{PageLoader, PageSource, PaginationState};
use crate::query::{QueryPatch, QueryState, QueryStateRecord};

/// Holds the state and retry callback of a cached fetch.
#[derive(Clone, PartialEq)]
pub struct UseFetchHandle {
    /// Latest state of the subscription.
    pub state: FetchState,
    /// Re-fetch the current key, ignoring the cache.
    pub retry: Callback<()>,
}

/// Fetch `key` through the shared cache, refetching whenever `key` changes.
///
/// The subscription is released when the key changes or the component
/// unmounts, which cancels any request still in flight.
#[hook]
pub fn use_fetch(key: String) -> UseFetchHandle {
    let controller = use_memo((), |_| {
        FetchController::new(HttpTransport, ResourceCache::shared(), WasmSpawner)
    });
    // A cached key is ready on the very first render.
    let state = {
        let controller = controller.clone();
        let key = key.clone();
        use_state(move || controller.initial_state(&key))
    };
    let subscription: Rc<RefCell<Option<Subscription>>> = use_mut_ref(|| None);

    {
        let controller = controller.clone();
        let setter = state.setter();
        let subscription = subscription.clone();
        use_effect_with(key, move |key| {
            let sub = controller.load_with(key, move |s: &FetchState| setter.set(s.clone()));
            *subscription.borrow_mut() = Some(sub);
            move || {
                subscription.borrow_mut().take();
            }
        });
    }

    let retry = {
        let subscription = subscription.clone();
        Callback::from(move |_: ()| {
            if let Some(sub) = subscription.borrow().as_ref() {
                sub.retry();
            }
        })
    };

    UseFetchHandle {
        state: (*state).clone(),
        retry,
    }
}

/// Holds the filter record and its update callback.
#[derive(Clone, PartialEq)]
pub struct UseQueryStateHandle {
    pub record: QueryStateRecord,
    /// Merge a patch and rewrite the address bar.
    pub update: Callback<QueryPatch>,
}

/// Filter record hydrated from, and written back to, the address bar.
#[hook]
pub fn use_query_state(defaults: QueryStateRecord) -> UseQueryStateHandle {
    let binding = use_mut_ref(move || QueryState::hydrate(LocationStore, &defaults));
    let record = {
        let binding = binding.clone();
        use_state(move || binding.borrow().read().clone())
    };

    let update = {
        let binding = binding.clone();
        let setter = record.setter();
        Callback::from(move |patch: QueryPatch| {
            let next = binding.borrow_mut().update(patch).clone();
            setter.set(next);
        })
    };

    UseQueryStateHandle {
        record: (*record).clone(),
        update,
    }
}

/// Wrap `callback` so only the last call within `delay_ms` reaches it.
#[hook]
pub fn use_debounced<T: 'static>(delay_ms: u32, callback: Callback<T>) -> Callback<T> {
    let debouncer = use_memo(delay_ms, move |delay| {
        Debouncer::new(GlooTimer, *delay, move |value: T| callback.emit(value))
    });
    Callback::from(move |value: T| debouncer.call(value))
}

/// Holds the accumulated pages and the controls of a paginated list.
#[derive(Clone, PartialEq)]
pub struct UsePaginatedHandle<I: 'static> {
    pub state: PaginationState<I>,
    pub load_more: Callback<()>,
    pub reset: Callback<()>,
}

/// Page through the source built by `make_source`, starting on mount.
#[hook]
pub fn use_paginated<I, S, F>(page_size: u32, make_source: F) -> UsePaginatedHandle<I>
where
    I: Clone + PartialEq + 'static,
    S: PageSource<I> + 'static,
    F: FnOnce() -> S + 'static,
{
    let state = use_state(PaginationState::<I>::default);
    let loader: Rc<RefCell<Option<PageLoader<I>>>> = use_mut_ref(|| None);

    {
        let loader = loader.clone();
        let setter = state.setter();
        use_effect_with(page_size, move |size| {
            let created = PageLoader::with_listener(make_source(), WasmSpawner, *size, move |s| {
                setter.set(s.clone())
            });
            *loader.borrow_mut() = Some(created);
            move || {
                loader.borrow_mut().take();
            }
        });
    }

    let load_more = {
        let loader = loader.clone();
        Callback::from(move |_: ()| {
            if let Some(loader) = loader.borrow().as_ref() {
                loader.load_next();
            }
        })
    };
    let reset = {
        let loader = loader.clone();
        Callback::from(move |_: ()| {
            if let Some(loader) = loader.borrow().as_ref() {
                loader.reset();
            }
        })
    };

    UsePaginatedHandle {
        state: (*state).clone(),
        load_more,
        reset,
    }
}
