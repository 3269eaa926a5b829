//! Cached resource fetching with cancellation and forced refresh.
//!
//! A [`FetchController`] bundles a transport, the shared [`ResourceCache`] and
//! a task spawner. Calling [`FetchController::load`] opens a [`Subscription`]
//! for one resource key:
//!
//! 1. A cached key starts ready (`loading == false`) and issues no request.
//! 2. An uncached key starts loading and issues a request right away.
//! 3. Success replaces the cache entry and the state's `data`.
//! 4. Failure records the error but keeps the previous `data` (stale-on-error).
//!
//! Dropping the subscription, or moving it to another key, aborts every
//! outstanding request. An aborted request never touches the state or cache.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use futures::future::{AbortHandle, Abortable, Aborted, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use log::{debug, info, warn};
use serde_json::Value;

use crate::cache::{ResourceCache, ResourceKey};
use crate::error::FetchError;
use crate::Listener;

/// Performs the actual network call for a resource key.
///
/// Returned futures are dropped when the caller cancels, so implementations
/// should release their underlying request on drop. A transport may also
/// report [`FetchError::Cancelled`] itself; it is treated the same way.
pub trait Transport {
    fn fetch(&self, key: &str) -> LocalBoxFuture<'static, Result<Value, FetchError>>;
}

impl<F> Transport for F
where
    F: Fn(&str) -> LocalBoxFuture<'static, Result<Value, FetchError>>,
{
    fn fetch(&self, key: &str) -> LocalBoxFuture<'static, Result<Value, FetchError>> {
        self(key)
    }
}

/// Observable state of one subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchState {
    pub data: Option<Value>,
    pub error: Option<FetchError>,
    pub loading: bool,
}

impl FetchState {
    fn ready(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
            loading: false,
        }
    }

    fn pending() -> Self {
        Self {
            data: None,
            error: None,
            loading: true,
        }
    }
}

/// How overlapping requests for the same subscription are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Every request that settles is applied; the last one to settle wins.
    #[default]
    LastWriterWins,
    /// Only the most recently issued request may be applied. Older requests
    /// that settle later are dropped without touching state or cache.
    LatestRequestWins,
}

/// Factory for [`Subscription`]s sharing one transport, cache and spawner.
#[derive(Clone)]
pub struct FetchController {
    transport: Rc<dyn Transport>,
    cache: ResourceCache,
    spawner: Rc<dyn LocalSpawn>,
    policy: ResolutionPolicy,
}

impl FetchController {
    pub fn new(
        transport: impl Transport + 'static,
        cache: ResourceCache,
        spawner: impl LocalSpawn + 'static,
    ) -> Self {
        Self {
            transport: Rc::new(transport),
            cache,
            spawner: Rc::new(spawner),
            policy: ResolutionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// The state a fresh subscription to `key` would start with.
    pub fn initial_state(&self, key: &str) -> FetchState {
        if key.is_empty() {
            return FetchState::default();
        }
        match self.cache.get(key) {
            Some(value) => FetchState::ready(value),
            None => FetchState::pending(),
        }
    }

    /// Subscribe to `key`. An empty key stays idle until [`Subscription::set_key`].
    pub fn load(&self, key: &str) -> Subscription {
        self.subscribe(key, None)
    }

    /// Like [`FetchController::load`], calling `listener` on every state change.
    pub fn load_with(&self, key: &str, listener: impl Fn(&FetchState) + 'static) -> Subscription {
        self.subscribe(key, Some(Rc::new(listener)))
    }

    fn subscribe(&self, key: &str, listener: Option<Listener<FetchState>>) -> Subscription {
        let subscription = Subscription {
            lifecycle: Rc::new(RefCell::new(Lifecycle {
                key: key.to_owned(),
                state: FetchState::default(),
                issued: 0,
                in_flight: Vec::new(),
                listener,
            })),
            controller: self.clone(),
        };
        subscription.start();
        subscription
    }
}

struct Lifecycle {
    key: ResourceKey,
    state: FetchState,
    /// Sequence number of the most recently issued request.
    issued: u64,
    in_flight: Vec<(u64, AbortHandle)>,
    listener: Option<Listener<FetchState>>,
}

impl Lifecycle {
    fn cancel_all(&mut self) {
        for (seq, handle) in self.in_flight.drain(..) {
            debug!("fetch: cancelling request #{} for {}", seq, self.key);
            handle.abort();
        }
    }
}

/// A live binding between one consumer and one resource key.
///
/// Releasing the handle cancels every request it still has outstanding.
pub struct Subscription {
    lifecycle: Rc<RefCell<Lifecycle>>,
    controller: FetchController,
}

impl Subscription {
    pub fn state(&self) -> FetchState {
        self.lifecycle.borrow().state.clone()
    }

    pub fn key(&self) -> ResourceKey {
        self.lifecycle.borrow().key.clone()
    }

    /// Number of requests issued by this subscription that have not settled.
    pub fn in_flight(&self) -> usize {
        self.lifecycle.borrow().in_flight.len()
    }

    /// Fetch the current key again, ignoring the cache.
    ///
    /// Concurrent retries are not coalesced; each one issues its own request.
    pub fn retry(&self) {
        let key = {
            let mut lifecycle = self.lifecycle.borrow_mut();
            if lifecycle.key.is_empty() {
                return;
            }
            lifecycle.state.loading = true;
            lifecycle.state.error = None;
            lifecycle.key.clone()
        };
        info!("fetch: retrying {}", key);
        self.notify();
        self.issue(key);
    }

    /// Tear down the current lifecycle and start over for `key`.
    pub fn set_key(&self, key: &str) {
        {
            let mut lifecycle = self.lifecycle.borrow_mut();
            if lifecycle.key == key {
                return;
            }
            lifecycle.cancel_all();
            lifecycle.key = key.to_owned();
        }
        self.start();
    }

    fn start(&self) {
        let key = self.key();
        let state = self.controller.initial_state(&key);
        let needs_fetch = state.loading;
        if !key.is_empty() {
            if needs_fetch {
                debug!("fetch: cache miss for {}", key);
            } else {
                debug!("fetch: cache hit for {}", key);
            }
        }
        self.lifecycle.borrow_mut().state = state;
        self.notify();
        if needs_fetch {
            self.issue(key);
        }
    }

    fn issue(&self, key: ResourceKey) {
        let (handle, registration) = AbortHandle::new_pair();
        let seq = {
            let mut lifecycle = self.lifecycle.borrow_mut();
            lifecycle.issued += 1;
            let seq = lifecycle.issued;
            lifecycle.in_flight.push((seq, handle));
            seq
        };
        debug!("fetch: issuing request #{} for {}", seq, key);

        let request = Abortable::new(self.controller.transport.fetch(&key), registration);
        let lifecycle = Rc::downgrade(&self.lifecycle);
        let cache = self.controller.cache.clone();
        let policy = self.controller.policy;
        let task_key = key.clone();
        let task = async move {
            let outcome = request.await;
            settle(&lifecycle, &cache, policy, seq, &task_key, outcome);
        };

        if let Err(err) = self.controller.spawner.spawn_local(task) {
            warn!("fetch: could not spawn request for {}: {}", key, err);
            {
                let mut lifecycle = self.lifecycle.borrow_mut();
                lifecycle.in_flight.retain(|(s, _)| *s != seq);
                lifecycle.state.error = Some(FetchError::Network(err.to_string()));
                lifecycle.state.loading = false;
            }
            self.notify();
        }
    }

    fn notify(&self) {
        let (state, listener) = {
            let lifecycle = self.lifecycle.borrow();
            (lifecycle.state.clone(), lifecycle.listener.clone())
        };
        if let Some(listener) = listener {
            listener(&state);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut lifecycle) = self.lifecycle.try_borrow_mut() {
            lifecycle.cancel_all();
        }
    }
}

fn settle(
    lifecycle: &Weak<RefCell<Lifecycle>>,
    cache: &ResourceCache,
    policy: ResolutionPolicy,
    seq: u64,
    key: &str,
    outcome: Result<Result<Value, FetchError>, Aborted>,
) {
    let Some(lifecycle) = lifecycle.upgrade() else {
        debug!("fetch: request #{} for {} outlived its subscription", seq, key);
        return;
    };

    let (state, listener) = {
        let mut lc = lifecycle.borrow_mut();
        lc.in_flight.retain(|(s, _)| *s != seq);

        let result = match outcome {
            Err(Aborted) => None,
            Ok(Err(err)) if err.is_cancelled() => None,
            Ok(result) => Some(result),
        };
        if lc.key != key {
            debug!("fetch: request #{} for {} lost its key", seq, key);
            return;
        }
        let Some(result) = result else {
            debug!("fetch: request #{} for {} was cancelled", seq, key);
            // Nothing left to wait for: stop loading, keep data and error.
            if !lc.in_flight.is_empty() || !lc.state.loading {
                return;
            }
            lc.state.loading = false;
            let (state, listener) = (lc.state.clone(), lc.listener.clone());
            drop(lc);
            if let Some(listener) = listener {
                listener(&state);
            }
            return;
        };
        if policy == ResolutionPolicy::LatestRequestWins && seq != lc.issued {
            debug!("fetch: request #{} for {} superseded by #{}", seq, key, lc.issued);
            return;
        }

        match result {
            Ok(value) => {
                info!("fetch: loaded {}", key);
                cache.replace(key, value.clone());
                lc.state = FetchState::ready(value);
            }
            Err(err) => {
                warn!("fetch: request for {} failed: {}", key, err);
                lc.state.error = Some(err);
                lc.state.loading = false;
            }
        }
        (lc.state.clone(), lc.listener.clone())
    };

    if let Some(listener) = listener {
        listener(&state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;

    type Reply = oneshot::Sender<Result<Value, FetchError>>;

    /// Transport whose requests stay pending until the test answers them.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        calls: Rc<RefCell<Vec<String>>>,
        replies: Rc<RefCell<Vec<Option<Reply>>>>,
    }

    impl ScriptedTransport {
        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        /// Answer the `n`th request issued (0-based). Returns false if nobody listened.
        fn answer(&self, n: usize, result: Result<Value, FetchError>) -> bool {
            let reply = self.replies.borrow_mut()[n].take().expect("request already answered");
            reply.send(result).is_ok()
        }
    }

    impl Transport for ScriptedTransport {
        fn fetch(&self, key: &str) -> LocalBoxFuture<'static, Result<Value, FetchError>> {
            self.calls.borrow_mut().push(key.to_owned());
            let (tx, rx) = oneshot::channel();
            self.replies.borrow_mut().push(Some(tx));
            async move { rx.await.unwrap_or(Err(FetchError::Cancelled)) }.boxed_local()
        }
    }

    fn setup(policy: ResolutionPolicy) -> (LocalPool, ScriptedTransport, FetchController) {
        let pool = LocalPool::new();
        let transport = ScriptedTransport::default();
        let controller = FetchController::new(transport.clone(), ResourceCache::new(), pool.spawner())
            .with_policy(policy);
        (pool, transport, controller)
    }

    #[test]
    fn cached_key_is_ready_without_network() {
        let (_pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        controller.cache().replace("/products.json", json!([1, 2, 3]));

        let sub = controller.load("/products.json");

        assert_eq!(
            sub.state(),
            FetchState {
                data: Some(json!([1, 2, 3])),
                error: None,
                loading: false
            }
        );
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn miss_fetches_then_later_subscribers_hit_cache() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);

        let first = controller.load("/a");
        assert_eq!(first.state(), FetchState::pending());
        assert_eq!(transport.calls(), vec!["/a"]);

        assert!(transport.answer(0, Ok(json!({"ok": true}))));
        pool.run_until_stalled();

        assert_eq!(first.state(), FetchState::ready(json!({"ok": true})));
        assert_eq!(controller.cache().get("/a"), Some(json!({"ok": true})));

        let second = controller.load("/a");
        assert!(!second.state().loading);
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn failure_keeps_previous_data() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        let sub = controller.load("/a");
        transport.answer(0, Ok(json!("v1")));
        pool.run_until_stalled();

        sub.retry();
        assert!(sub.state().loading);
        transport.answer(1, Err(FetchError::Http { status: 500 }));
        pool.run_until_stalled();

        let state = sub.state();
        assert_eq!(state.data, Some(json!("v1")));
        assert_eq!(state.error, Some(FetchError::Http { status: 500 }));
        assert!(!state.loading);
    }

    #[test]
    fn retry_bypasses_cache_and_refreshes_shared_entry() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        controller.cache().replace("/a", json!("stale"));
        let sub = controller.load("/a");
        assert!(transport.calls().is_empty());

        sub.retry();
        assert_eq!(transport.calls().len(), 1);
        transport.answer(0, Ok(json!("fresh")));
        pool.run_until_stalled();

        assert_eq!(sub.state().data, Some(json!("fresh")));
        assert_eq!(controller.cache().get("/a"), Some(json!("fresh")));
        assert!(!controller.load("/a").state().loading);
    }

    #[test]
    fn retry_after_failure_clears_error_while_loading() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        let sub = controller.load("/a");
        transport.answer(0, Err(FetchError::Network("offline".into())));
        pool.run_until_stalled();
        assert!(sub.state().error.is_some());

        sub.retry();
        assert_eq!(sub.state().error, None);
        assert!(sub.state().loading);
    }

    #[test]
    fn dropping_subscription_discards_result() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        let notified = Rc::new(Cell::new(0));
        let counter = Rc::clone(&notified);
        let sub = controller.load_with("/a", move |_| counter.set(counter.get() + 1));
        let before = notified.get();

        drop(sub);
        pool.run_until_stalled();
        assert!(!transport.answer(0, Ok(json!("late"))));
        pool.run_until_stalled();

        assert!(controller.cache().is_empty());
        assert_eq!(notified.get(), before);
    }

    #[test]
    fn changing_key_cancels_the_old_request() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        let sub = controller.load("/a");
        sub.set_key("/b");
        assert_eq!(transport.calls(), vec!["/a", "/b"]);
        assert_eq!(sub.in_flight(), 1);

        pool.run_until_stalled();
        assert!(!transport.answer(0, Ok(json!("a"))));
        pool.run_until_stalled();
        assert_eq!(sub.state(), FetchState::pending());
        assert!(controller.cache().is_empty());

        transport.answer(1, Ok(json!("b")));
        pool.run_until_stalled();

        assert_eq!(sub.state(), FetchState::ready(json!("b")));
        assert!(!controller.cache().contains("/a"));
    }

    #[test]
    fn setting_the_same_key_is_a_no_op() {
        let (_pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        let sub = controller.load("/a");
        sub.set_key("/a");
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn empty_key_stays_idle() {
        let (_pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        let sub = controller.load("");
        sub.retry();
        assert_eq!(sub.state(), FetchState::default());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn transport_reported_cancellation_is_not_an_error() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        let sub = controller.load("/a");
        transport.answer(0, Err(FetchError::Cancelled));
        pool.run_until_stalled();

        assert_eq!(sub.state(), FetchState::default());
        assert!(controller.cache().is_empty());
        assert_eq!(sub.in_flight(), 0);
    }

    #[test]
    fn cancelled_retry_keeps_data_and_stops_loading() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sub = {
            let seen = seen.clone();
            controller.load_with("/a", move |s: &FetchState| seen.borrow_mut().push(s.loading))
        };
        transport.answer(0, Ok(json!("a")));
        pool.run_until_stalled();

        sub.retry();
        sub.retry();
        transport.answer(1, Err(FetchError::Cancelled));
        pool.run_until_stalled();
        assert!(sub.state().loading);

        transport.answer(2, Err(FetchError::Cancelled));
        pool.run_until_stalled();
        assert_eq!(sub.state(), FetchState::ready(json!("a")));
        assert_eq!(seen.borrow().last(), Some(&false));
    }

    #[test]
    fn overlapping_retries_apply_the_last_to_settle() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LastWriterWins);
        controller.cache().replace("/a", json!(0));
        let sub = controller.load("/a");
        sub.retry();
        sub.retry();
        assert_eq!(transport.calls().len(), 2);

        transport.answer(1, Ok(json!("second")));
        pool.run_until_stalled();
        transport.answer(0, Ok(json!("first")));
        pool.run_until_stalled();

        assert_eq!(sub.state().data, Some(json!("first")));
        assert_eq!(controller.cache().get("/a"), Some(json!("first")));
    }

    #[test]
    fn latest_request_policy_drops_superseded_results() {
        let (mut pool, transport, controller) = setup(ResolutionPolicy::LatestRequestWins);
        controller.cache().replace("/a", json!(0));
        let sub = controller.load("/a");
        sub.retry();
        sub.retry();

        transport.answer(1, Ok(json!("second")));
        pool.run_until_stalled();
        transport.answer(0, Ok(json!("first")));
        pool.run_until_stalled();

        assert_eq!(sub.state().data, Some(json!("second")));
        assert_eq!(controller.cache().get("/a"), Some(json!("second")));
    }

    #[test]
    fn closures_work_as_transports() {
        let mut pool = LocalPool::new();
        let controller = FetchController::new(
            |key: &str| {
                let echo = json!({ "key": key });
                async move { Ok(echo) }.boxed_local()
            },
            ResourceCache::new(),
            pool.spawner(),
        );
        let sub = controller.load("/echo");
        pool.run_until_stalled();
        assert_eq!(sub.state().data, Some(json!({"key": "/echo"})));
    }
}
