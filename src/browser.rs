//! Browser implementations of the engine's seams.
//!
//! These call into `web_sys` and only do useful work inside a browser.

use futures::future::{LocalBoxFuture, LocalFutureObj};
use futures::task::{LocalSpawn, SpawnError};
use futures::FutureExt;
use gloo_timers::callback::Timeout;
use gloo_timers::future::TimeoutFuture;
use log::warn;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, DomException, RequestInit, Response};

use crate::debounce::Timer;
use crate::error::FetchError;
use crate::fetch::Transport;
use crate::mock::Sleep;
use crate::query::QueryStore;

/// Spawns onto the browser's microtask queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct WasmSpawner;

impl LocalSpawn for WasmSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}

/// `setTimeout`-backed [`Timer`]; dropping the `Timeout` clears it.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooTimer;

impl Timer for GlooTimer {
    type Handle = Timeout;

    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Timeout {
        Timeout::new(delay_ms, callback)
    }
}

/// Latency simulation for the mock API.
pub fn gloo_sleep() -> Sleep {
    std::rc::Rc::new(|ms: u32| TimeoutFuture::new(ms).boxed_local())
}

/// Aborts the underlying `fetch` when the request future is dropped.
struct AbortOnDrop(AbortController);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| err.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{:?}", err))
}

fn is_abort(err: &JsValue) -> bool {
    err.dyn_ref::<DomException>()
        .is_some_and(|e| e.name() == "AbortError")
}

fn network_error(err: JsValue) -> FetchError {
    if is_abort(&err) {
        FetchError::Cancelled
    } else {
        FetchError::Network(describe(&err))
    }
}

/// `window.fetch` transport decoding JSON bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransport;

impl HttpTransport {
    async fn get(url: String) -> Result<Value, FetchError> {
        let controller = AbortController::new().map_err(network_error)?;
        let init = RequestInit::new();
        init.set_signal(Some(&controller.signal()));
        let _guard = AbortOnDrop(controller);

        let promise = gloo_utils::window().fetch_with_str_and_init(&url, &init);
        let response: Response = JsFuture::from(promise)
            .await
            .map_err(network_error)?
            .dyn_into()
            .map_err(|v| FetchError::Network(describe(&v)))?;

        if !response.ok() {
            return Err(FetchError::Http {
                status: response.status(),
            });
        }

        let body = response.json().map_err(|e| FetchError::Decode(describe(&e)))?;
        let json = JsFuture::from(body).await.map_err(|e| {
            if is_abort(&e) {
                FetchError::Cancelled
            } else {
                FetchError::Decode(describe(&e))
            }
        })?;
        serde_wasm_bindgen::from_value(json).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, key: &str) -> LocalBoxFuture<'static, Result<Value, FetchError>> {
        Self::get(key.to_owned()).boxed_local()
    }
}

/// The address bar's query string, rewritten with `history.replaceState`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationStore;

impl QueryStore for LocationStore {
    fn load(&self) -> String {
        gloo_utils::window().location().search().unwrap_or_default()
    }

    fn replace(&self, query: &str) {
        let window = gloo_utils::window();
        let path = window.location().pathname().unwrap_or_default();
        let url = format!("{}?{}", path, query);
        let result = window
            .history()
            .and_then(|history| history.replace_state_with_url(&JsValue::NULL, "", Some(&url)));
        if let Err(err) = result {
            warn!("query: could not replace history entry: {}", describe(&err));
        }
    }
}
