//! Two-way binding between the filter record and a query string.
//!
//! The record is hydrated once from the persisted query string, field by
//! field, with defaults filling the gaps. Every update republishes the whole
//! record, replacing the stored string rather than appending history.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use url::form_urlencoded;

use crate::config::{ALL_CATEGORIES, DEFAULT_MAX_PRICE, DEFAULT_MIN_PRICE, DEFAULT_SEARCH};

pub const SEARCH_KEY: &str = "search";
pub const CATEGORY_KEY: &str = "category";
pub const MIN_KEY: &str = "min";
pub const MAX_KEY: &str = "max";

const KEYS: [&str; 4] = [SEARCH_KEY, CATEGORY_KEY, MIN_KEY, MAX_KEY];

#[derive(Debug, Clone, PartialEq)]
pub struct QueryStateRecord {
    pub search: String,
    pub category: String,
    pub min: f64,
    pub max: f64,
}

impl Default for QueryStateRecord {
    fn default() -> Self {
        Self {
            search: DEFAULT_SEARCH.to_string(),
            category: ALL_CATEGORIES.to_string(),
            min: DEFAULT_MIN_PRICE,
            max: DEFAULT_MAX_PRICE,
        }
    }
}

impl QueryStateRecord {
    pub fn apply(&mut self, patch: QueryPatch) {
        if let Some(search) = patch.search {
            self.search = search;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(min) = patch.min {
            self.min = min;
        }
        if let Some(max) = patch.max {
            self.max = max;
        }
    }

    /// The persisted value of each field, `None` when it should be omitted.
    fn persisted(&self) -> [(&'static str, Option<String>); 4] {
        let text = |value: &str| (!value.is_empty()).then(|| value.to_string());
        [
            (SEARCH_KEY, text(&self.search)),
            (CATEGORY_KEY, text(&self.category)),
            (MIN_KEY, Some(self.min.to_string())),
            (MAX_KEY, Some(self.max.to_string())),
        ]
    }
}

/// Partial update of a [`QueryStateRecord`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPatch {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl QueryPatch {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

/// Where the query string lives (the address bar, or memory in tests).
pub trait QueryStore {
    /// Current query string, with or without a leading `?`.
    fn load(&self) -> String;
    /// Replace the current query string (no leading `?`).
    fn replace(&self, query: &str);
}

/// In-memory [`QueryStore`]. Clones share the same string.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    query: Rc<RefCell<String>>,
}

impl MemoryStore {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            query: Rc::new(RefCell::new(initial.into())),
        }
    }

    pub fn query(&self) -> String {
        self.query.borrow().clone()
    }
}

impl QueryStore for MemoryStore {
    fn load(&self) -> String {
        self.query()
    }

    fn replace(&self, query: &str) {
        *self.query.borrow_mut() = query.to_string();
    }
}

fn pairs(query: &str) -> impl Iterator<Item = (Cow<'_, str>, Cow<'_, str>)> {
    form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Build a record from `query`, taking each missing or unreadable field from `defaults`.
pub fn decode(query: &str, defaults: &QueryStateRecord) -> QueryStateRecord {
    let first = |key: &str| {
        pairs(query)
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };

    QueryStateRecord {
        search: first(SEARCH_KEY).unwrap_or_else(|| defaults.search.clone()),
        category: first(CATEGORY_KEY).unwrap_or_else(|| defaults.category.clone()),
        min: first(MIN_KEY)
            .as_deref()
            .and_then(parse_number)
            .unwrap_or(defaults.min),
        max: first(MAX_KEY)
            .as_deref()
            .and_then(parse_number)
            .unwrap_or(defaults.max),
    }
}

/// Write `record` over `existing`, keeping unrelated keys where they were.
///
/// A field already present is updated in place; new fields are appended.
/// Empty text fields are removed entirely.
pub fn encode(record: &QueryStateRecord, existing: &str) -> String {
    let mut fields = record.persisted();
    let mut out = form_urlencoded::Serializer::new(String::new());

    for (key, value) in pairs(existing) {
        match fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => {
                if let Some(value) = slot.take() {
                    out.append_pair(&key, &value);
                }
            }
            None if KEYS.iter().any(|k| *k == key) => {}
            None => {
                out.append_pair(&key, &value);
            }
        }
    }
    for (key, value) in fields {
        if let Some(value) = value {
            out.append_pair(key, &value);
        }
    }
    out.finish()
}

/// Filter record bound to a [`QueryStore`].
pub struct QueryState<S: QueryStore> {
    store: S,
    record: QueryStateRecord,
}

impl<S: QueryStore> QueryState<S> {
    /// Read the store once, falling back to `defaults` field by field.
    pub fn hydrate(store: S, defaults: &QueryStateRecord) -> Self {
        let record = decode(&store.load(), defaults);
        debug!("query: hydrated {:?}", record);
        Self { store, record }
    }

    pub fn read(&self) -> &QueryStateRecord {
        &self.record
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merge `patch` and republish.
    pub fn update(&mut self, patch: QueryPatch) -> &QueryStateRecord {
        self.record.apply(patch);
        self.publish();
        &self.record
    }

    fn publish(&self) {
        let query = encode(&self.record, &self.store.load());
        debug!("query: publishing ?{}", query);
        self.store.replace(&query);
    }
}
