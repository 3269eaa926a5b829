//! Derived product view: visible subset, price bounds and categories.
//!
//! The dataset is treated as opaque JSON. An item missing a field (or holding
//! the wrong type) simply fails the predicate that needs it.

use log::debug;
use serde_json::Value;

use crate::config::{ALL_CATEGORIES, DEFAULT_MAX_PRICE, DEFAULT_MIN_PRICE};
use crate::query::QueryStateRecord;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_PRICE,
            max: DEFAULT_MAX_PRICE,
        }
    }
}

fn price(item: &Value) -> Option<f64> {
    item.get("price").and_then(Value::as_f64)
}

fn text<'a>(item: &'a Value, field: &str) -> Option<&'a str> {
    item.get(field).and_then(Value::as_str)
}

/// Floor of the lowest and ceiling of the highest price in `dataset`.
pub fn price_bounds(dataset: &[Value]) -> PriceBounds {
    let extrema = dataset
        .iter()
        .filter_map(price)
        .fold(None, |acc: Option<(f64, f64)>, p| match acc {
            Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
            None => Some((p, p)),
        });
    match extrema {
        Some((lo, hi)) => PriceBounds {
            min: lo.floor(),
            max: hi.ceil(),
        },
        None => PriceBounds::default(),
    }
}

/// `"All"` followed by every distinct category in first-seen order.
pub fn categories(dataset: &[Value]) -> Vec<String> {
    let mut out = vec![ALL_CATEGORIES.to_string()];
    for category in dataset.iter().filter_map(|item| text(item, "category")) {
        if !out.iter().any(|c| c == category) {
            out.push(category.to_string());
        }
    }
    out
}

fn matches_with(item: &Value, needle: &str, query: &QueryStateRecord) -> bool {
    let by_name = needle.is_empty()
        || text(item, "name").is_some_and(|name| name.to_lowercase().contains(needle));
    let by_category =
        query.category == ALL_CATEGORIES || text(item, "category") == Some(query.category.as_str());
    let by_price = price(item).is_some_and(|p| query.min <= p && p <= query.max);
    by_name && by_category && by_price
}

/// Items of `dataset` matching `query`, in dataset order.
pub fn filter<'a>(dataset: &'a [Value], query: &QueryStateRecord) -> Vec<&'a Value> {
    let needle = query.search.trim().to_lowercase();
    dataset
        .iter()
        .filter(|item| matches_with(item, &needle, query))
        .collect()
}

/// Clamp `query`'s range into `bounds`, keeping `min <= max`.
pub fn normalize(query: &QueryStateRecord, bounds: PriceBounds) -> QueryStateRecord {
    let clamp = |v: f64| bounds.min.max(v.min(bounds.max));
    let (mut min, mut max) = (clamp(query.min), clamp(query.max));
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }
    if min != query.min || max != query.max {
        debug!(
            "filter: range {}..{} clamped to {}..{}",
            query.min, query.max, min, max
        );
    }
    QueryStateRecord {
        min,
        max,
        ..query.clone()
    }
}

/// Everything the product list renders, derived from dataset and query.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterView<'a> {
    pub visible: Vec<&'a Value>,
    pub total: usize,
    pub bounds: PriceBounds,
    pub categories: Vec<String>,
    /// The query after clamping to `bounds`; equal to the input when nothing moved.
    pub query: QueryStateRecord,
}

/// Recompute bounds first, clamp the query to them, then filter.
pub fn derive<'a>(dataset: &'a [Value], query: &QueryStateRecord) -> FilterView<'a> {
    let bounds = price_bounds(dataset);
    let query = normalize(query, bounds);
    FilterView {
        visible: filter(dataset, &query),
        total: dataset.len(),
        bounds,
        categories: categories(dataset),
        query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn products() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Monitor", "category": "Electronics", "price": 199.99}),
            json!({"id": 2, "name": "Desk", "category": "Furniture", "price": 89.5}),
        ]
    }

    fn query(search: &str, category: &str, min: f64, max: f64) -> QueryStateRecord {
        QueryStateRecord {
            search: search.into(),
            category: category.into(),
            min,
            max,
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let data = products();
        let visible = filter(&data, &query("mon", "All", 0.0, 1000.0));
        assert_eq!(visible, vec![&data[0]]);
    }

    #[test]
    fn search_term_is_trimmed() {
        let data = products();
        assert_eq!(filter(&data, &query("  DESK ", "All", 0.0, 1000.0)), vec![&data[1]]);
    }

    #[test]
    fn open_query_returns_everything_in_order() {
        let data = products();
        let visible = filter(&data, &query("", "All", f64::NEG_INFINITY, f64::INFINITY));
        assert_eq!(visible, data.iter().collect::<Vec<_>>());
    }

    #[test]
    fn category_must_match_exactly() {
        let data = products();
        assert_eq!(filter(&data, &query("", "Furniture", 0.0, 1000.0)), vec![&data[1]]);
        assert!(filter(&data, &query("", "furniture", 0.0, 1000.0)).is_empty());
    }

    #[test]
    fn price_range_is_inclusive() {
        let data = products();
        assert_eq!(filter(&data, &query("", "All", 89.5, 199.99)).len(), 2);
        assert_eq!(filter(&data, &query("", "All", 89.51, 199.98)).len(), 0);
        assert_eq!(filter(&data, &query("", "All", 100.0, 1000.0)), vec![&data[0]]);
    }

    #[test]
    fn malformed_items_do_not_match() {
        let data = vec![
            json!({"id": 1, "category": "Misc", "price": 5}),
            json!({"id": 2, "name": "Lamp", "category": "Misc", "price": "cheap"}),
            json!("not an object"),
            json!({"id": 3, "name": 42, "price": 5}),
        ];
        assert!(filter(&data, &query("lamp", "All", 0.0, 1000.0)).is_empty());
        assert_eq!(filter(&data, &query("", "All", 0.0, 1000.0)).len(), 2);
        assert_eq!(filter(&data, &query("", "Misc", 0.0, 1000.0)), vec![&data[0]]);
    }

    #[test]
    fn bounds_are_floor_and_ceil_of_extrema() {
        assert_eq!(price_bounds(&products()), PriceBounds { min: 89.0, max: 200.0 });
    }

    #[test]
    fn bounds_default_for_empty_dataset() {
        assert_eq!(price_bounds(&[]), PriceBounds { min: 0.0, max: 1000.0 });
        assert_eq!(price_bounds(&[json!({"name": "no price"})]), PriceBounds::default());
    }

    #[test]
    fn categories_keep_first_seen_order() {
        let mut data = products();
        data.push(json!({"id": 3, "name": "TV", "category": "Electronics", "price": 300}));
        assert_eq!(categories(&data), vec!["All", "Electronics", "Furniture"]);
    }

    #[test]
    fn normalize_clamps_into_bounds() {
        let bounds = PriceBounds { min: 89.0, max: 200.0 };
        let clamped = normalize(&query("x", "All", 0.0, 1000.0), bounds);
        assert_eq!(clamped, query("x", "All", 89.0, 200.0));

        let untouched = query("", "All", 100.0, 150.0);
        assert_eq!(normalize(&untouched, bounds), untouched);
    }

    #[test]
    fn normalize_keeps_min_below_max() {
        let bounds = PriceBounds { min: 10.0, max: 20.0 };
        let clamped = normalize(&query("", "All", 18.0, 12.0), bounds);
        assert_eq!((clamped.min, clamped.max), (12.0, 18.0));
    }

    #[test]
    fn derive_filters_against_fresh_bounds() {
        let data = products();
        let view = derive(&data, &query("", "All", 500.0, 1000.0));
        assert_eq!(view.bounds, PriceBounds { min: 89.0, max: 200.0 });
        assert_eq!((view.query.min, view.query.max), (200.0, 200.0));
        assert!(view.visible.is_empty());
        assert_eq!(view.total, 2);
        assert_eq!(view.categories, vec!["All", "Electronics", "Furniture"]);
    }

    #[test]
    fn concrete_monitor_scenario() {
        let data = products();
        let view = derive(&data, &query("mon", "All", 0.0, 1000.0));
        assert_eq!(view.visible, vec![&data[0]]);
        assert_eq!(view.visible[0]["id"], json!(1));
    }

    #[test]
    fn every_predicate_must_hold() {
        let data = products();
        assert_eq!(filter(&data, &query("es", "Furniture", 0.0, 100.0)), vec![&data[1]]);
        assert!(filter(&data, &query("es", "Furniture", 0.0, 50.0)).is_empty());
    }
}
