//! Posts derived from the echo endpoint's `args.query`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::POST_COUNT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: usize,
    pub title: String,
}

/// The topic echoed back by the endpoint, or `"unknown"` when missing.
pub fn topic(data: Option<&Value>) -> &str {
    data.and_then(|d| d.pointer("/args/query"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

pub fn derive_posts(data: Option<&Value>) -> Vec<Post> {
    let topic = topic(data);
    (1..=POST_COUNT)
        .map(|id| Post {
            id,
            title: format!("Post about {} #{}", topic, id),
        })
        .collect()
}
