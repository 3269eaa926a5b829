//! Application-level configuration constants.

// UI Behavior
pub const DEBOUNCE_MS: u32 = 250;
pub const PAGE_SIZE: u32 = 8;

// Remote resources
pub const PRODUCTS_URL: &str = "/products.json";
pub const POSTS_URL: &str = "https://httpbin.org/delay/2?query=abcd";
pub const POST_COUNT: usize = 5;

// Default values for the filter record
pub const DEFAULT_SEARCH: &str = "";
pub const ALL_CATEGORIES: &str = "All";
pub const DEFAULT_MIN_PRICE: f64 = 0.0;
pub const DEFAULT_MAX_PRICE: f64 = 1000.0;

// Mock paged API
pub const MOCK_ITEM_COUNT: u32 = 42;
pub const MOCK_MIN_LATENCY_MS: u32 = 500;
pub const MOCK_MAX_LATENCY_MS: u32 = 900;
pub const MOCK_FAILURE_RATE: f64 = 0.15;
pub const MOCK_FAILURE_MESSAGE: &str = "Network hiccup, please retry.";
