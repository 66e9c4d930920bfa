pub mod fetch;
pub mod freshness;

pub use fetch::{FetchError, FetchResponse, HttpFetcher};
pub use freshness::{build_conditional_headers, compute_expiry};
