//! Network source adapters.
//!
//! Both adapters fetch through [`FetchClient`], which applies retry, backoff
//! and the per-run budget. The API adapter expects JSON; the scraper expects
//! HTML and extracts tables or lists.

pub mod api;
pub mod client;
pub mod scrape;

pub use api::ApiAdapter;
pub use client::{FetchClient, Fetched, RetryPolicy};
pub use scrape::ScrapeAdapter;
