//! HTTP client for the platform's REST API.
//!
//! [`PostsApi`] is the production [`PageFetcher`](crate::feed::PageFetcher):
//! it requests feed pages, post comments and archive actions, retrying
//! transient failures (429/5xx) with exponential backoff.

mod client;

pub use client::{ApiError, PostsApi};
