//! Paginated posts feed.
//!
//! - [`model`] - `Post`, `Comment` and page parameters as the backend sends them
//! - [`merge`] - id-keyed reconciliation policies (append, replace, comments)
//! - [`fetcher`] - the [`PageFetcher`] seam the store pulls pages through
//! - [`store`] - [`FeedStore`], the in-memory feed kept consistent across
//!   refreshes and infinite scroll
//!
//! # Example
//!
//! ```ignore
//! use petfeed::feed::{FeedStore, Filters};
//!
//! let store = FeedStore::new(api, 10);
//! store.refresh(&Filters::new()).await?;
//! while store.has_more() {
//!     store.load_more(&Filters::new()).await?;
//! }
//! ```

mod fetcher;
pub mod merge;
mod model;
mod store;

pub use fetcher::{fetch_fn, FnFetcher, PageFetcher};
pub use merge::Reconcile;
pub use model::{Comment, Filters, PageParams, Post, Thread};
pub use store::{FeedStore, LoadOutcome};
