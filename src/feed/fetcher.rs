use super::model::{PageParams, Post};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Source of feed pages.
///
/// An empty page signals end of data. Implementations report failures with
/// their own error type; [`FeedStore`](super::FeedStore) hands it back to the
/// caller untouched.
pub trait PageFetcher: Send + Sync {
    type Error: Display + Send;

    fn fetch_page(
        &self,
        params: &PageParams,
    ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send;
}

impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    type Error = T::Error;

    fn fetch_page(
        &self,
        params: &PageParams,
    ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send {
        (**self).fetch_page(params)
    }
}

/// Adapter turning an async closure into a [`PageFetcher`].
///
/// ```ignore
/// let store = FeedStore::new(fetch_fn(|params| async move {
///     api.fetch_page(&params).await
/// }), 10);
/// ```
pub struct FnFetcher<F>(F);

pub fn fetch_fn<F>(f: F) -> FnFetcher<F> {
    FnFetcher(f)
}

impl<F, Fut, E> PageFetcher for FnFetcher<F>
where
    F: Fn(PageParams) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Post>, E>> + Send,
    E: Display + Send,
{
    type Error = E;

    fn fetch_page(
        &self,
        params: &PageParams,
    ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send {
        (self.0)(params.clone())
    }
}
