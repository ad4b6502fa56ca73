use super::fetcher::PageFetcher;
use super::merge::{self, merge_comments};
use super::model::{Comment, Filters, PageParams, Post};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Result of a [`FeedStore::load_more`] or [`FeedStore::refresh`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and merged.
    Loaded { returned: usize, has_more: bool },
    /// Another fetch was already in flight; nothing was requested.
    Skipped,
    /// The cancellation token fired, or the store was reset, before the page
    /// arrived; nothing was committed.
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
enum MergeMode {
    Append,
    Replace,
}

#[derive(Debug)]
struct FeedState {
    posts: Vec<Post>,
    next_page: u32,
    has_more: bool,
    /// Bumped by `reset`; a fetch started under an older generation is dropped
    generation: u64,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            posts: Vec::new(),
            next_page: 1,
            has_more: true,
            generation: 0,
        }
    }
}

/// Clears the in-flight flag when dropped, whether the fetch succeeded,
/// failed, panicked or was cancelled.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Client-side cache of the paginated posts feed.
///
/// Pages come from an injected [`PageFetcher`]. `refresh` re-reads page 1 and
/// re-sorts newest first; `load_more` appends the next page without moving
/// anything the user is already looking at. Posts are unique by id, and a
/// re-fetched post never loses comments that were already loaded.
///
/// Only one fetch runs at a time: a `load_more` or `refresh` issued while
/// another is in flight returns [`LoadOutcome::Skipped`] without touching the
/// network. The state lock is never held across an `.await`.
///
/// All post/comment mutations are no-ops when the target id is absent, so a
/// late update racing a removal is harmless.
pub struct FeedStore<F> {
    fetcher: F,
    page_size: u32,
    loading: AtomicBool,
    state: Mutex<FeedState>,
}

impl<F: PageFetcher> FeedStore<F> {
    /// Create an empty store. A page size of 0 is treated as 1.
    pub fn new(fetcher: F, page_size: u32) -> Self {
        Self {
            fetcher,
            page_size: page_size.max(1),
            loading: AtomicBool::new(false),
            state: Mutex::new(FeedState::default()),
        }
    }

    // ------------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------------

    /// Fetch the page at the cursor and append it.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unchanged. Nothing is committed and the
    /// cursor does not move.
    pub async fn load_more(&self, filters: &Filters) -> Result<LoadOutcome, F::Error> {
        self.fetch_and_merge(MergeMode::Append, filters, None).await
    }

    /// Fetch page 1, merge it in and re-sort newest first. Resets the cursor
    /// to page 2.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unchanged. Nothing is committed.
    pub async fn refresh(&self, filters: &Filters) -> Result<LoadOutcome, F::Error> {
        self.fetch_and_merge(MergeMode::Replace, filters, None).await
    }

    /// [`load_more`](Self::load_more) that discards the page if `cancel`
    /// fires first, e.g. because the view that asked for it went away.
    pub async fn load_more_cancellable(
        &self,
        filters: &Filters,
        cancel: &CancellationToken,
    ) -> Result<LoadOutcome, F::Error> {
        self.fetch_and_merge(MergeMode::Append, filters, Some(cancel))
            .await
    }

    /// [`refresh`](Self::refresh) that discards the page if `cancel` fires
    /// first.
    pub async fn refresh_cancellable(
        &self,
        filters: &Filters,
        cancel: &CancellationToken,
    ) -> Result<LoadOutcome, F::Error> {
        self.fetch_and_merge(MergeMode::Replace, filters, Some(cancel))
            .await
    }

    async fn fetch_and_merge(
        &self,
        mode: MergeMode,
        filters: &Filters,
        cancel: Option<&CancellationToken>,
    ) -> Result<LoadOutcome, F::Error> {
        let Some(_guard) = InFlight::acquire(&self.loading) else {
            tracing::debug!(mode = ?mode, "Fetch already in flight, skipping");
            return Ok(LoadOutcome::Skipped);
        };

        let (page, generation) = {
            let state = self.lock();
            let page = match mode {
                MergeMode::Append => state.next_page,
                MergeMode::Replace => 1,
            };
            (page, state.generation)
        };
        let params = PageParams {
            page,
            limit: self.page_size,
            filters: filters.clone(),
        };

        let fetch = self.fetcher.fetch_page(&params);
        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!(page = page, "Page fetch cancelled, discarding");
                        return Ok(LoadOutcome::Cancelled);
                    }
                    result = fetch => result,
                }
            }
            None => fetch.await,
        };

        let posts = match result {
            Ok(posts) => posts,
            Err(e) => {
                tracing::warn!(page = page, error = %e, "Page fetch failed");
                return Err(e);
            }
        };

        let returned = posts.len();
        let has_more = returned >= self.page_size as usize;

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(page = page, "Store reset during fetch, discarding page");
            return Ok(LoadOutcome::Cancelled);
        }
        let current = std::mem::take(&mut state.posts);
        state.posts = match mode {
            MergeMode::Append => merge::append(current, posts),
            MergeMode::Replace => merge::replace(current, posts),
        };
        state.has_more = has_more;
        state.next_page = match mode {
            MergeMode::Append => page.saturating_add(1),
            MergeMode::Replace => 2,
        };

        tracing::debug!(
            mode = ?mode,
            page = page,
            returned = returned,
            has_more = has_more,
            total = state.posts.len(),
            "Merged feed page"
        );

        Ok(LoadOutcome::Loaded { returned, has_more })
    }
}

impl<F> FeedStore<F> {
    fn lock(&self) -> MutexGuard<'_, FeedState> {
        // Mutations never leave the state half-written, so a poisoned lock is
        // still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Snapshot of the feed in display order.
    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    pub fn get_post(&self, id: &str) -> Option<Post> {
        self.lock().posts.iter().find(|p| p.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().posts.is_empty()
    }

    /// Whether the last page fetched was full.
    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    /// Whether a fetch is currently in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Page number the next `load_more` will request.
    pub fn next_page(&self) -> u32 {
        self.lock().next_page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Drop every post and rewind the cursor. A fetch in flight at this point
    /// completes as [`LoadOutcome::Cancelled`] without committing.
    pub fn reset(&self) {
        let mut state = self.lock();
        let generation = state.generation.wrapping_add(1);
        *state = FeedState {
            generation,
            ..FeedState::default()
        };
    }

    // ------------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------------

    /// Insert a post at the top of the feed unless its id is already present.
    ///
    /// Returns `true` if it was inserted.
    pub fn add_post(&self, post: Post) -> bool {
        let Some(key) = post.key() else {
            tracing::debug!("Ignoring post without id");
            return false;
        };
        let mut state = self.lock();
        if state.posts.iter().any(|p| p.id == key) {
            return false;
        }
        let mut post = post;
        post.dedup_likes();
        state.posts.insert(0, post);
        true
    }

    /// Apply `update` to the post with `id`. Returns `false` if absent.
    ///
    /// The id is the merge key and cannot be changed here; a rewritten id is
    /// restored.
    pub fn update_post(&self, id: &str, update: impl FnOnce(&mut Post)) -> bool {
        let mut state = self.lock();
        match state.posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                update(post);
                if post.id != id {
                    tracing::debug!(id = %id, attempted = %post.id, "Ignoring post id change");
                    post.id = id.to_string();
                }
                true
            }
            None => false,
        }
    }

    /// Remove the post with `id`, returning it.
    pub fn remove_post(&self, id: &str) -> Option<Post> {
        let mut state = self.lock();
        let pos = state.posts.iter().position(|p| p.id == id)?;
        Some(state.posts.remove(pos))
    }

    /// Take the post out of the feed and return it flagged as archived.
    pub fn archive_post(&self, id: &str) -> Option<Post> {
        let mut post = self.remove_post(id)?;
        post.archived = true;
        Some(post)
    }

    // ------------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------------

    /// Merge one comment into a post. See [`add_comments`](Self::add_comments).
    pub fn add_comment(&self, post_id: &str, comment: Comment) -> Option<Post> {
        self.add_comments(post_id, vec![comment])
    }

    /// Merge comments into a post by id, the new copies winning.
    ///
    /// Returns the updated post, or `None` if the post is not loaded.
    pub fn add_comments(&self, post_id: &str, comments: Vec<Comment>) -> Option<Post> {
        let mut state = self.lock();
        let post = state.posts.iter_mut().find(|p| p.id == post_id)?;
        let comments = comments
            .into_iter()
            .map(|mut c| {
                if c.post_id.is_empty() {
                    c.post_id = post_id.to_string();
                }
                c
            })
            .collect();
        let loaded = std::mem::take(&mut post.comments);
        post.comments = merge_comments(loaded, comments);
        Some(post.clone())
    }

    /// Apply `update` to one comment. Returns `false` if the post or the
    /// comment is absent.
    pub fn update_comment(
        &self,
        post_id: &str,
        comment_id: &str,
        update: impl FnOnce(&mut Comment),
    ) -> bool {
        let mut state = self.lock();
        let comment = state
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .and_then(|p| p.comments.iter_mut().find(|c| c.id == comment_id));
        match comment {
            Some(comment) => {
                update(comment);
                true
            }
            None => false,
        }
    }

    /// Remove one comment. Returns `false` if nothing was removed.
    pub fn remove_comment(&self, post_id: &str, comment_id: &str) -> bool {
        let mut state = self.lock();
        let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) else {
            return false;
        };
        let before = post.comments.len();
        post.comments.retain(|c| c.id != comment_id);
        post.comments.len() != before
    }
}
