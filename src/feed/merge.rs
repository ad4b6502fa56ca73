//! Id-keyed reconciliation of posts and comments.
//!
//! Every entity type that can be re-fetched implements [`Reconcile`], which
//! states how a stored copy and a freshly received copy of the same id are
//! combined. The list-level merges ([`append`], [`replace`],
//! [`merge_comments`]) only deal with ids and ordering and delegate field
//! decisions to the per-type policy.

use super::model::{Comment, Post};
use std::collections::HashMap;

/// Conflict policy for two versions of the same entity.
pub trait Reconcile: Sized {
    /// Merge key. Entities without one are excluded from merges.
    fn merge_key(&self) -> Option<&str>;

    /// Combine the stored copy with a newer copy of the same id.
    fn reconcile(existing: Self, incoming: Self) -> Self;
}

impl Reconcile for Comment {
    fn merge_key(&self) -> Option<&str> {
        self.key()
    }

    /// Last writer wins. A creation time the incoming copy lacks is kept so
    /// the comment does not move in the thread.
    fn reconcile(existing: Self, mut incoming: Self) -> Self {
        if incoming.created_at.is_none() {
            incoming.created_at = existing.created_at;
        }
        if incoming.post_id.is_empty() {
            incoming.post_id = existing.post_id;
        }
        incoming
    }
}

impl Reconcile for Post {
    fn merge_key(&self) -> Option<&str> {
        self.key()
    }

    /// Incoming fields win, except comments: light endpoints return posts
    /// without comments, which must not wipe comments already loaded.
    fn reconcile(mut existing: Self, mut incoming: Self) -> Self {
        let loaded = std::mem::take(&mut existing.comments);
        let fetched = std::mem::take(&mut incoming.comments);
        incoming.comments = if fetched.is_empty() && !loaded.is_empty() {
            loaded
        } else {
            merge_comments(loaded, fetched)
        };
        incoming.dedup_likes();
        incoming
    }
}

/// Union two comment lists by id, incoming winning on collision, then
/// stable-sort oldest first.
pub fn merge_comments(existing: Vec<Comment>, incoming: Vec<Comment>) -> Vec<Comment> {
    let mut merged = merge_by_key(existing, incoming);
    merged.sort_by_key(Comment::recency);
    merged
}

/// "Load more" merge: known ids update in place, unseen ids go to the end
/// in fetch order. Existing order is never changed.
pub fn append(existing: Vec<Post>, incoming: Vec<Post>) -> Vec<Post> {
    merge_by_key(existing, incoming)
}

/// "Refresh" merge: like [`append`], then the whole list is stable-sorted
/// newest first. Posts missing from the refreshed page are kept.
pub fn replace(existing: Vec<Post>, incoming: Vec<Post>) -> Vec<Post> {
    let mut merged = merge_by_key(existing, incoming);
    merged.sort_by(|a, b| b.recency().cmp(&a.recency()));
    merged
}

fn merge_by_key<T>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T>
where
    T: Reconcile + Default,
{
    let mut merged: Vec<T> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());
    let mut unkeyed = 0usize;

    for item in existing.into_iter().chain(incoming) {
        let Some(key) = item.merge_key().map(str::to_owned) else {
            unkeyed += 1;
            continue;
        };
        match index.get(&key) {
            Some(&i) => {
                let stored = std::mem::take(&mut merged[i]);
                merged[i] = T::reconcile(stored, item);
            }
            None => {
                index.insert(key, merged.len());
                merged.push(item);
            }
        }
    }

    if unkeyed > 0 {
        tracing::debug!(
            dropped = unkeyed,
            entity = std::any::type_name::<T>(),
            "Entries without id excluded from merge"
        );
    }

    merged
}
