use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Extra query fields forwarded to the backend with every page request
/// (e.g. `species=dog`, `author=<id>`).
pub type Filters = BTreeMap<String, String>;

/// Parameters for a single page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageParams {
    /// 1-based page number
    pub page: u32,
    /// Requested page size
    pub limit: u32,
    pub filters: Filters,
}

// ============================================================================
// Comment
// ============================================================================

/// A comment attached to a post.
///
/// Replies are flat: `parent_id` points at another comment of the same post,
/// and only one level of nesting is rendered (see [`Post::threads`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comment {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "post")]
    pub post_id: String,
    #[serde(alias = "parent", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(alias = "author", skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    /// The merge key, or `None` when the backend sent no id.
    pub fn key(&self) -> Option<&str> {
        non_empty(&self.id)
    }

    /// Sort key for comment lists (oldest first).
    pub fn recency(&self) -> DateTime<Utc> {
        recency(self.created_at, self.updated_at)
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.as_deref().and_then(non_empty).is_some()
    }
}

// ============================================================================
// Post
// ============================================================================

/// A feed post: an adoption announcement or a community update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Post {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "author", skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    /// Pet the post is about, when it is an adoption announcement
    #[serde(alias = "pet", skip_serializing_if = "Option::is_none")]
    pub pet_id: Option<String>,
    pub content: String,
    pub images: Vec<String>,
    /// Account ids that liked the post. Duplicates from the backend are
    /// dropped on deserialize, keeping the first occurrence.
    #[serde(deserialize_with = "dedup_ids")]
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    /// The merge key, or `None` when the backend sent no id.
    pub fn key(&self) -> Option<&str> {
        non_empty(&self.id)
    }

    /// Sort key for the feed: `created_at`, then `updated_at`, then the epoch.
    pub fn recency(&self) -> DateTime<Utc> {
        recency(self.created_at, self.updated_at)
    }

    pub fn is_liked_by(&self, account_id: &str) -> bool {
        self.likes.iter().any(|id| id == account_id)
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    /// Drop repeated account ids from `likes`, keeping first occurrences.
    pub fn dedup_likes(&mut self) {
        let mut seen = HashSet::new();
        self.likes.retain(|id| seen.insert(id.clone()));
    }

    /// Like or unlike on behalf of `account_id`.
    ///
    /// Returns `true` when the post is liked after the call.
    pub fn toggle_like(&mut self, account_id: &str) -> bool {
        if self.is_liked_by(account_id) {
            self.likes.retain(|id| id != account_id);
            false
        } else {
            self.likes.push(account_id.to_string());
            true
        }
    }

    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    /// Group comments into top-level threads with one level of replies.
    ///
    /// A reply to a reply is attached to its top-level ancestor. A reply whose
    /// parent is not loaded is shown as a top-level comment.
    pub fn threads(&self) -> Vec<Thread<'_>> {
        let by_id: HashMap<&str, &Comment> = self
            .comments
            .iter()
            .filter_map(|c| c.key().map(|k| (k, c)))
            .collect();

        let mut threads: Vec<Thread<'_>> = Vec::new();
        let mut slot: HashMap<&str, usize> = HashMap::new();
        let mut replies: Vec<(&str, &Comment)> = Vec::new();

        for comment in &self.comments {
            match root_of(&by_id, comment, self.comments.len()) {
                Some(root) if root != comment.id => replies.push((root, comment)),
                _ => {
                    slot.insert(comment.id.as_str(), threads.len());
                    threads.push(Thread {
                        comment,
                        replies: Vec::new(),
                    });
                }
            }
        }

        for (root, reply) in replies {
            if let Some(&i) = slot.get(root) {
                threads[i].replies.push(reply);
            }
        }

        threads
    }
}

/// A top-level comment with its replies, in list order.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread<'a> {
    pub comment: &'a Comment,
    pub replies: Vec<&'a Comment>,
}

/// Top-level ancestor of a reply, or `None` for top-level comments and
/// replies whose parent chain is broken or cyclic.
fn root_of<'a>(
    by_id: &HashMap<&'a str, &'a Comment>,
    comment: &Comment,
    max_depth: usize,
) -> Option<&'a str> {
    let mut parent = *by_id.get(comment.parent_id.as_deref().and_then(non_empty)?)?;
    for _ in 0..max_depth {
        match parent.parent_id.as_deref().and_then(non_empty) {
            Some(next) => parent = *by_id.get(next)?,
            None => return Some(parent.id.as_str()),
        }
    }
    None
}

fn dedup_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut ids = Vec::<String>::deserialize(deserializer)?;
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));
    Ok(ids)
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn recency(created: Option<DateTime<Utc>>, updated: Option<DateTime<Utc>>) -> DateTime<Utc> {
    created.or(updated).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
