//! Group fetched posts per author in a deterministic order.
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::twitter::model::{Account, Post};

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorGroup {
    /// First account object seen for this handle.
    pub account: Account,
    /// Newest first.
    pub posts: Vec<Post>,
}

impl AuthorGroup {
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.posts.iter().map(|p| p.created_at).max()
    }
}

/// Authors ordered by their most recent post, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorDigest {
    groups: Vec<AuthorGroup>,
}

impl AuthorDigest {
    pub fn from_groups(mut groups: Vec<AuthorGroup>) -> Self {
        order_groups(&mut groups);
        Self { groups }
    }

    pub fn groups(&self) -> &[AuthorGroup] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<AuthorGroup> {
        self.groups
    }

    pub fn total_posts(&self) -> usize {
        self.groups.iter().map(|g| g.posts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_posts() == 0
    }
}

/// Stable sort of groups by latest post, descending; empty groups go last.
pub fn order_groups(groups: &mut [AuthorGroup]) {
    // Option orders None below Some, so reversing puts empty groups last.
    groups.sort_by(|a, b| b.latest().cmp(&a.latest()));
}

pub fn group_by_author(posts: Vec<Post>) -> AuthorDigest {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<AuthorGroup> = Vec::new();

    for post in posts {
        let key = post.author.key();
        let slot = match index.get(&key) {
            Some(&slot) => slot,
            None => {
                groups.push(AuthorGroup {
                    account: post.author.clone(),
                    posts: Vec::new(),
                });
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].posts.push(post);
    }

    for group in &mut groups {
        group.posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
    AuthorDigest::from_groups(groups)
}
