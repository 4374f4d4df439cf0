//! Ownership checks shared by every user-authored resource.
//!
//! Handlers never compare author ids themselves; they ask for an [`Access`]
//! and pick a view or reject the mutation from it.

use uuid::Uuid;

use crate::domain::engagement::{Comment, CommentView};
use crate::domain::post::{Post, PostDetail, PostView};

pub trait Authored {
    fn author_id(&self) -> Uuid;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    Reader,
}

impl Access {
    pub fn is_owner(self) -> bool {
        matches!(self, Self::Owner)
    }
}

pub fn access_for<T: Authored + ?Sized>(requester: Uuid, resource: &T) -> Access {
    if resource.author_id() == requester {
        Access::Owner
    } else {
        Access::Reader
    }
}

impl Authored for Post {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

impl Authored for PostDetail {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> Uuid {
        self.author_id
    }
}

/// Owners get the full post with its comments; everyone else gets counters.
/// `comments` is only consulted for owners.
pub fn post_view(requester: Uuid, post: Post, comments: Vec<Comment>) -> PostView {
    match access_for(requester, &post) {
        Access::Owner => PostView::Owner(PostDetail::new(post, comments)),
        Access::Reader => PostView::Reader(post),
    }
}

pub fn comment_view(requester: Uuid, comment: Comment) -> CommentView {
    match access_for(requester, &comment) {
        Access::Owner => CommentView::Owner(comment),
        Access::Reader => CommentView::Reader(comment),
    }
}
