use time::OffsetDateTime;

use crate::domain::user::User;

/// One side of a follow edge, with the user on the other end.
#[derive(Debug, Clone)]
pub struct SocialUserEdge {
    pub user: User,
    pub followed_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    AlreadyFollowing,
    UserNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnfollowOutcome {
    Unfollowed,
    NotFollowing,
    UserNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowToggle {
    Followed,
    Unfollowed,
}

impl FollowToggle {
    pub fn is_following(self) -> bool {
        matches!(self, Self::Followed)
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Followed => "user followed",
            Self::Unfollowed => "user unfollowed",
        }
    }
}
