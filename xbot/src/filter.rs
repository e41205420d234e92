//! Candidate admission filter.
//!
//! Decides whether a search result is worth scoring at all. Pure function of
//! its inputs, no side effects. The checks run in a fixed order and the first
//! failure wins, so a rejection reason is deterministic for a given input.

use crate::client::Tweet;

/// Engagement thresholds a candidate must clear.
#[derive(Debug, Clone, Copy)]
pub struct FilterLimits {
    pub min_followers: u64,
    pub min_likes: u64,
    pub min_retweets: u64,
}

/// Why a candidate was rejected. `Display` is the reason string shown in
/// logs and asserted by tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    AlreadyReplied,
    AlreadySeen,
    BlacklistedAuthor,
    TooFewFollowers { followers: u64 },
    TooFewLikes { likes: u64 },
    TooFewRetweets { retweets: u64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::AlreadyReplied => write!(f, "already replied"),
            RejectReason::AlreadySeen => write!(f, "already seen"),
            RejectReason::BlacklistedAuthor => write!(f, "blacklisted author"),
            RejectReason::TooFewFollowers { followers } => {
                write!(f, "too few followers ({followers})")
            }
            RejectReason::TooFewLikes { likes } => write!(f, "too few likes ({likes})"),
            RejectReason::TooFewRetweets { retweets } => {
                write!(f, "too few retweets ({retweets})")
            }
        }
    }
}

/// Admit or reject a candidate tweet.
///
/// Check order (first failure wins): replied, seen, blacklist, followers,
/// likes, retweets. Blacklist comparison is case-insensitive on the author
/// handle.
pub fn admit(
    tweet: &Tweet,
    blacklist: &[String],
    limits: &FilterLimits,
    seen: &[String],
    replied: &[String],
) -> Result<(), RejectReason> {
    if replied.iter().any(|id| *id == tweet.id) {
        return Err(RejectReason::AlreadyReplied);
    }
    if seen.iter().any(|id| *id == tweet.id) {
        return Err(RejectReason::AlreadySeen);
    }
    if blacklist
        .iter()
        .any(|b| b.eq_ignore_ascii_case(&tweet.author_username))
    {
        return Err(RejectReason::BlacklistedAuthor);
    }
    if tweet.author_followers < limits.min_followers {
        return Err(RejectReason::TooFewFollowers { followers: tweet.author_followers });
    }
    if tweet.like_count < limits.min_likes {
        return Err(RejectReason::TooFewLikes { likes: tweet.like_count });
    }
    if tweet.retweet_count < limits.min_retweets {
        return Err(RejectReason::TooFewRetweets { retweets: tweet.retweet_count });
    }
    Ok(())
}
