//! Relevance scoring for admitted candidates.
//!
//! A fixed additive heuristic, not a model. Identical inputs must always
//! produce identical scores; the monitor sorts on this and tests pin the
//! exact values.

use crate::client::Tweet;

/// Score a tweet's relevance for a matched keyword, in [0, 1].
///
/// Base 0.5, plus:
/// - 0.2 if the text contains a question mark (someone asking for help)
/// - up to 0.1 from likes (0.01 each), up to 0.1 from replies (0.02 each)
/// - 0.1 if the author has > 1000 followers, another 0.1 if > 10000
/// - 0.1 if the keyword appears verbatim (case-insensitive) in the text
pub fn relevance(tweet: &Tweet, keyword: &str) -> f64 {
    let mut score = 0.5;

    if tweet.text.contains('?') {
        score += 0.2;
    }

    score += f64::min(0.1, tweet.like_count as f64 * 0.01);
    score += f64::min(0.1, tweet.reply_count as f64 * 0.02);

    if tweet.author_followers > 1000 {
        score += 0.1;
    }
    if tweet.author_followers > 10000 {
        score += 0.1;
    }

    if tweet.text.to_lowercase().contains(&keyword.to_lowercase()) {
        score += 0.1;
    }

    f64::min(1.0, score)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn tweet(text: &str, likes: u64, replies: u64, followers: u64) -> Tweet {
        Tweet {
            id: "1".to_string(),
            text: text.to_string(),
            author_id: "u1".to_string(),
            author_username: "alice".to_string(),
            author_followers: followers,
            like_count: likes,
            retweet_count: 0,
            reply_count: replies,
            created_at: "2026-08-01T10:00:00Z".to_string(),
            conversation_id: None,
        }
    }

    #[test]
    fn baseline_is_exactly_half() {
        let t = tweet("thinking about mortgages today", 0, 0, 0);
        let s = relevance(&t, "paint calculator");
        assert!((s - 0.5).abs() < EPS, "got {s}");
    }

    #[test]
    fn question_mark_adds_point_two() {
        let t = tweet("anyone got a tool for this?", 0, 0, 0);
        assert!((relevance(&t, "paint calculator") - 0.7).abs() < EPS);
    }

    #[test]
    fn engagement_bonuses_are_capped() {
        // 10 likes maxes out the like bonus; more likes adds nothing.
        let a = relevance(&tweet("plain", 10, 0, 0), "x");
        let b = relevance(&tweet("plain", 10_000, 0, 0), "x");
        assert!((a - 0.6).abs() < EPS);
        assert!((a - b).abs() < EPS);

        // 5 replies maxes out the reply bonus.
        let c = relevance(&tweet("plain", 0, 5, 0), "x");
        let d = relevance(&tweet("plain", 0, 500, 0), "x");
        assert!((c - 0.6).abs() < EPS);
        assert!((c - d).abs() < EPS);
    }

    #[test]
    fn follower_bonuses_stack() {
        assert!((relevance(&tweet("plain", 0, 0, 999), "x") - 0.5).abs() < EPS);
        assert!((relevance(&tweet("plain", 0, 0, 1001), "x") - 0.6).abs() < EPS);
        assert!((relevance(&tweet("plain", 0, 0, 10_001), "x") - 0.7).abs() < EPS);
    }

    #[test]
    fn keyword_containment_is_case_insensitive() {
        let t = tweet("Need a Mortgage Calculator recommendation", 0, 0, 0);
        assert!((relevance(&t, "mortgage calculator") - 0.6).abs() < EPS);
    }

    #[test]
    fn score_is_monotone_in_engagement() {
        let keyword = "mortgage calculator";
        let mut prev = 0.0;
        for likes in [0u64, 1, 3, 7, 20] {
            let s = relevance(&tweet("plain", likes, 0, 0), keyword);
            assert!(s >= prev - EPS);
            prev = s;
        }
    }

    #[test]
    fn score_never_exceeds_one() {
        let t = tweet(
            "is there a mortgage calculator that handles overpayments???",
            1_000_000,
            1_000_000,
            5_000_000,
        );
        let s = relevance(&t, "mortgage calculator");
        assert!(s <= 1.0 + EPS);
        assert!((s - 1.0).abs() < EPS);
    }
}
