//! Terminal output formatting for the CLI.
//!
//! Plain stdout, boxed panels for tweets and opportunities, key/value rows
//! for status. Long lines wrap on word boundaries.

use crate::generator::GeneratedPost;
use crate::monitor::{MonitorStats, Opportunity};
use crate::poster::{Decision, PosterStatus};

const PANEL_WIDTH: usize = 72;

pub fn heading(text: &str) {
    println!("\n{text}");
    println!("{}", "─".repeat(PANEL_WIDTH));
}

pub fn kv(label: &str, value: &str) {
    println!("  {label:<24} {value}");
}

/// Print a titled panel with wrapped body lines.
pub fn panel(title: &str, body: &str) {
    println!("┌─ {title} {}", "─".repeat(PANEL_WIDTH.saturating_sub(title.len() + 4)));
    for line in body.lines() {
        if line.is_empty() {
            println!("│");
            continue;
        }
        for wrapped in wrap_line(line, PANEL_WIDTH - 2) {
            println!("│ {wrapped}");
        }
    }
    println!("└{}", "─".repeat(PANEL_WIDTH));
}

pub fn generated_post(index: usize, post: &GeneratedPost) {
    let body = format!(
        "{}\n\nCalculator: {}\nTemplate: {}\nLength: {} chars",
        post.text,
        post.name,
        post.kind,
        post.text.chars().count()
    );
    panel(&format!("Tweet {index}"), &body);
    println!();
}

pub fn opportunity(index: usize, opp: &Opportunity) {
    let t = &opp.tweet;
    let body = format!(
        "@{} ({} followers)\n{}\n\n\"{}\"\n\nLikes: {} | RTs: {} | Replies: {}\nRelevance: {:.0}%\nCalculator: {}\n\nSuggested reply:\n{}",
        t.author_username,
        t.author_followers,
        t.created_at,
        t.text,
        t.like_count,
        t.retweet_count,
        t.reply_count,
        opp.relevance_score * 100.0,
        opp.suggested_slug,
        opp.suggested_reply,
    );
    panel(
        &format!("Opportunity {index} (keyword: {})", opp.matched_keyword),
        &body,
    );
    println!();
}

pub fn poster_status(status: &PosterStatus) {
    heading("Posting status");
    match &status.decision {
        Decision::CanPost => kv("Can post now", "yes"),
        Decision::Blocked(reason) => kv("Can post now", &format!("no ({reason})")),
    }
    kv(
        "Posts today",
        &format!("{} / {}", status.posts_today, status.max_posts_per_day),
    );
    kv(
        "Last post",
        &status
            .last_post_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string()),
    );
    if !status.posted_slugs_today.is_empty() {
        kv("Promoted today", &status.posted_slugs_today.join(", "));
    }
}

pub fn monitor_stats(stats: &MonitorStats) {
    heading("Monitor status");
    kv("Keywords monitored", &stats.keywords_monitored.to_string());
    kv("Tweets seen", &stats.tweets_seen.to_string());
    kv("Replies sent", &stats.tweets_replied.to_string());
    kv("Pending opportunities", &stats.pending_opportunities.to_string());
}

/// Wrap one line into chunks of at most `max` chars on word boundaries.
fn wrap_line(line: &str, max: usize) -> Vec<String> {
    if line.chars().count() <= max {
        return vec![line.to_string()];
    }
    let mut result = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > max {
            result.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}
