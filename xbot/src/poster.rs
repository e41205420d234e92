//! Posting quota and scheduling policy.
//!
//! Every post or reply passes through the same gate: daily rollover, daily
//! limit, minimum spacing, allowed weekday, in that order; first block wins.
//! A quota block is a normal decision, not an error. Successful posts mutate
//! durable state immediately.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::client::{ClientError, XClient};
use crate::generator::{GeneratedPost, Generator};
use crate::state::{self, StateStore};

/// Document name in the state store.
const DOC: &str = "poster_state";
/// History entries retained, oldest evicted first.
const MAX_HISTORY: usize = 100;

/// Quota limits, from config.
#[derive(Debug, Clone)]
pub struct QuotaLimits {
    pub max_posts_per_day: u32,
    pub min_hours_between_posts: f64,
    /// 0 = Monday .. 6 = Sunday.
    pub allowed_weekdays: Vec<u8>,
}

/// Durable posting state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterState {
    pub last_post_time: Option<DateTime<Local>>,
    pub posts_today: u32,
    pub today_date: Option<NaiveDate>,
    /// Calculators promoted today (cleared on rollover).
    pub posted_slugs: Vec<String>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tweet_id: String,
    pub text: String,
    pub slug: Option<String>,
    pub posted_at: DateTime<Local>,
}

/// Outcome of the quota gate.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    CanPost,
    Blocked(BlockReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockReason {
    DailyLimitReached { limit: u32 },
    TooSoonSinceLastPost { wait_minutes: u32 },
    NotAPostingDay { weekday: u8 },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::DailyLimitReached { limit } => {
                write!(f, "daily limit reached ({limit} posts)")
            }
            BlockReason::TooSoonSinceLastPost { wait_minutes } => {
                write!(f, "too soon since last post (wait {wait_minutes} minutes)")
            }
            BlockReason::NotAPostingDay { weekday } => {
                write!(f, "not a posting day (weekday {weekday})")
            }
        }
    }
}

/// Outcome of a post/reply attempt. Client failures are folded in here;
/// they never propagate past the poster.
#[derive(Debug, Clone)]
pub enum PostOutcome {
    Posted { tweet_id: String, text: String },
    Blocked(BlockReason),
    Failed { reason: String },
}

/// Reset daily counters when the calendar day has advanced.
pub fn roll_over_day(state: &mut PosterState, today: NaiveDate) -> bool {
    if state.today_date != Some(today) {
        state.today_date = Some(today);
        state.posts_today = 0;
        state.posted_slugs.clear();
        return true;
    }
    false
}

/// Evaluate the quota gate at `now`. Rolls the day over first, then applies
/// the checks in fixed order: daily limit, spacing, weekday.
pub fn evaluate(state: &mut PosterState, limits: &QuotaLimits, now: DateTime<Local>) -> Decision {
    roll_over_day(state, now.date_naive());

    if state.posts_today >= limits.max_posts_per_day {
        return Decision::Blocked(BlockReason::DailyLimitReached {
            limit: limits.max_posts_per_day,
        });
    }

    if let Some(last) = state.last_post_time {
        let hours_since = (now - last).num_milliseconds() as f64 / 3_600_000.0;
        if hours_since < limits.min_hours_between_posts {
            let wait_minutes =
                ((limits.min_hours_between_posts - hours_since) * 60.0).ceil() as u32;
            return Decision::Blocked(BlockReason::TooSoonSinceLastPost { wait_minutes });
        }
    }

    let weekday = now.weekday().num_days_from_monday() as u8;
    if !limits.allowed_weekdays.contains(&weekday) {
        return Decision::Blocked(BlockReason::NotAPostingDay { weekday });
    }

    Decision::CanPost
}

/// Record a successful post: timestamp, counter, per-day slug list, bounded
/// history.
pub fn record_post(
    state: &mut PosterState,
    now: DateTime<Local>,
    tweet_id: &str,
    text: &str,
    slug: Option<&str>,
) {
    state.last_post_time = Some(now);
    state.posts_today += 1;
    if let Some(slug) = slug {
        state.posted_slugs.push(slug.to_string());
    }
    state.history.push(HistoryEntry {
        tweet_id: tweet_id.to_string(),
        text: text.to_string(),
        slug: slug.map(str::to_string),
        posted_at: now,
    });
    if state.history.len() > MAX_HISTORY {
        let excess = state.history.len() - MAX_HISTORY;
        state.history.drain(..excess);
    }
}

/// Posting status for the CLI.
#[derive(Debug, Clone)]
pub struct PosterStatus {
    pub decision: Decision,
    pub posts_today: u32,
    pub max_posts_per_day: u32,
    pub last_post_time: Option<DateTime<Local>>,
    pub posted_slugs_today: Vec<String>,
}

/// Poster: quota policy plus the actual post/reply operations.
pub struct Poster {
    limits: QuotaLimits,
    store: Arc<dyn StateStore>,
    state: PosterState,
}

impl Poster {
    pub fn load(limits: QuotaLimits, store: Arc<dyn StateStore>) -> Result<Self> {
        let state = state::load_doc(store.as_ref(), DOC)?;
        Ok(Self { limits, store, state })
    }

    fn save(&self) -> Result<()> {
        state::save_doc(self.store.as_ref(), DOC, &self.state)
    }

    /// Run the quota gate now, persisting a rollover if one happened.
    pub fn can_post(&mut self) -> Result<Decision> {
        let before = self.state.today_date;
        let decision = evaluate(&mut self.state, &self.limits, Local::now());
        if self.state.today_date != before {
            self.save()?;
        }
        Ok(decision)
    }

    pub fn status(&mut self) -> Result<PosterStatus> {
        let decision = self.can_post()?;
        Ok(PosterStatus {
            decision,
            posts_today: self.state.posts_today,
            max_posts_per_day: self.limits.max_posts_per_day,
            last_post_time: self.state.last_post_time,
            posted_slugs_today: self.state.posted_slugs.clone(),
        })
    }

    /// Post a tweet. `draft` takes precedence over `text`; with neither, a
    /// fresh draft is generated. `force` bypasses the quota gate but a
    /// successful post still updates state identically.
    pub async fn post(
        &mut self,
        client: &XClient,
        generator: &Generator,
        draft: Option<GeneratedPost>,
        text: Option<String>,
        force: bool,
    ) -> Result<PostOutcome> {
        if !force {
            if let Decision::Blocked(reason) = self.can_post()? {
                return Ok(PostOutcome::Blocked(reason));
            }
        }

        let (tweet_text, slug) = match (draft, text) {
            (Some(draft), _) => (draft.text, Some(draft.slug)),
            (None, Some(text)) => (text, None),
            (None, None) => {
                let draft = generator.generate_post(None, None, true).await?;
                (draft.text, Some(draft.slug))
            }
        };

        match client.post(&tweet_text, None).await {
            Ok(posted) => {
                record_post(
                    &mut self.state,
                    Local::now(),
                    &posted.id,
                    &tweet_text,
                    slug.as_deref(),
                );
                self.save()?;
                tracing::info!(tweet_id = %posted.id, "Posted tweet");
                Ok(PostOutcome::Posted { tweet_id: posted.id, text: tweet_text })
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to post tweet");
                Ok(PostOutcome::Failed { reason: client_failure_reason(e) })
            }
        }
    }

    /// Post a reply. Replies count toward the daily quota.
    pub async fn reply(
        &mut self,
        client: &XClient,
        reply_to: &str,
        text: &str,
        force: bool,
    ) -> Result<PostOutcome> {
        if !force {
            if let Decision::Blocked(reason) = self.can_post()? {
                return Ok(PostOutcome::Blocked(reason));
            }
        }

        match client.post(text, Some(reply_to)).await {
            Ok(posted) => {
                record_post(&mut self.state, Local::now(), &posted.id, text, None);
                self.save()?;
                tracing::info!(tweet_id = %posted.id, reply_to, "Posted reply");
                Ok(PostOutcome::Posted { tweet_id: posted.id, text: text.to_string() })
            }
            Err(e) => {
                tracing::error!(error = %e, reply_to, "Failed to post reply");
                Ok(PostOutcome::Failed { reason: client_failure_reason(e) })
            }
        }
    }

    /// Preview upcoming drafts, skipping calculators already posted today
    /// and starting over once every calculator has been used.
    pub async fn preview_next(&self, generator: &Generator, count: usize) -> Vec<GeneratedPost> {
        let slugs = next_slugs(generator.catalog(), &self.state.posted_slugs, count);
        let mut drafts = Vec::new();
        for slug in slugs {
            match generator.generate_post(Some(&slug), None, true).await {
                Ok(draft) => drafts.push(draft),
                Err(e) => tracing::warn!(error = %e, slug, "Preview draft failed"),
            }
        }
        drafts
    }
}

fn client_failure_reason(e: ClientError) -> String {
    e.to_string()
}

/// Pick the next `count` slugs in catalog order, skipping already-posted
/// ones until the catalog is exhausted, then starting the rotation over.
pub fn next_slugs(catalog: &Catalog, already_posted: &[String], count: usize) -> Vec<String> {
    let mut exclude: Vec<&str> = already_posted.iter().map(String::as_str).collect();
    let mut slugs = Vec::new();
    for _ in 0..count {
        let next = match catalog.items().iter().find(|c| !exclude.contains(&c.slug.as_str())) {
            Some(item) => Some(item),
            None => {
                exclude.clear();
                catalog.items().first()
            }
        };
        let Some(item) = next else { break };
        slugs.push(item.slug.clone());
        exclude.push(&item.slug);
    }
    slugs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn limits() -> QuotaLimits {
        QuotaLimits {
            max_posts_per_day: 10,
            min_hours_between_posts: 4.0,
            allowed_weekdays: vec![0, 1, 2, 3, 4],
        }
    }

    /// Monday 2026-08-24 10:00 local.
    fn monday_10am() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 8, 24, 10, 0, 0).unwrap()
    }

    #[test]
    fn fresh_state_can_post_on_a_weekday() {
        let mut state = PosterState::default();
        assert_eq!(evaluate(&mut state, &limits(), monday_10am()), Decision::CanPost);
    }

    #[test]
    fn rollover_resets_before_the_daily_limit_check() {
        let now = monday_10am();
        let mut state = PosterState {
            posts_today: 5,
            today_date: Some(now.date_naive() - Duration::days(1)),
            posted_slugs: vec!["tip-calculator".to_string()],
            ..Default::default()
        };
        // 5 posts "today" with the limit at 5, but the day marker is stale,
        // so the rollover must reset counters before the limit is evaluated.
        let mut l = limits();
        l.max_posts_per_day = 5;
        assert_eq!(evaluate(&mut state, &l, now), Decision::CanPost);
        assert_eq!(state.posts_today, 0);
        assert!(state.posted_slugs.is_empty());
        assert_eq!(state.today_date, Some(now.date_naive()));
    }

    #[test]
    fn daily_limit_blocks() {
        let now = monday_10am();
        let mut state = PosterState {
            posts_today: 10,
            today_date: Some(now.date_naive()),
            ..Default::default()
        };
        assert_eq!(
            evaluate(&mut state, &limits(), now),
            Decision::Blocked(BlockReason::DailyLimitReached { limit: 10 })
        );
    }

    #[test]
    fn spacing_block_reports_wait_minutes() {
        let now = monday_10am();
        let mut state = PosterState {
            last_post_time: Some(now - Duration::hours(1)),
            today_date: Some(now.date_naive()),
            ..Default::default()
        };
        // min 4h, 1h elapsed: wait ceil(3h * 60) = 180 minutes.
        assert_eq!(
            evaluate(&mut state, &limits(), now),
            Decision::Blocked(BlockReason::TooSoonSinceLastPost { wait_minutes: 180 })
        );
    }

    #[test]
    fn spacing_satisfied_after_min_hours() {
        let now = monday_10am();
        let mut state = PosterState {
            last_post_time: Some(now - Duration::hours(5)),
            today_date: Some(now.date_naive()),
            ..Default::default()
        };
        assert_eq!(evaluate(&mut state, &limits(), now), Decision::CanPost);
    }

    #[test]
    fn weekend_is_not_a_posting_day() {
        // Saturday 2026-08-29.
        let now = Local.with_ymd_and_hms(2026, 8, 29, 10, 0, 0).unwrap();
        let mut state = PosterState { today_date: Some(now.date_naive()), ..Default::default() };
        assert_eq!(
            evaluate(&mut state, &limits(), now),
            Decision::Blocked(BlockReason::NotAPostingDay { weekday: 5 })
        );
    }

    #[test]
    fn check_order_daily_limit_before_spacing() {
        let now = monday_10am();
        let mut state = PosterState {
            posts_today: 10,
            last_post_time: Some(now - Duration::hours(1)),
            today_date: Some(now.date_naive()),
            ..Default::default()
        };
        // Both conditions hold; the daily limit is checked first.
        assert_eq!(
            evaluate(&mut state, &limits(), now),
            Decision::Blocked(BlockReason::DailyLimitReached { limit: 10 })
        );
    }

    #[test]
    fn record_post_updates_all_counters() {
        let now = monday_10am();
        let mut state = PosterState::default();
        roll_over_day(&mut state, now.date_naive());
        record_post(&mut state, now, "123", "hello", Some("tip-calculator"));
        assert_eq!(state.posts_today, 1);
        assert_eq!(state.last_post_time, Some(now));
        assert_eq!(state.posted_slugs, vec!["tip-calculator"]);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].tweet_id, "123");
    }

    #[test]
    fn history_is_bounded_to_100_newest() {
        let now = monday_10am();
        let mut state = PosterState::default();
        for i in 0..105 {
            record_post(&mut state, now, &format!("id{i}"), "text", None);
        }
        assert_eq!(state.history.len(), 100);
        assert_eq!(state.history[0].tweet_id, "id5");
        assert_eq!(state.history[99].tweet_id, "id104");
    }

    #[test]
    fn next_slugs_skips_posted_and_wraps_around() {
        let catalog = Catalog::builtin();
        let total = catalog.items().len();
        let first = catalog.items()[0].slug.clone();
        let second = catalog.items()[1].slug.clone();

        // First slug already posted today: rotation starts at the second.
        let slugs = next_slugs(&catalog, std::slice::from_ref(&first), 2);
        assert_eq!(slugs[0], second);

        // Asking for more than the catalog holds wraps the rotation.
        let slugs = next_slugs(&catalog, &[], total + 1);
        assert_eq!(slugs.len(), total + 1);
        assert_eq!(slugs[total], first);
    }

    #[test]
    fn block_reason_strings_are_stable() {
        assert_eq!(
            BlockReason::TooSoonSinceLastPost { wait_minutes: 180 }.to_string(),
            "too soon since last post (wait 180 minutes)"
        );
        assert_eq!(
            BlockReason::DailyLimitReached { limit: 10 }.to_string(),
            "daily limit reached (10 posts)"
        );
    }

    #[test]
    fn poster_state_round_trips_through_store() {
        let store = crate::state::SqliteStore::in_memory().unwrap();
        let now = monday_10am();
        let mut state = PosterState::default();
        record_post(&mut state, now, "1", "text", Some("fire-calculator"));
        crate::state::save_doc(&store, DOC, &state).unwrap();
        let loaded: PosterState = crate::state::load_doc(&store, DOC).unwrap();
        assert_eq!(loaded.posts_today, 1);
        assert_eq!(loaded.last_post_time, Some(now));
        assert_eq!(loaded.posted_slugs, vec!["fire-calculator"]);
    }
}
