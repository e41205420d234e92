//! Opportunity monitoring: the pipeline that turns search results into
//! triaged reply opportunities.
//!
//! Per keyword: resolve the calculator, fetch recent tweets, admit through
//! the filter, score, draft a suggested reply, and mark the tweet seen.
//! Results are ranked by relevance (stable, discovery order breaks ties)
//! and persisted with bounded retention. Seen and replied are one-way
//! transitions.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::client::{Tweet, XClient};
use crate::filter::{self, FilterLimits};
use crate::generator::Generator;
use crate::relevance::relevance;
use crate::state::{self, StateStore};

/// Document name in the state store.
const DOC: &str = "monitor_state";

/// Retention bounds: most-recent-N kept, oldest evicted first.
const MAX_SEEN: usize = 500;
const MAX_REPLIED: usize = 200;
/// Stored opportunities are ranked, so the bound keeps the top N.
const MAX_OPPORTUNITIES: usize = 50;

/// An admitted, scored tweet paired with a suggested reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub tweet: Tweet,
    pub matched_keyword: String,
    pub suggested_slug: String,
    pub suggested_reply: String,
    pub relevance_score: f64,
}

/// Durable monitor state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorState {
    pub seen_ids: Vec<String>,
    pub replied_ids: Vec<String>,
    pub last_search: BTreeMap<String, DateTime<Local>>,
    pub opportunities: Vec<Opportunity>,
}

impl MonitorState {
    /// Record a tweet as seen. One-way: ids are never removed except by
    /// retention eviction.
    pub fn mark_seen(&mut self, id: &str) {
        if !self.seen_ids.iter().any(|s| s == id) {
            self.seen_ids.push(id.to_string());
        }
    }

    pub fn mark_replied(&mut self, id: &str) {
        if !self.replied_ids.iter().any(|s| s == id) {
            self.replied_ids.push(id.to_string());
        }
    }

    /// Apply retention bounds, oldest entries evicted first.
    pub fn enforce_retention(&mut self) {
        if self.seen_ids.len() > MAX_SEEN {
            let excess = self.seen_ids.len() - MAX_SEEN;
            self.seen_ids.drain(..excess);
        }
        if self.replied_ids.len() > MAX_REPLIED {
            let excess = self.replied_ids.len() - MAX_REPLIED;
            self.replied_ids.drain(..excess);
        }
        self.opportunities.truncate(MAX_OPPORTUNITIES);
    }
}

/// Monitor settings, from config (keywords already defaulted to the full
/// catalog set by the caller when unset).
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub keywords: Vec<String>,
    pub limits: FilterLimits,
    pub blacklist: Vec<String>,
}

/// Monitoring statistics for the CLI.
#[derive(Debug, Clone)]
pub struct MonitorStats {
    pub keywords_monitored: usize,
    pub tweets_seen: usize,
    pub tweets_replied: usize,
    pub pending_opportunities: usize,
    pub last_searches: BTreeMap<String, DateTime<Local>>,
}

pub struct Monitor {
    settings: MonitorSettings,
    catalog: Arc<Catalog>,
    store: Arc<dyn StateStore>,
    state: MonitorState,
}

impl Monitor {
    pub fn load(
        settings: MonitorSettings,
        catalog: Arc<Catalog>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let state = state::load_doc(store.as_ref(), DOC)?;
        Ok(Self { settings, catalog, store, state })
    }

    fn save(&self) -> Result<()> {
        state::save_doc(self.store.as_ref(), DOC, &self.state)
    }

    /// Search every keyword for engagement opportunities.
    ///
    /// A failed search or an unmapped keyword skips that keyword, never the
    /// whole scan. Returns the ranked opportunities; the top
    /// `MAX_OPPORTUNITIES` are persisted.
    pub async fn search_opportunities(
        &mut self,
        client: &XClient,
        generator: &Generator,
        keywords: Option<&[String]>,
        max_per_keyword: usize,
    ) -> Result<Vec<Opportunity>> {
        let keywords: Vec<String> = keywords
            .map(|k| k.to_vec())
            .unwrap_or_else(|| self.settings.keywords.clone());

        let mut found = Vec::new();
        for keyword in &keywords {
            let Some(item) = self.catalog.resolve(keyword) else {
                tracing::warn!(keyword, "No calculator mapped for keyword");
                continue;
            };
            let slug = item.slug.clone();

            // Fetch extra to leave headroom for filtering.
            let tweets = match client
                .search_recent(
                    keyword,
                    max_per_keyword * 2,
                    self.settings.limits.min_likes,
                    self.settings.limits.min_retweets,
                )
                .await
            {
                Ok(tweets) => tweets,
                Err(e) => {
                    tracing::error!(keyword, error = %e, "Search failed");
                    continue;
                }
            };

            let batch = self
                .ingest_keyword(generator, keyword, &slug, tweets, max_per_keyword)
                .await;
            found.extend(batch);
        }

        let ranked = self.finish_scan(found)?;
        tracing::info!(count = ranked.len(), "Found opportunities");
        Ok(ranked)
    }

    /// Filter, score and record one keyword's search results.
    pub async fn ingest_keyword(
        &mut self,
        generator: &Generator,
        keyword: &str,
        slug: &str,
        tweets: Vec<Tweet>,
        max: usize,
    ) -> Vec<Opportunity> {
        let mut batch = Vec::new();

        for tweet in tweets.into_iter().take(max) {
            if let Err(reason) = filter::admit(
                &tweet,
                &self.settings.blacklist,
                &self.settings.limits,
                &self.state.seen_ids,
                &self.state.replied_ids,
            ) {
                tracing::debug!(tweet_id = %tweet.id, %reason, "Skipping tweet");
                continue;
            }

            let suggested_reply = match generator.generate_reply(&tweet.text, slug).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(tweet_id = %tweet.id, error = %e, "Reply draft failed");
                    continue;
                }
            };

            let score = relevance(&tweet, keyword);
            self.state.mark_seen(&tweet.id);
            batch.push(Opportunity {
                tweet,
                matched_keyword: keyword.to_string(),
                suggested_slug: slug.to_string(),
                suggested_reply,
                relevance_score: score,
            });
        }

        self.state.last_search.insert(keyword.to_string(), Local::now());
        batch
    }

    /// Rank a scan's opportunities and persist the monitor state.
    pub fn finish_scan(&mut self, mut found: Vec<Opportunity>) -> Result<Vec<Opportunity>> {
        // Stable sort: equal scores keep discovery order.
        found.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.state.opportunities = found.clone();
        self.state.enforce_retention();
        self.save()?;
        Ok(found)
    }

    /// Stored opportunities not yet replied to.
    pub fn pending_opportunities(&self) -> Vec<Opportunity> {
        self.state
            .opportunities
            .iter()
            .filter(|o| !self.state.replied_ids.iter().any(|id| *id == o.tweet.id))
            .cloned()
            .collect()
    }

    /// Durably mark a tweet as replied to.
    pub fn mark_replied(&mut self, tweet_id: &str) -> Result<()> {
        self.state.mark_replied(tweet_id);
        self.state.enforce_retention();
        self.save()
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            keywords_monitored: self.settings.keywords.len(),
            tweets_seen: self.state.seen_ids.len(),
            tweets_replied: self.state.replied_ids.len(),
            pending_opportunities: self.pending_opportunities().len(),
            last_searches: self.state.last_search.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StyleConfig;
    use crate::state::SqliteStore;

    fn tweet(id: &str, author: &str, text: &str, likes: u64) -> Tweet {
        Tweet {
            id: id.to_string(),
            text: text.to_string(),
            author_id: format!("u-{author}"),
            author_username: author.to_string(),
            author_followers: 100,
            like_count: likes,
            retweet_count: 0,
            reply_count: 0,
            created_at: "2026-08-01T10:00:00Z".to_string(),
            conversation_id: None,
        }
    }

    fn monitor(blacklist: Vec<String>) -> Monitor {
        let catalog = Arc::new(Catalog::builtin());
        let settings = MonitorSettings {
            keywords: catalog.all_keywords(),
            limits: FilterLimits { min_followers: 10, min_likes: 0, min_retweets: 0 },
            blacklist,
        };
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        Monitor::load(settings, catalog, store).unwrap()
    }

    fn generator() -> Generator {
        Generator::new(
            Arc::new(Catalog::builtin()),
            "https://boring-math.com".to_string(),
            "gpt-4o-mini".to_string(),
            StyleConfig::default(),
            None, // no API key: replies come from templates, offline
        )
    }

    #[tokio::test]
    async fn blacklisted_author_never_reaches_pending() {
        let mut m = monitor(vec!["spambot".to_string()]);
        let g = generator();
        let tweets = vec![
            tweet("1", "SpamBot", "need a mortgage calculator?", 5),
            tweet("2", "alice", "need a mortgage calculator?", 5),
        ];
        let batch = m
            .ingest_keyword(&g, "mortgage calculator", "mortgage-calculator", tweets, 5)
            .await;
        m.finish_scan(batch).unwrap();

        let pending = m.pending_opportunities();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].tweet.id, "2");
    }

    #[tokio::test]
    async fn seen_tweets_are_not_ingested_twice() {
        let mut m = monitor(vec![]);
        let g = generator();
        let first = m
            .ingest_keyword(
                &g,
                "tip calculator",
                "tip-calculator",
                vec![tweet("1", "alice", "tip calculator?", 0)],
                5,
            )
            .await;
        assert_eq!(first.len(), 1);

        let second = m
            .ingest_keyword(
                &g,
                "tip calculator",
                "tip-calculator",
                vec![tweet("1", "alice", "tip calculator?", 0)],
                5,
            )
            .await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn opportunities_are_ranked_with_stable_ties() {
        let mut m = monitor(vec![]);
        let g = generator();
        // "low" scores 0.5; "high-1"/"high-2" both score 0.7 (question mark)
        // and must keep their discovery order.
        let tweets = vec![
            tweet("low", "alice", "thinking about bills", 0),
            tweet("high-1", "bob", "how do i split this?", 0),
            tweet("high-2", "carol", "what do i tip here?", 0),
        ];
        let batch = m
            .ingest_keyword(&g, "tip calculator", "tip-calculator", tweets, 5)
            .await;
        let ranked = m.finish_scan(batch).unwrap();

        let ids: Vec<&str> = ranked.iter().map(|o| o.tweet.id.as_str()).collect();
        assert_eq!(ids, vec!["high-1", "high-2", "low"]);
    }

    #[tokio::test]
    async fn mark_replied_removes_from_pending_durably() {
        let mut m = monitor(vec![]);
        let g = generator();
        let batch = m
            .ingest_keyword(
                &g,
                "bmi calculator",
                "bmi-calculator",
                vec![tweet("1", "alice", "bmi calculator?", 0)],
                5,
            )
            .await;
        m.finish_scan(batch).unwrap();
        assert_eq!(m.pending_opportunities().len(), 1);

        m.mark_replied("1").unwrap();
        assert!(m.pending_opportunities().is_empty());

        // Reload from the same store: the transition survived.
        let store = Arc::clone(&m.store);
        let m2 = Monitor::load(m.settings.clone(), Arc::clone(&m.catalog), store).unwrap();
        assert!(m2.pending_opportunities().is_empty());
        assert_eq!(m2.state.replied_ids, vec!["1"]);
    }

    #[test]
    fn seen_retention_keeps_newest_500() {
        let mut state = MonitorState::default();
        for i in 0..501 {
            state.mark_seen(&format!("id{i}"));
        }
        state.enforce_retention();
        assert_eq!(state.seen_ids.len(), 500);
        assert!(!state.seen_ids.iter().any(|s| s == "id0"));
        assert_eq!(state.seen_ids.last().map(String::as_str), Some("id500"));
    }

    #[test]
    fn replied_retention_keeps_newest_200() {
        let mut state = MonitorState::default();
        for i in 0..250 {
            state.mark_replied(&format!("id{i}"));
        }
        state.enforce_retention();
        assert_eq!(state.replied_ids.len(), 200);
        assert_eq!(state.replied_ids.first().map(String::as_str), Some("id50"));
    }

    #[tokio::test]
    async fn stats_reflect_state() {
        let mut m = monitor(vec![]);
        let g = generator();
        let batch = m
            .ingest_keyword(
                &g,
                "bbq calculator",
                "bbq-calculator",
                vec![
                    tweet("1", "alice", "how much meat bbq?", 0),
                    tweet("2", "bob", "bbq this weekend", 0),
                ],
                5,
            )
            .await;
        m.finish_scan(batch).unwrap();
        m.mark_replied("1").unwrap();

        let stats = m.stats();
        assert_eq!(stats.tweets_seen, 2);
        assert_eq!(stats.tweets_replied, 1);
        assert_eq!(stats.pending_opportunities, 1);
        assert!(stats.last_searches.contains_key("bbq calculator"));
    }
}
