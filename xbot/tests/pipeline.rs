//! End-to-end pipeline tests against a real on-disk state store, without
//! touching the network: ingestion goes through `Monitor::ingest_keyword`
//! with hand-built tweets and a keyless (template-only) generator.

use std::sync::Arc;

use xbot::catalog::Catalog;
use xbot::client::Tweet;
use xbot::config::StyleConfig;
use xbot::filter::FilterLimits;
use xbot::generator::Generator;
use xbot::monitor::{Monitor, MonitorSettings};
use xbot::poster::{evaluate, record_post, Decision, PosterState, QuotaLimits};
use xbot::state::{JsonFileStore, StateStore};

use chrono::{Local, TimeZone};

fn generator(catalog: Arc<Catalog>) -> Generator {
    Generator::new(
        catalog,
        "https://boring-math.com".to_string(),
        "gpt-4o-mini".to_string(),
        StyleConfig::default(),
        None,
    )
}

fn settings() -> MonitorSettings {
    MonitorSettings {
        keywords: vec!["mortgage calculator".to_string()],
        limits: FilterLimits { min_followers: 10, min_likes: 0, min_retweets: 0 },
        blacklist: vec!["spammer".to_string()],
    }
}

fn tweet(id: &str, text: &str, author: &str, followers: u64, likes: u64) -> Tweet {
    Tweet {
        id: id.to_string(),
        text: text.to_string(),
        author_id: format!("u-{id}"),
        author_username: author.to_string(),
        author_followers: followers,
        like_count: likes,
        retweet_count: 0,
        reply_count: 1,
        created_at: "2026-08-24T10:00:00.000Z".to_string(),
        conversation_id: None,
    }
}

#[tokio::test]
async fn monitor_pipeline_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(dir.path()).unwrap());
    let catalog = Arc::new(Catalog::builtin());
    let r#gen = generator(Arc::clone(&catalog));

    let tweets = vec![
        tweet("t1", "any good mortgage calculator out there?", "alice", 5000, 12),
        tweet("t2", "mortgage rates are brutal", "spammer", 9000, 40),
        tweet("t3", "thinking about overpaying my mortgage", "bob", 3, 2),
    ];

    let found = {
        let mut monitor =
            Monitor::load(settings(), Arc::clone(&catalog), Arc::clone(&store)).unwrap();
        let batch = monitor
            .ingest_keyword(&r#gen, "mortgage calculator", "mortgage-calculator", tweets, 5)
            .await;
        monitor.finish_scan(batch).unwrap()
    };

    // t2 is blacklisted, t3 under the follower floor.
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tweet.id, "t1");
    assert_eq!(found[0].suggested_slug, "mortgage-calculator");
    assert!(found[0].suggested_reply.contains("/calculators/mortgage-calculator"));
    // Question mark plus engagement lifts it above the 0.5 baseline.
    assert!(found[0].relevance_score > 0.5);

    // Fresh Monitor from the same store: opportunity survives, reply sticks.
    let mut monitor =
        Monitor::load(settings(), Arc::clone(&catalog), Arc::clone(&store)).unwrap();
    let pending = monitor.pending_opportunities();
    assert_eq!(pending.len(), 1);
    monitor.mark_replied("t1").unwrap();
    assert!(monitor.pending_opportunities().is_empty());

    let monitor = Monitor::load(settings(), catalog, store).unwrap();
    assert!(monitor.pending_opportunities().is_empty());
    assert_eq!(monitor.stats().tweets_replied, 1);
}

#[tokio::test]
async fn seen_tweets_are_not_reingested_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(dir.path()).unwrap());
    let catalog = Arc::new(Catalog::builtin());
    let r#gen = generator(Arc::clone(&catalog));

    let first = vec![tweet("t1", "mortgage calculator recs?", "alice", 5000, 12)];
    {
        let mut monitor =
            Monitor::load(settings(), Arc::clone(&catalog), Arc::clone(&store)).unwrap();
        let batch = monitor
            .ingest_keyword(&r#gen, "mortgage calculator", "mortgage-calculator", first, 5)
            .await;
        monitor.finish_scan(batch).unwrap();
    }

    // Same tweet again in a new process: filtered as already seen.
    let again = vec![tweet("t1", "mortgage calculator recs?", "alice", 5000, 12)];
    let mut monitor = Monitor::load(settings(), Arc::clone(&catalog), store).unwrap();
    let batch = monitor
        .ingest_keyword(&r#gen, "mortgage calculator", "mortgage-calculator", again, 5)
        .await;
    assert!(batch.is_empty());
}

#[test]
fn quota_gate_tracks_posts_through_the_day() {
    let limits = QuotaLimits {
        max_posts_per_day: 2,
        min_hours_between_posts: 1.0,
        allowed_weekdays: vec![0, 1, 2, 3, 4],
    };
    // Monday.
    let mut now = Local.with_ymd_and_hms(2026, 8, 24, 9, 0, 0).unwrap();
    let mut state = PosterState::default();

    assert!(matches!(evaluate(&mut state, &limits, now), Decision::CanPost));
    record_post(&mut state, now, "id1", "first", Some("tip-calculator"));

    // Too soon.
    now += chrono::Duration::minutes(30);
    assert!(matches!(evaluate(&mut state, &limits, now), Decision::Blocked(_)));

    // Spacing satisfied.
    now += chrono::Duration::minutes(31);
    assert!(matches!(evaluate(&mut state, &limits, now), Decision::CanPost));
    record_post(&mut state, now, "id2", "second", Some("bmi-calculator"));

    // Daily cap.
    now += chrono::Duration::hours(2);
    assert!(matches!(evaluate(&mut state, &limits, now), Decision::Blocked(_)));

    // Next day resets the count.
    let tomorrow = Local.with_ymd_and_hms(2026, 8, 25, 9, 0, 0).unwrap();
    assert!(matches!(evaluate(&mut state, &limits, tomorrow), Decision::CanPost));
    assert_eq!(state.posts_today, 0);
    assert_eq!(state.history.len(), 2);
}
