//! xbot: X/Twitter promotion bot for the Boring Math calculators.
//!
//! Subcommands:
//!
//!   status     - check API connection, posting quota and monitor stats
//!   generate   - preview generated tweets (doesn't post)
//!   post       - post a tweet (generated or given text)
//!   monitor    - search X for reply opportunities
//!   reply      - work through pending opportunities interactively
//!   preview    - preview the upcoming posting rotation
//!   run        - scheduled posting + monitoring loop
//!
//! X credentials come from X_BEARER_TOKEN / X_ACCESS_TOKEN; the LLM key from
//! OPENAI_API_KEY (optional; templates are used without it).

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};

use xbot::catalog::Catalog;
use xbot::client::{Credentials, XClient};
use xbot::config::{Config, StateBackend};
use xbot::filter::FilterLimits;
use xbot::generator::Generator;
use xbot::monitor::{Monitor, MonitorSettings};
use xbot::output;
use xbot::poster::{Decision, PostOutcome, Poster, QuotaLimits};
use xbot::state::{JsonFileStore, SqliteStore, StateStore};

#[derive(Parser)]
#[command(name = "xbot", about = "X/Twitter promotion bot for Boring Math calculators")]
struct Args {
    /// Config file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// X app bearer token (search)
    #[arg(long, env = "X_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// X OAuth2 user access token (posting)
    #[arg(long, env = "X_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// OpenAI API key (optional; templates used when unset)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check API connection and current status
    Status,
    /// Generate tweet content (preview only, doesn't post)
    Generate {
        /// Number of tweets to generate
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,
        /// Specific calculator slug
        #[arg(short, long)]
        calculator: Option<String>,
        /// Use templates only (no LLM)
        #[arg(long)]
        no_llm: bool,
    },
    /// Post a tweet
    Post {
        /// Custom tweet text
        #[arg(short, long)]
        text: Option<String>,
        /// Calculator to promote
        #[arg(short, long)]
        calculator: Option<String>,
        /// Bypass rate limits
        #[arg(long)]
        force: bool,
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Search for engagement opportunities
    Monitor {
        /// Specific keywords to search (default: all catalog keywords)
        #[arg(short, long)]
        keyword: Vec<String>,
        /// Max results per keyword
        #[arg(short = 'n', long, default_value_t = 5)]
        limit: usize,
    },
    /// Interactive reply mode for pending opportunities
    Reply {
        /// Auto-approve opportunities with relevance >= 0.8
        #[arg(long)]
        auto: bool,
    },
    /// Preview the next scheduled tweets
    Preview,
    /// Run the bot (posts + monitors on schedule)
    Run {
        /// Don't actually post
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xbot=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let catalog = Arc::new(match &config.catalog_path {
        Some(path) => Catalog::from_file(path)?,
        None => Catalog::builtin(),
    });

    let store = open_store(&config)?;
    let generator = Generator::new(
        Arc::clone(&catalog),
        config.site.url.clone(),
        config.generator.model.clone(),
        config.generator.style.clone(),
        args.openai_api_key.clone(),
    );

    match &args.command {
        Command::Status => {
            let client = require_client(&args)?;
            cmd_status(&config, &catalog, store, &client).await
        }
        Command::Generate { count, calculator, no_llm } => {
            cmd_generate(&generator, *count, calculator.as_deref(), *no_llm).await
        }
        Command::Post { text, calculator, force, yes } => {
            let client = require_client(&args)?;
            cmd_post(
                &config,
                store,
                &client,
                &generator,
                text.clone(),
                calculator.as_deref(),
                *force,
                *yes,
            )
            .await
        }
        Command::Monitor { keyword, limit } => {
            let client = require_client(&args)?;
            cmd_monitor(&config, &catalog, store, &client, &generator, keyword, *limit).await
        }
        Command::Reply { auto } => {
            let client = require_client(&args)?;
            cmd_reply(&config, &catalog, store, &client, *auto).await
        }
        Command::Preview => cmd_preview(&config, store, &generator).await,
        Command::Run { dry_run } => {
            let client = require_client(&args)?;
            cmd_run(&config, &catalog, store, &client, &generator, *dry_run).await
        }
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn StateStore>> {
    let dir = config.state_dir();
    match config.state.backend {
        StateBackend::File => Ok(Arc::new(JsonFileStore::new(&dir)?)),
        StateBackend::Sqlite => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create state dir {}", dir.display()))?;
            Ok(Arc::new(SqliteStore::open(&dir.join("state.db"))?))
        }
    }
}

fn require_client(args: &Args) -> Result<XClient> {
    let bearer_token = args
        .bearer_token
        .clone()
        .context("Missing X credentials: set X_BEARER_TOKEN")?;
    let access_token = args
        .access_token
        .clone()
        .context("Missing X credentials: set X_ACCESS_TOKEN")?;
    Ok(XClient::new(Credentials { bearer_token, access_token })?)
}

fn quota_limits(config: &Config) -> QuotaLimits {
    QuotaLimits {
        max_posts_per_day: config.rate_limits.max_posts_per_day,
        min_hours_between_posts: config.poster.min_hours_between_posts,
        allowed_weekdays: config.poster.days.clone(),
    }
}

fn monitor_settings(config: &Config, catalog: &Catalog) -> MonitorSettings {
    let keywords = if config.monitor.keywords.is_empty() {
        catalog.all_keywords()
    } else {
        config.monitor.keywords.clone()
    };
    MonitorSettings {
        keywords,
        limits: FilterLimits {
            min_followers: config.monitor.min_follower_count,
            min_likes: config.monitor.min_likes,
            min_retweets: config.monitor.min_retweets,
        },
        blacklist: config.monitor.blacklist.clone(),
    }
}

async fn cmd_status(
    config: &Config,
    catalog: &Arc<Catalog>,
    store: Arc<dyn StateStore>,
    client: &XClient,
) -> Result<()> {
    println!("\nChecking X API connection...");
    let info = client
        .verify_credentials()
        .await
        .context("Connection failed, check your X API credentials")?;
    output::panel(
        "API status",
        &format!(
            "Connected\n\nAccount: @{}\nName: {}\nFollowers: {}",
            info.username, info.name, info.followers
        ),
    );

    let mut poster = Poster::load(quota_limits(config), Arc::clone(&store))?;
    output::poster_status(&poster.status()?);

    let monitor = Monitor::load(monitor_settings(config, catalog), Arc::clone(catalog), store)?;
    output::monitor_stats(&monitor.stats());
    Ok(())
}

async fn cmd_generate(
    generator: &Generator,
    count: usize,
    calculator: Option<&str>,
    no_llm: bool,
) -> Result<()> {
    println!("\nGenerating {count} tweets...\n");
    for i in 1..=count {
        let post = generator.generate_post(calculator, None, !no_llm).await?;
        output::generated_post(i, &post);
    }
    Ok(())
}

async fn cmd_post(
    config: &Config,
    store: Arc<dyn StateStore>,
    client: &XClient,
    generator: &Generator,
    text: Option<String>,
    calculator: Option<&str>,
    force: bool,
    yes: bool,
) -> Result<()> {
    let mut poster = Poster::load(quota_limits(config), store)?;

    if !force {
        if let Decision::Blocked(reason) = poster.can_post()? {
            println!("Cannot post: {reason}");
            println!("Use --force to bypass");
            return Ok(());
        }
    }

    let draft = if text.is_none() {
        let post = generator.generate_post(calculator, None, true).await?;
        output::panel(
            "Generated tweet",
            &format!("{}\n\nCalculator: {}", post.text, post.name),
        );
        Some(post)
    } else {
        output::panel("Tweet to post", text.as_deref().unwrap_or_default());
        None
    };

    if !yes && !confirm("Post this tweet? [y/N] ")? {
        println!("Cancelled");
        return Ok(());
    }

    match poster.post(client, generator, draft, text, force).await? {
        PostOutcome::Posted { tweet_id, .. } => {
            println!("\nPosted!");
            println!("Tweet ID: {tweet_id}");
            println!("URL: https://x.com/i/status/{tweet_id}");
        }
        PostOutcome::Blocked(reason) => println!("\nCannot post: {reason}"),
        PostOutcome::Failed { reason } => println!("\nFailed: {reason}"),
    }
    Ok(())
}

async fn cmd_monitor(
    config: &Config,
    catalog: &Arc<Catalog>,
    store: Arc<dyn StateStore>,
    client: &XClient,
    generator: &Generator,
    keywords: &[String],
    limit: usize,
) -> Result<()> {
    let mut monitor =
        Monitor::load(monitor_settings(config, catalog), Arc::clone(catalog), store)?;

    println!("\nSearching for opportunities...\n");
    let selected = if keywords.is_empty() { None } else { Some(keywords) };
    let opportunities = monitor
        .search_opportunities(client, generator, selected, limit)
        .await?;

    if opportunities.is_empty() {
        println!("No opportunities found");
        return Ok(());
    }

    println!("Found {} opportunities\n", opportunities.len());
    for (i, opp) in opportunities.iter().take(10).enumerate() {
        output::opportunity(i + 1, opp);
    }
    Ok(())
}

async fn cmd_reply(
    config: &Config,
    catalog: &Arc<Catalog>,
    store: Arc<dyn StateStore>,
    client: &XClient,
    auto: bool,
) -> Result<()> {
    let mut monitor = Monitor::load(
        monitor_settings(config, catalog),
        Arc::clone(catalog),
        Arc::clone(&store),
    )?;
    let mut poster = Poster::load(quota_limits(config), store)?;

    let pending = monitor.pending_opportunities();
    if pending.is_empty() {
        println!("No pending opportunities. Run 'monitor' first.");
        return Ok(());
    }

    println!("\n{} pending opportunities\n", pending.len());

    for opp in pending {
        if let Decision::Blocked(reason) = poster.can_post()? {
            println!("Rate limit: {reason}");
            break;
        }

        output::opportunity(1, &opp);

        let action = if auto && opp.relevance_score >= 0.8 {
            "y".to_string()
        } else {
            prompt("[y]es / [n]o / [e]dit / [s]kip all: ")?
        };

        match action.as_str() {
            "s" => break,
            "y" => {
                send_reply(&mut poster, &mut monitor, client, &opp.tweet.id, &opp.suggested_reply)
                    .await?;
            }
            "e" => {
                let edited = prompt("Enter reply (empty keeps the suggestion): ")?;
                let text = if edited.is_empty() { opp.suggested_reply.clone() } else { edited };
                send_reply(&mut poster, &mut monitor, client, &opp.tweet.id, &text).await?;
            }
            _ => {}
        }
        println!();
    }
    Ok(())
}

async fn send_reply(
    poster: &mut Poster,
    monitor: &mut Monitor,
    client: &XClient,
    tweet_id: &str,
    text: &str,
) -> Result<()> {
    match poster.reply(client, tweet_id, text, false).await? {
        PostOutcome::Posted { .. } => {
            println!("Replied!");
            monitor.mark_replied(tweet_id)?;
        }
        PostOutcome::Blocked(reason) => println!("Cannot reply: {reason}"),
        PostOutcome::Failed { reason } => println!("Failed: {reason}"),
    }
    Ok(())
}

async fn cmd_preview(
    config: &Config,
    store: Arc<dyn StateStore>,
    generator: &Generator,
) -> Result<()> {
    let poster = Poster::load(quota_limits(config), store)?;
    println!("\nNext scheduled tweets:\n");
    for (i, post) in poster.preview_next(generator, 5).await.iter().enumerate() {
        output::panel(
            &format!("Queue position {}", i + 1),
            &format!("{}\n\nCalculator: {}", post.text, post.name),
        );
        println!();
    }
    Ok(())
}

async fn cmd_run(
    config: &Config,
    catalog: &Arc<Catalog>,
    store: Arc<dyn StateStore>,
    client: &XClient,
    generator: &Generator,
    dry_run: bool,
) -> Result<()> {
    let mut poster = Poster::load(quota_limits(config), Arc::clone(&store))?;
    let mut monitor = Monitor::load(
        monitor_settings(config, catalog),
        Arc::clone(catalog),
        store,
    )?;

    let check_interval = std::time::Duration::from_secs(config.monitor.check_interval * 60);
    let mut last_monitor: Option<tokio::time::Instant> = None;
    // Schedule slots already fired today, pruned on day change.
    let mut fired: HashSet<(NaiveDate, String)> = HashSet::new();

    for slot in &config.poster.schedule {
        tracing::info!(slot, "Scheduled post");
    }
    tracing::info!(
        minutes = config.monitor.check_interval,
        "Scheduled monitoring"
    );
    println!("Bot running. Ctrl+C to stop.");

    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
    loop {
        ticker.tick().await;
        let now = Local::now();
        let today = now.date_naive();
        let hhmm = now.format("%H:%M").to_string();

        fired.retain(|(date, _)| *date == today);

        // Jobs run serially, each to completion, before the next tick.
        if config.poster.schedule.contains(&hhmm) && !fired.contains(&(today, hhmm.clone())) {
            fired.insert((today, hhmm.clone()));
            post_job(&mut poster, client, generator, dry_run).await;
        }

        let monitor_due = last_monitor.map_or(true, |t| t.elapsed() >= check_interval);
        if monitor_due {
            last_monitor = Some(tokio::time::Instant::now());
            monitor_job(&mut monitor, client, generator, config.monitor.max_per_keyword).await;
        }
    }
}

async fn post_job(poster: &mut Poster, client: &XClient, generator: &Generator, dry_run: bool) {
    if dry_run {
        tracing::info!("Dry run: would post a tweet");
        return;
    }
    match poster.post(client, generator, None, None, false).await {
        Ok(PostOutcome::Posted { tweet_id, .. }) => tracing::info!(tweet_id, "Posted"),
        Ok(PostOutcome::Blocked(reason)) => tracing::info!(%reason, "Post blocked"),
        Ok(PostOutcome::Failed { reason }) => tracing::warn!(reason, "Post failed"),
        Err(e) => tracing::error!(error = %e, "Post job error"),
    }
}

async fn monitor_job(
    monitor: &mut Monitor,
    client: &XClient,
    generator: &Generator,
    max_per_keyword: usize,
) {
    match monitor
        .search_opportunities(client, generator, None, max_per_keyword)
        .await
    {
        Ok(found) if !found.is_empty() => {
            tracing::info!(count = found.len(), "Found opportunities")
        }
        Ok(_) => tracing::debug!("No new opportunities"),
        Err(e) => tracing::error!(error = %e, "Monitor job error"),
    }
}

fn prompt(question: &str) -> Result<String> {
    print!("{question}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn confirm(question: &str) -> Result<bool> {
    let answer = prompt(question)?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}
