//! X API v2 client.
//!
//! Thin wrapper over the HTTP API: verify credentials, post tweets and
//! replies, search recent tweets. Search uses the app bearer token, posting
//! uses an OAuth2 user-context access token. Length validation happens
//! before any network call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const API_BASE: &str = "https://api.x.com/2";
const MAX_TWEET_CHARS: usize = 280;

/// A tweet as observed through search. Immutable snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_username: String,
    pub author_followers: u64,
    pub like_count: u64,
    pub retweet_count: u64,
    pub reply_count: u64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Authenticated account info from `verify_credentials`.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub id: String,
    pub username: String,
    pub name: String,
    pub followers: u64,
}

/// A successfully created tweet.
#[derive(Debug, Clone)]
pub struct PostedTweet {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited by the X API")]
    RateLimit,
    #[error("tweet too long: {len} chars (max {MAX_TWEET_CHARS})")]
    TooLong { len: usize },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected X API response: {0}")]
    Api(String),
}

/// X API credentials. Both tokens are required; missing ones are a fatal
/// configuration error, caught at construction.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// App bearer token (search, lookups).
    pub bearer_token: String,
    /// OAuth2 user-context token (posting).
    pub access_token: String,
}

pub struct XClient {
    creds: Credentials,
    http: reqwest::Client,
}

// ── API response shapes ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct MeResponse {
    data: MeData,
}

#[derive(Debug, Deserialize)]
struct MeData {
    id: String,
    username: String,
    name: String,
    #[serde(default)]
    public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetrics {
    #[serde(default)]
    followers_count: u64,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<ApiTweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    public_metrics: TweetMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct TweetMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
    #[serde(default)]
    public_metrics: Option<UserMetrics>,
}

impl XClient {
    pub fn new(creds: Credentials) -> Result<Self, ClientError> {
        if creds.bearer_token.trim().is_empty() {
            return Err(ClientError::Auth("missing X bearer token".to_string()));
        }
        if creds.access_token.trim().is_empty() {
            return Err(ClientError::Auth("missing X access token".to_string()));
        }
        Ok(Self { creds, http: reqwest::Client::new() })
    }

    /// Map an error status to a structured client error.
    async fn status_error(resp: reqwest::Response) -> ClientError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => ClientError::Auth(format!("X API {status}: {body}")),
            429 => ClientError::RateLimit,
            _ => ClientError::Api(format!("X API {status}: {body}")),
        }
    }

    /// Verify credentials and return the authenticated account.
    pub async fn verify_credentials(&self) -> Result<AccountInfo, ClientError> {
        let resp = self
            .http
            .get(format!("{API_BASE}/users/me"))
            .bearer_auth(&self.creds.access_token)
            .query(&[("user.fields", "public_metrics")])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp).await);
        }

        let me: MeResponse = resp.json().await?;
        Ok(AccountInfo {
            id: me.data.id,
            username: me.data.username,
            name: me.data.name,
            followers: me.data.public_metrics.unwrap_or_default().followers_count,
        })
    }

    /// Post a tweet, optionally as a reply.
    ///
    /// Over-length text is rejected locally, before any network call.
    pub async fn post(
        &self,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<PostedTweet, ClientError> {
        let len = text.chars().count();
        if len > MAX_TWEET_CHARS {
            return Err(ClientError::TooLong { len });
        }

        let mut body = serde_json::json!({ "text": text });
        if let Some(id) = reply_to {
            body["reply"] = serde_json::json!({ "in_reply_to_tweet_id": id });
        }

        let resp = self
            .http
            .post(format!("{API_BASE}/tweets"))
            .bearer_auth(&self.creds.access_token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp).await);
        }

        let created: CreateTweetResponse = resp.json().await?;
        tracing::info!(tweet_id = %created.data.id, "Posted tweet");
        Ok(PostedTweet { id: created.data.id, text: text.to_string() })
    }

    /// Search recent tweets (last 7 days) for a keyword.
    ///
    /// Retweets, replies and non-English tweets are excluded by query
    /// convention. Minimum like/retweet thresholds are applied client-side.
    pub async fn search_recent(
        &self,
        query: &str,
        max_results: usize,
        min_likes: u64,
        min_retweets: u64,
    ) -> Result<Vec<Tweet>, ClientError> {
        let full_query = format!("{query} -is:retweet -is:reply lang:en");
        let max = max_results.clamp(10, 100).to_string();

        let resp = self
            .http
            .get(format!("{API_BASE}/tweets/search/recent"))
            .bearer_auth(&self.creds.bearer_token)
            .query(&[
                ("query", full_query.as_str()),
                ("max_results", max.as_str()),
                ("tweet.fields", "public_metrics,created_at,conversation_id"),
                ("user.fields", "public_metrics,username"),
                ("expansions", "author_id"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp).await);
        }

        let search: SearchResponse = resp.json().await?;
        let tweets = assemble_results(search, min_likes, min_retweets);
        tracing::debug!(query, count = tweets.len(), "Search complete");
        Ok(tweets)
    }
}

/// Join tweets with their author records and apply engagement thresholds.
fn assemble_results(search: SearchResponse, min_likes: u64, min_retweets: u64) -> Vec<Tweet> {
    let users = &search.includes.users;
    search
        .data
        .into_iter()
        .filter(|t| {
            t.public_metrics.like_count >= min_likes
                && t.public_metrics.retweet_count >= min_retweets
        })
        .map(|t| {
            let author = users.iter().find(|u| u.id == t.author_id);
            Tweet {
                id: t.id,
                text: t.text,
                author_username: author
                    .map(|u| u.username.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                author_followers: author
                    .and_then(|u| u.public_metrics.as_ref())
                    .map(|m| m.followers_count)
                    .unwrap_or(0),
                author_id: t.author_id,
                like_count: t.public_metrics.like_count,
                retweet_count: t.public_metrics.retweet_count,
                reply_count: t.public_metrics.reply_count,
                created_at: t.created_at.unwrap_or_default(),
                conversation_id: t.conversation_id,
            }
        })
        .collect()
}
