//! Tweet and reply generation.
//!
//! Drafts go through an OpenAI-compatible chat completion when an API key is
//! available; any provider failure falls back to the built-in templates, so
//! generation never blocks posting. Hashtags are picked per category and the
//! final text is fitted to the 280-char limit with the URL kept intact.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::{Catalog, ContentItem};
use crate::config::StyleConfig;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const TWEET_LIMIT: usize = 280;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("LLM provider error: {0}")]
    Provider(String),
    #[error("unknown calculator: {0}")]
    UnknownItem(String),
}

/// Template families for generated posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Question,
    Tip,
    DidYouKnow,
}

impl TemplateKind {
    const ALL: [TemplateKind; 3] =
        [TemplateKind::Question, TemplateKind::Tip, TemplateKind::DidYouKnow];
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateKind::Question => write!(f, "question"),
            TemplateKind::Tip => write!(f, "tip"),
            TemplateKind::DidYouKnow => write!(f, "did-you-know"),
        }
    }
}

const QUESTION_TEMPLATES: &[&str] = &[
    "{hook} Run your numbers in 30 seconds: {url}",
    "Quick one: {hook} The {name} has the answer: {url}",
];

const TIP_TEMPLATES: &[&str] = &[
    "Stop guessing. The {name} does the maths for you: {url}",
    "{hook} Free, no signup, no spreadsheet: {url}",
];

const DID_YOU_KNOW_TEMPLATES: &[&str] = &[
    "Most people get this wrong. {hook} Check yours: {url}",
    "{hook} We built the {name} so you don't have to guess: {url}",
];

const REPLY_TEMPLATES: &[&str] = &[
    "The {name} might help here: {url}",
    "We built a free {name} for exactly this: {url}",
    "This is what the {name} is for: {url}",
];

/// A generated tweet, ready to post or preview.
#[derive(Debug, Clone)]
pub struct GeneratedPost {
    pub text: String,
    pub slug: String,
    pub name: String,
    pub kind: TemplateKind,
    pub hashtags: Vec<String>,
}

pub struct Generator {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    site_url: String,
    style: StyleConfig,
    catalog: Arc<Catalog>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl Generator {
    pub fn new(
        catalog: Arc<Catalog>,
        site_url: String,
        model: String,
        style: StyleConfig,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            site_url,
            style,
            catalog,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn content_url(&self, slug: &str) -> String {
        format!("{}/calculators/{slug}", self.site_url.trim_end_matches('/'))
    }

    /// Single-turn completion against the configured provider.
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<String, GeneratorError> {
        let Some(api_key) = &self.api_key else {
            return Err(GeneratorError::Provider("no API key configured".to_string()));
        };

        let body = serde_json::json!({
            "model": &self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let resp = self
            .http
            .post(OPENAI_URL)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Provider(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GeneratorError::Provider(format!("provider {status}: {body}")));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GeneratorError::Provider(e.to_string()))?;
        let text = chat
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| GeneratorError::Provider("empty completion".to_string()))?;
        Ok(text)
    }

    /// Generate a promotional tweet for a calculator (random if unspecified).
    pub async fn generate_post(
        &self,
        slug: Option<&str>,
        kind: Option<TemplateKind>,
        use_llm: bool,
    ) -> Result<GeneratedPost, GeneratorError> {
        let (item, kind) = {
            let mut rng = rand::thread_rng();
            let item = match slug {
                Some(s) => self
                    .catalog
                    .get(s)
                    .ok_or_else(|| GeneratorError::UnknownItem(s.to_string()))?,
                None => self
                    .catalog
                    .items()
                    .choose(&mut rng)
                    .ok_or_else(|| GeneratorError::UnknownItem("<empty catalog>".to_string()))?,
            };
            let kind = kind.unwrap_or_else(|| {
                *TemplateKind::ALL.choose(&mut rng).unwrap_or(&TemplateKind::Tip)
            });
            (item.clone(), kind)
        };

        let url = self.content_url(&item.slug);

        let text = if use_llm {
            match self.draft_with_llm(&item, kind, &url).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, slug = %item.slug, "LLM draft failed, using template");
                    draft_from_template(&item, kind, &url)
                }
            }
        } else {
            draft_from_template(&item, kind, &url)
        };

        let hashtags = self.pick_hashtags(&item.category);
        let text = fit_to_limit(&text, &hashtags);

        Ok(GeneratedPost {
            text,
            slug: item.slug.clone(),
            name: item.name.clone(),
            kind,
            hashtags,
        })
    }

    async fn draft_with_llm(
        &self,
        item: &ContentItem,
        kind: TemplateKind,
        url: &str,
    ) -> Result<String, GeneratorError> {
        let prompt = format!(
            "Generate a tweet promoting a calculator tool.\n\n\
             Calculator: {name}\n\
             URL: {url}\n\
             Category: {category}\n\
             Example hooks: {hooks}\n\
             Target audience: {audience}\n\n\
             Tweet style: {kind}\n\
             Tone: {tone}\n\
             Include emoji: {emoji}\n\n\
             Requirements:\n\
             - Must be under 260 characters (leave room for hashtags)\n\
             - Must include the URL: {url}\n\
             - Be engaging and encourage clicks\n\
             - Don't be spammy or overly salesy\n\
             - No hashtags in the tweet itself (added separately)\n\n\
             Generate ONLY the tweet text, nothing else.",
            name = item.name,
            category = item.category,
            hooks = item.hooks.join(", "),
            audience = item.target_audience.join(", "),
            tone = self.style.tone,
            emoji = self.style.include_emoji,
        );

        let mut text = self.complete(&prompt, 150, 0.8).await?;
        text = text.trim_matches(['"', '\'']).to_string();
        if !text.contains(url) {
            text = format!("{text}\n\n{url}");
        }
        Ok(text)
    }

    /// Generate a helpful reply mentioning the given calculator.
    ///
    /// Provider failures fall back to a template, so this only errors on an
    /// unknown slug.
    pub async fn generate_reply(
        &self,
        original_tweet: &str,
        slug: &str,
    ) -> Result<String, GeneratorError> {
        let item = self
            .catalog
            .get(slug)
            .ok_or_else(|| GeneratorError::UnknownItem(slug.to_string()))?;
        let url = self.content_url(slug);

        let prompt = format!(
            "Generate a helpful, non-spammy reply to this tweet.\n\n\
             Original tweet: \"{original_tweet}\"\n\n\
             You want to helpfully mention this relevant tool:\n\
             Calculator: {name}\n\
             URL: {url}\n\n\
             Requirements:\n\
             - Be genuinely helpful, not salesy\n\
             - Keep it short (under 200 chars ideal)\n\
             - Include the URL naturally\n\
             - Don't use hashtags\n\
             - Sound human and conversational\n\n\
             Generate ONLY the reply text, nothing else.",
            name = item.name,
        );

        match self.complete(&prompt, 100, 0.7).await {
            Ok(reply) => {
                let mut reply = reply.trim_matches(['"', '\'']).to_string();
                if !reply.contains(&url) {
                    reply = format!("{reply} {url}");
                }
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(error = %e, slug, "LLM reply failed, using template");
                Ok(reply_from_template(item, &url))
            }
        }
    }

    /// Pick up to `max_hashtags` tags from the category pool plus the
    /// general pool.
    fn pick_hashtags(&self, category: &str) -> Vec<String> {
        let mut available: Vec<&str> = hashtag_pool(category).to_vec();
        for tag in hashtag_pool("everyday") {
            if !available.contains(tag) {
                available.push(tag);
            }
        }
        if available.is_empty() {
            return Vec::new();
        }
        let mut rng = rand::thread_rng();
        let count = self.style.max_hashtags.min(available.len());
        available
            .choose_multiple(&mut rng, count)
            .map(|t| t.to_string())
            .collect()
    }
}

fn hashtag_pool(category: &str) -> &'static [&'static str] {
    match category {
        "finance" => &["#PersonalFinance", "#MoneyTips", "#FIRE"],
        "home" => &["#DIY", "#HomeImprovement"],
        "health" => &["#Health", "#Fitness"],
        "events" => &["#WeddingPlanning", "#PartyPlanning"],
        "work" => &["#Freelance", "#SideHustle"],
        "everyday" => &["#Calculator", "#LifeHacks"],
        _ => &[],
    }
}

fn draft_from_template(item: &ContentItem, kind: TemplateKind, url: &str) -> String {
    let templates = match kind {
        TemplateKind::Question => QUESTION_TEMPLATES,
        TemplateKind::Tip => TIP_TEMPLATES,
        TemplateKind::DidYouKnow => DID_YOU_KNOW_TEMPLATES,
    };
    let mut rng = rand::thread_rng();
    let template = templates.choose(&mut rng).unwrap_or(&templates[0]);
    let hook = item
        .hooks
        .choose(&mut rng)
        .cloned()
        .unwrap_or_else(|| item.name.clone());

    template
        .replace("{name}", &item.name)
        .replace("{url}", url)
        .replace("{hook}", &hook)
}

fn reply_from_template(item: &ContentItem, url: &str) -> String {
    let mut rng = rand::thread_rng();
    let template = REPLY_TEMPLATES.choose(&mut rng).unwrap_or(&REPLY_TEMPLATES[0]);
    template.replace("{name}", &item.name).replace("{url}", url)
}

/// Fit text plus hashtags into the tweet limit, keeping any URL line intact
/// and truncating the rest with an ellipsis.
fn fit_to_limit(text: &str, hashtags: &[String]) -> String {
    let hashtag_str = if hashtags.is_empty() {
        String::new()
    } else {
        format!(" {}", hashtags.join(" "))
    };

    let max_text_len = TWEET_LIMIT.saturating_sub(hashtag_str.chars().count());
    let mut text = text.to_string();

    if text.chars().count() > max_text_len {
        let url_line = text
            .lines()
            .find(|l| l.contains("http"))
            .unwrap_or("")
            .to_string();
        let other_text = text
            .lines()
            .filter(|l| !l.contains("http"))
            .collect::<Vec<_>>()
            .join("\n");

        let available = max_text_len
            .saturating_sub(url_line.chars().count())
            .saturating_sub(2);
        let other_text = if other_text.chars().count() > available {
            let kept: String = other_text.chars().take(available.saturating_sub(3)).collect();
            format!("{}...", kept.trim_end())
        } else {
            other_text
        };

        text = format!("{other_text}\n\n{url_line}").trim().to_string();
    }

    format!("{text}{hashtag_str}")
}
