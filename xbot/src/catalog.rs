//! Calculator catalog and keyword resolution.
//!
//! The catalog is the static registry of promotable calculators, loaded once
//! at startup. Keyword resolution maps a monitored search keyword to the
//! calculator it should promote: exact case-insensitive match first, then a
//! substring fallback walked in catalog declaration order so repeated lookups
//! always land on the same calculator.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Built-in catalog shipped with the binary.
const BUILTIN: &str = include_str!("../data/calculators.json");

/// One promotable calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    /// URL slug, e.g. "mortgage-calculator".
    pub slug: String,
    /// Display name, e.g. "Mortgage Calculator".
    pub name: String,
    /// Category used for hashtag selection.
    pub category: String,
    /// Search keywords that should resolve to this calculator.
    pub keywords: Vec<String>,
    /// Short hook lines for generated posts.
    #[serde(default)]
    pub hooks: Vec<String>,
    /// Who the calculator is for (fed into LLM prompts).
    #[serde(default)]
    pub target_audience: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    calculators: Vec<ContentItem>,
}

/// Immutable registry of calculators, in declaration order.
#[derive(Debug, Clone)]
pub struct Catalog {
    items: Vec<ContentItem>,
}

impl Catalog {
    /// The catalog embedded in the binary.
    pub fn builtin() -> Self {
        let file: CatalogFile =
            serde_json::from_str(BUILTIN).expect("embedded calculators.json is valid");
        Self { items: file.calculators }
    }

    /// Load a catalog from a JSON file (same shape as the embedded one).
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse catalog file {}", path.display()))?;
        anyhow::ensure!(!file.calculators.is_empty(), "Catalog file has no calculators");
        Ok(Self { items: file.calculators })
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn get(&self, slug: &str) -> Option<&ContentItem> {
        self.items.iter().find(|c| c.slug == slug)
    }

    /// All keywords, in declaration order. The monitor's default search set.
    pub fn all_keywords(&self) -> Vec<String> {
        self.items
            .iter()
            .flat_map(|c| c.keywords.iter().cloned())
            .collect()
    }

    /// Resolve a keyword to a calculator.
    ///
    /// Exact case-insensitive match wins. Otherwise the first item (in
    /// declaration order) with a keyword where either side contains the
    /// other as a substring. Declaration order makes the fallback stable
    /// even when several keywords overlap.
    pub fn resolve(&self, keyword: &str) -> Option<&ContentItem> {
        let wanted = keyword.to_lowercase();

        for item in &self.items {
            if item.keywords.iter().any(|k| k.to_lowercase() == wanted) {
                return Some(item);
            }
        }

        for item in &self.items {
            for k in &item.keywords {
                let k = k.to_lowercase();
                if k.contains(&wanted) || wanted.contains(&k) {
                    return Some(item);
                }
            }
        }

        None
    }
}
