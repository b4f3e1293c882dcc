//! Company name normalization and competitor deduplication
//!
//! Standardizes the company names that show up in press releases so repeated
//! mentions collapse into one competitor:
//! - Unicode compatibility forms: full-width letters, ligatures
//! - Punctuation: "Roche Ltd." vs "Roche Ltd" vs "Roche, Ltd"
//! - Trailing legal suffixes: Inc, LLC, Ltd, Corp, Corporation, PLC, Co, Company, Limited
//! - Leading articles: "The Novartis Corporation" -> "Novartis"
//! - Known concatenation artifacts: "JohnsonJohnson" -> "Johnson & Johnson"
//! - Manual alias overrides from configuration

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::config::{CompetitorConfig, MergePolicy, OrganizationConfig};

/// Legal-entity suffixes removed from the end of a name (compared lowercase)
const CORPORATE_SUFFIXES: &[&str] = &[
    "inc",
    "llc",
    "ltd",
    "corp",
    "corporation",
    "plc",
    "co",
    "company",
    "limited",
];

const LEADING_ARTICLES: &[&str] = &["the", "a", "an"];

/// Whole-word fixes for names that text extraction glued together
const CONCATENATION_FIXES: &[(&str, &str)] = &[
    ("JohnsonJohnson", "Johnson & Johnson"),
    ("PfizerBioNTech", "Pfizer"),
    ("MerckEarly", "Merck"),
];

/// Organization normalizer with configurable aliases.
#[derive(Debug, Clone, Default)]
pub struct OrgNormalizer {
    /// Lowercase cleaned alias -> cleaned canonical name
    aliases: HashMap<String, String>,
}

impl OrgNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a normalizer from the `[organization]` config section.
    pub fn with_config(config: &OrganizationConfig) -> Self {
        let mut normalizer = Self::new();
        for (alias, canonical) in &config.aliases {
            normalizer.add_alias(alias, canonical);
        }
        normalizer
    }

    /// Add an alias mapping. Both sides go through the base cleaning steps, so
    /// aliases match however the name was punctuated in the source text.
    pub fn add_alias(&mut self, alias: &str, canonical: &str) {
        let (Some(alias), Some(canonical)) = (clean_name(alias), clean_name(canonical)) else {
            debug!("Ignoring alias '{}' -> '{}': empty after cleaning", alias, canonical);
            return;
        };
        self.aliases.insert(alias.to_lowercase(), canonical);
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Normalize a company name, returning `None` if nothing is left.
    ///
    /// Applying `normalize` to its own output returns the same name.
    pub fn normalize(&self, name: &str) -> Option<String> {
        let cleaned = clean_name(name)?;
        let resolved = self.resolve_alias(cleaned);
        if resolved != name {
            debug!("Normalized '{}' to '{}'", name, resolved);
        }
        Some(resolved)
    }

    /// Follow alias chains until a name with no alias is reached. A cycle
    /// resolves to the name it was entered with.
    fn resolve_alias(&self, name: String) -> String {
        let mut current = name;
        let mut seen = HashSet::new();

        loop {
            let key = current.to_lowercase();
            if !seen.insert(key.clone()) {
                break;
            }
            match self.aliases.get(&key) {
                Some(canonical) if canonical.to_lowercase() != key => current = canonical.clone(),
                _ => break,
            }
        }

        current
    }
}

/// Normalize a name without any alias table
pub fn clean_company_name(name: &str) -> Option<String> {
    clean_name(name)
}

/// The fixed cleaning sequence; aliases are applied on top of this
fn clean_name(name: &str) -> Option<String> {
    let composed: String = name.nfkc().collect();

    let stripped: String = composed
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '&' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut words: Vec<&str> = stripped.split_whitespace().collect();

    remove_corporate_suffixes(&mut words);
    remove_leading_articles(&mut words);

    let fixed: Vec<&str> = words.iter().map(|word| apply_concatenation_fix(word)).collect();
    let result = fixed.join(" ");

    if result.is_empty() {
        None
    } else {
        Some(result)
    }
}

/// Also drops a dangling "&" left behind by "Merck & Co"
fn remove_corporate_suffixes(words: &mut Vec<&str>) {
    while let Some(last) = words.last() {
        if *last == "&" || CORPORATE_SUFFIXES.contains(&last.to_lowercase().as_str()) {
            words.pop();
        } else {
            break;
        }
    }
}

/// Articles are only dropped while something follows them: "A" alone stays
fn remove_leading_articles(words: &mut Vec<&str>) {
    while words.len() > 1 && LEADING_ARTICLES.contains(&words[0].to_lowercase().as_str()) {
        words.remove(0);
    }
}

fn apply_concatenation_fix(word: &str) -> &str {
    CONCATENATION_FIXES
        .iter()
        .find(|(glued, _)| *glued == word)
        .map(|(_, fixed)| *fixed)
        .unwrap_or(word)
}

/// A company mention before normalization, tagged with how it was found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCompetitor {
    pub name: String,
    /// Deal type label, or "pipeline" for mentions found near a phase match
    pub deal_type: String,
    pub context: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub canonical_name: String,
    pub deal_type: String,
    pub context: String,
    pub confidence: f32,
}

/// Folds raw mentions into a list with one entry per canonical name.
#[derive(Debug, Clone, Default)]
pub struct CompanyNormalizer {
    names: OrgNormalizer,
    policy: MergePolicy,
}

impl CompanyNormalizer {
    pub fn new(names: OrgNormalizer, policy: MergePolicy) -> Self {
        Self { names, policy }
    }

    pub fn from_config(organization: &OrganizationConfig, competitors: &CompetitorConfig) -> Self {
        Self::new(
            OrgNormalizer::with_config(organization),
            competitors.merge_policy,
        )
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn normalize_name(&self, name: &str) -> Option<String> {
        self.names.normalize(name)
    }

    /// Normalize and deduplicate.
    ///
    /// Names are compared case-insensitively after normalization. Output keeps
    /// the order in which each name first appeared. Under `HighestConfidence`
    /// a later mention with strictly higher confidence replaces the stored one
    /// in place.
    pub fn clean(&self, raw: Vec<RawCompetitor>) -> Vec<Competitor> {
        let mut competitors: Vec<Competitor> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for mention in raw {
            let Some(canonical_name) = self.names.normalize(&mention.name) else {
                debug!("Dropping competitor '{}': empty after normalization", mention.name);
                continue;
            };

            let key = canonical_name.to_lowercase();
            let candidate = Competitor {
                canonical_name,
                deal_type: mention.deal_type,
                context: mention.context,
                confidence: mention.confidence.clamp(0.0, 1.0),
            };

            match positions.get(&key) {
                Some(&i) => {
                    if self.policy == MergePolicy::HighestConfidence
                        && candidate.confidence > competitors[i].confidence
                    {
                        competitors[i] = candidate;
                    }
                }
                None => {
                    positions.insert(key, competitors.len());
                    competitors.push(candidate);
                }
            }
        }

        competitors
    }
}
