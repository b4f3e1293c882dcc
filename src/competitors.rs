//! Competitor detection from pattern-match contexts
//!
//! Produces unnormalized `RawCompetitor` mentions; `CompanyNormalizer::clean`
//! turns them into the final deduplicated list.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::entities::{EntityLabel, EntityRecognizer};
use crate::org_normalizer::{clean_company_name, RawCompetitor};
use crate::patterns::StructuredExtraction;

/// Deal-type tag used for companies found near a clinical phase mention
pub const PIPELINE_DEAL_TYPE: &str = "pipeline";

const NER_CONFIDENCE: f32 = 0.8;
const ALLOW_LIST_CONFIDENCE: f32 = 0.7;
const BY_WITH_CONFIDENCE: f32 = 0.6;
const PARTNER_CONFIDENCE: f32 = 0.75;

// The unwrap below is on a compile-time constant pattern that is known to be valid.
static BY_WITH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[Bb]y|[Ww]ith)[ \t]+([A-Z][A-Za-z&'-]*(?:[ \t]+(?:&[ \t]+)?[A-Z][A-Za-z&'-]*)*)")
        .unwrap()
});

/// Finds company mentions in phase and deal contexts.
pub struct CompetitorDetector<'a> {
    recognizer: Option<&'a dyn EntityRecognizer>,
    allow_list: Vec<String>,
}

impl<'a> CompetitorDetector<'a> {
    /// `recognizer` is optional; without it only the allow-list and
    /// "by/with X" rules apply.
    pub fn new(recognizer: Option<&'a dyn EntityRecognizer>, allow_list: &[String]) -> Self {
        let allow_list = allow_list
            .iter()
            .filter_map(|name| clean_company_name(name))
            .map(|name| name.to_lowercase())
            .collect();
        Self {
            recognizer,
            allow_list,
        }
    }

    /// Raw mentions in discovery order: pipeline contexts first, then deals.
    pub fn detect(&self, extraction: &StructuredExtraction) -> Vec<RawCompetitor> {
        let mut found = Vec::new();

        for entries in extraction.phases.values() {
            for entry in entries {
                self.detect_in_pipeline_context(&entry.context, &mut found);
            }
        }

        for (deal_type, entries) in &extraction.deals {
            for entry in entries {
                let mention = |name: String, confidence: f32| RawCompetitor {
                    name,
                    deal_type: deal_type.as_str().to_string(),
                    context: entry.context.clone(),
                    confidence,
                };

                match &entry.partner {
                    Some(partner) => found.push(mention(partner.clone(), PARTNER_CONFIDENCE)),
                    None => {
                        for name in self.organizations(&entry.context) {
                            found.push(mention(name, NER_CONFIDENCE));
                        }
                    }
                }
            }
        }

        found
    }

    fn detect_in_pipeline_context(&self, context: &str, found: &mut Vec<RawCompetitor>) {
        let mention = |name: String, confidence: f32| RawCompetitor {
            name,
            deal_type: PIPELINE_DEAL_TYPE.to_string(),
            context: context.to_string(),
            confidence,
        };

        let organizations = self.organizations(context);
        if organizations.is_empty() {
            if let Some(name) = self.allow_listed_lead(context) {
                found.push(mention(name, ALLOW_LIST_CONFIDENCE));
            }
        } else {
            for name in organizations {
                found.push(mention(name, NER_CONFIDENCE));
            }
        }

        for caps in BY_WITH_REGEX.captures_iter(context) {
            if let Some(name) = caps.get(1) {
                found.push(mention(name.as_str().to_string(), BY_WITH_CONFIDENCE));
            }
        }
    }

    fn organizations(&self, context: &str) -> Vec<String> {
        let Some(recognizer) = self.recognizer else {
            return Vec::new();
        };
        recognizer
            .recognize(context)
            .into_iter()
            .filter(|entity| entity.label == EntityLabel::Org)
            .map(|entity| entity.text)
            .collect()
    }

    /// Allow-listed company named by the first one or two words of a context
    fn allow_listed_lead(&self, context: &str) -> Option<String> {
        let words: Vec<&str> = context.split_whitespace().take(2).collect();
        let candidates = [words.first().map(|w| w.to_string()), Some(words.join(" "))];

        candidates
            .into_iter()
            .flatten()
            .filter_map(|candidate| clean_company_name(&candidate))
            .find(|name| self.allow_list.contains(&name.to_lowercase()))
    }
}
