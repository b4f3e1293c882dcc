//! Named-entity recognition behind a pluggable trait
//!
//! The pipeline only depends on `EntityRecognizer`. `RuleBasedRecognizer` is the
//! built-in backend: regex and lexicon rules tuned for press-release prose.
//! `LexiconRecognizer` reports organization names from the lexicon only.
//! `CompositeRecognizer` runs several backends and merges what they report.
//! `build_recognizer` assembles whichever of these `[entities]` selects.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, warn};

use crate::config::{EntityConfig, RecognizerBackend};

/// Fixed entity label set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityLabel {
    Person,
    Org,
    Gpe,
    Product,
}

impl EntityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Person => "PERSON",
            EntityLabel::Org => "ORG",
            EntityLabel::Gpe => "GPE",
            EntityLabel::Product => "PRODUCT",
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognized mention. `start`/`end` are character (not byte) offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
}

/// A swappable NER backend
pub trait EntityRecognizer: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Zero or more entities found in `text`
    fn recognize(&self, text: &str) -> Vec<Entity>;
}

/// Group entity texts by label, dropping repeated texts within a label
pub fn group_by_label(entities: &[Entity]) -> BTreeMap<EntityLabel, Vec<String>> {
    let mut grouped: BTreeMap<EntityLabel, Vec<String>> = BTreeMap::new();
    for entity in entities {
        let texts = grouped.entry(entity.label).or_default();
        if !texts.contains(&entity.text) {
            texts.push(entity.text.clone());
        }
    }
    grouped
}

/// Well-known pharma and biotech companies
const KNOWN_ORGANIZATIONS: &[&str] = &[
    "AbbVie",
    "Amgen",
    "Astellas",
    "AstraZeneca",
    "Bayer",
    "Biogen",
    "BioNTech",
    "Boehringer Ingelheim",
    "Bristol Myers Squibb",
    "Bristol-Myers Squibb",
    "Daiichi Sankyo",
    "Eli Lilly",
    "Genentech",
    "Gilead",
    "GlaxoSmithKline",
    "GSK",
    "Johnson & Johnson",
    "Merck",
    "Moderna",
    "Novartis",
    "Novo Nordisk",
    "Pfizer",
    "Regeneron",
    "Roche",
    "Sanofi",
    "Takeda",
    "Vertex",
];

const KNOWN_PLACES: &[&str] = &[
    "United States",
    "USA",
    "United Kingdom",
    "UK",
    "European Union",
    "Europe",
    "China",
    "Japan",
    "Germany",
    "France",
    "Switzerland",
    "Canada",
    "India",
    "South Korea",
    "Boston",
    "Cambridge",
    "New York",
    "South San Francisco",
    "San Francisco",
    "San Diego",
    "London",
    "Basel",
    "Tokyo",
    "Shanghai",
    "Beijing",
    "Paris",
];

/// Leading words that are not part of an organization name
const LEADING_STOPWORDS: &[&str] = &[
    "The", "A", "An", "Our", "Its", "Their", "And", "With", "By", "Today", "Additionally", "Both",
];

// The unwraps below are on compile-time constant patterns that are known to be valid.
static ORG_SUFFIX_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b[A-Z][A-Za-z&'-]*(?:[ \t]+(?:&[ \t]+)?[A-Z][A-Za-z&'-]*)*,?[ \t]+(?:(?:Inc|Ltd|Corp|Co)\.|(?:Inc|LLC|Ltd|Corp|Corporation|PLC|plc|AG|GmbH|SE)\b)",
    )
    .unwrap()
});

static ORG_INDUSTRY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b[A-Z][A-Za-z&'-]*(?:[ \t]+[A-Z][A-Za-z&'-]*)*[ \t]+(?:Pharma|Pharmaceuticals|Biotech|Biotherapeutics|Therapeutics|Biosciences|Biopharma|Bio|Medical|Health|Life[ \t]+Sciences|Oncology|Genomics|Laboratories|Labs)\b",
    )
    .unwrap()
});

static PERSON_HONORIFIC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Dr|Mr|Ms|Mrs|Prof)\.?[ \t]+([A-Z][a-z]+(?:[ \t]+[A-Z]\.)?(?:[ \t]+[A-Z][A-Za-z'-]+)+)")
        .unwrap()
});

static PERSON_TITLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b([A-Z][a-z]+(?:[ \t]+[A-Z]\.)?[ \t]+[A-Z][A-Za-z'-]+),[ \t]+(?:the[ \t]+)?(?:Chief|CEO|President|Chairman|Chairwoman|Founder|Co-Founder|Head|Vice|Director|CFO|CMO|CSO|COO|SVP|EVP)\b",
    )
    .unwrap()
});

static DATELINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*([A-Z][A-Za-z.]*(?:[ \t]+[A-Z][A-Za-z.]*)*),[ \t]+([A-Z]{2}|[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)?)[ \t]*(?:,[^\n-]*)?[ \t]*[-–—(]",
    )
    .unwrap()
});

static PRODUCT_CODE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[A-Z]{2,}-?[0-9]{2,}|[A-Z][a-z]+-[0-9]+)\b").unwrap());

static PRODUCT_BRAND_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][A-Za-z0-9-]+)[ \t]?[®™]").unwrap());

static PLACE_REGEX: Lazy<Regex> = Lazy::new(|| lexicon_regex(KNOWN_PLACES.iter().copied()).unwrap());

/// Build `\b(?:a|b|c)\b` with the longest names first so they win over prefixes
fn lexicon_regex<'a>(names: impl Iterator<Item = &'a str>) -> Result<Regex, regex::Error> {
    let mut names: Vec<&str> = names.filter(|n| !n.trim().is_empty()).collect();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    names.dedup();
    let alternation = names
        .iter()
        .map(|n| regex::escape(n.trim()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{})\b", alternation))
}

/// Built-in organization names plus `extra`, or `None` if the alternation fails to compile
fn organization_lexicon<I, S>(extra: I) -> Option<Regex>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let extra: Vec<String> = extra.into_iter().map(|s| s.as_ref().to_string()).collect();
    let names = KNOWN_ORGANIZATIONS
        .iter()
        .copied()
        .chain(extra.iter().map(String::as_str));

    match lexicon_regex(names) {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!("Organization lexicon disabled, failed to compile: {}", e);
            None
        }
    }
}

/// Candidate span in byte offsets before overlap resolution
#[derive(Debug, Clone)]
struct Candidate {
    start: usize,
    end: usize,
    label: EntityLabel,
    confidence: f32,
}

/// Regex and lexicon based recognizer for press-release text
pub struct RuleBasedRecognizer {
    organization_lexicon: Option<Regex>,
}

impl Default for RuleBasedRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBasedRecognizer {
    pub fn new() -> Self {
        Self::with_known_organizations(std::iter::empty::<String>())
    }

    /// Recognize `extra` organization names verbatim on top of the built-in lexicon
    pub fn with_known_organizations<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            organization_lexicon: organization_lexicon(extra),
        }
    }

    pub fn from_config(config: &EntityConfig) -> Self {
        Self::with_known_organizations(config.known_organizations.iter())
    }

    fn candidates(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        if let Some(lexicon) = &self.organization_lexicon {
            push_matches(&mut candidates, lexicon, text, EntityLabel::Org, 0.9);
        }
        for found in ORG_SUFFIX_REGEX.find_iter(text) {
            push_organization(&mut candidates, text, found.start(), found.end(), 0.85);
        }
        for found in ORG_INDUSTRY_REGEX.find_iter(text) {
            push_organization(&mut candidates, text, found.start(), found.end(), 0.75);
        }

        push_groups(&mut candidates, &PERSON_HONORIFIC_REGEX, text, &[1], EntityLabel::Person, 0.8);
        push_groups(&mut candidates, &PERSON_TITLE_REGEX, text, &[1], EntityLabel::Person, 0.8);

        push_groups(&mut candidates, &DATELINE_REGEX, text, &[1, 2], EntityLabel::Gpe, 0.8);
        push_matches(&mut candidates, &PLACE_REGEX, text, EntityLabel::Gpe, 0.85);

        push_matches(&mut candidates, &PRODUCT_CODE_REGEX, text, EntityLabel::Product, 0.7);
        push_groups(&mut candidates, &PRODUCT_BRAND_REGEX, text, &[1], EntityLabel::Product, 0.8);

        candidates
    }
}

fn push_matches(out: &mut Vec<Candidate>, regex: &Regex, text: &str, label: EntityLabel, confidence: f32) {
    for found in regex.find_iter(text) {
        out.push(Candidate {
            start: found.start(),
            end: found.end(),
            label,
            confidence,
        });
    }
}

fn push_groups(
    out: &mut Vec<Candidate>,
    regex: &Regex,
    text: &str,
    groups: &[usize],
    label: EntityLabel,
    confidence: f32,
) {
    for caps in regex.captures_iter(text) {
        for group in groups {
            if let Some(found) = caps.get(*group) {
                out.push(Candidate {
                    start: found.start(),
                    end: found.end(),
                    label,
                    confidence,
                });
            }
        }
    }
}

/// Push an organization span after dropping leading stopwords such as "The"
fn push_organization(out: &mut Vec<Candidate>, text: &str, mut start: usize, end: usize, confidence: f32) {
    loop {
        let span = &text[start..end];
        let Some(first) = span.split_whitespace().next() else {
            return;
        };
        if !LEADING_STOPWORDS.contains(&first) {
            break;
        }
        let rest = span[first.len()..].trim_start();
        if rest.is_empty() {
            return;
        }
        start = end - rest.len();
    }

    out.push(Candidate {
        start,
        end,
        label: EntityLabel::Org,
        confidence,
    });
}

/// Keep the earliest, then longest, of any overlapping candidates
fn resolve_overlaps(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then((b.end - b.start).cmp(&(a.end - a.start)))
            .then(b.confidence.total_cmp(&a.confidence))
    });

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.last().map_or(true, |last| candidate.start >= last.end) {
            kept.push(candidate);
        }
    }
    kept
}

fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

impl EntityRecognizer for RuleBasedRecognizer {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn recognize(&self, text: &str) -> Vec<Entity> {
        let entities: Vec<Entity> = resolve_overlaps(self.candidates(text))
            .into_iter()
            .map(|c| Entity {
                text: text[c.start..c.end].to_string(),
                label: c.label,
                start: char_offset(text, c.start),
                end: char_offset(text, c.end),
                confidence: c.confidence,
            })
            .collect();

        debug!("{} recognizer found {} entities", self.name(), entities.len());
        entities
    }
}

/// Organization names matched verbatim against the lexicon
pub struct LexiconRecognizer {
    lexicon: Option<Regex>,
}

impl LexiconRecognizer {
    pub fn with_known_organizations<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lexicon: organization_lexicon(extra),
        }
    }

    pub fn from_config(config: &EntityConfig) -> Self {
        Self::with_known_organizations(config.known_organizations.iter())
    }
}

impl EntityRecognizer for LexiconRecognizer {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn recognize(&self, text: &str) -> Vec<Entity> {
        let Some(lexicon) = &self.lexicon else {
            return Vec::new();
        };
        lexicon
            .find_iter(text)
            .map(|found| Entity {
                text: found.as_str().to_string(),
                label: EntityLabel::Org,
                start: char_offset(text, found.start()),
                end: char_offset(text, found.end()),
                confidence: 0.9,
            })
            .collect()
    }
}

/// Build the recognizer `config` selects. One backend is used as is; several
/// are wrapped in a `CompositeRecognizer` in the listed order.
pub fn build_recognizer(config: &EntityConfig) -> Option<Box<dyn EntityRecognizer>> {
    if !config.enabled {
        return None;
    }

    let mut backends: Vec<Box<dyn EntityRecognizer>> = config
        .backends
        .iter()
        .map(|backend| -> Box<dyn EntityRecognizer> {
            match backend {
                RecognizerBackend::RuleBased => Box::new(RuleBasedRecognizer::from_config(config)),
                RecognizerBackend::Lexicon => Box::new(LexiconRecognizer::from_config(config)),
            }
        })
        .collect();

    match backends.len() {
        0 => None,
        1 => backends.pop(),
        _ => Some(Box::new(
            backends
                .into_iter()
                .fold(CompositeRecognizer::new(), CompositeRecognizer::with_backend),
        )),
    }
}

/// Runs several backends and merges their output.
///
/// Entities are keyed by (text, label); when two backends report the same key
/// the higher-confidence entity is kept in the position of the first report.
#[derive(Default)]
pub struct CompositeRecognizer {
    backends: Vec<Box<dyn EntityRecognizer>>,
}

impl CompositeRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Box<dyn EntityRecognizer>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }
}

impl EntityRecognizer for CompositeRecognizer {
    fn name(&self) -> &str {
        "composite"
    }

    fn recognize(&self, text: &str) -> Vec<Entity> {
        let mut merged: Vec<Entity> = Vec::new();
        let mut index: HashMap<(String, EntityLabel), usize> = HashMap::new();

        for backend in &self.backends {
            for entity in backend.recognize(text) {
                let key = (entity.text.clone(), entity.label);
                match index.get(&key) {
                    Some(&i) => {
                        if entity.confidence > merged[i].confidence {
                            merged[i] = entity;
                        }
                    }
                    None => {
                        index.insert(key, merged.len());
                        merged.push(entity);
                    }
                }
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(entities: &[Entity], label: EntityLabel) -> Vec<String> {
        entities
            .iter()
            .filter(|e| e.label == label)
            .map(|e| e.text.clone())
            .collect()
    }

    // ==========================================================================
    // Tests for RuleBasedRecognizer
    // ==========================================================================

    #[test]
    fn test_organizations_by_suffix_and_lexicon() {
        let recognizer = RuleBasedRecognizer::new();
        let entities = recognizer.recognize(
            "Acme Therapeutics signed a deal with Pharma Corp. and Pfizer. The Novartis Corporation declined.",
        );
        let orgs = texts(&entities, EntityLabel::Org);

        assert!(orgs.contains(&"Acme Therapeutics".to_string()), "{:?}", orgs);
        assert!(orgs.contains(&"Pharma Corp.".to_string()), "{:?}", orgs);
        assert!(orgs.contains(&"Pfizer".to_string()), "{:?}", orgs);
        assert!(orgs.contains(&"Novartis Corporation".to_string()), "{:?}", orgs);
    }

    #[test]
    fn test_extra_known_organizations() {
        let recognizer = RuleBasedRecognizer::with_known_organizations(["Zeta"]);
        let entities = recognizer.recognize("We partnered with Zeta last year.");
        assert_eq!(texts(&entities, EntityLabel::Org), vec!["Zeta".to_string()]);
    }

    #[test]
    fn test_people() {
        let recognizer = RuleBasedRecognizer::new();
        let entities = recognizer.recognize(
            "\"We are thrilled,\" said Jane Smith, Chief Executive Officer. Dr. Alan Turing joined the board.",
        );
        let people = texts(&entities, EntityLabel::Person);
        assert_eq!(people, vec!["Jane Smith".to_string(), "Alan Turing".to_string()]);
    }

    #[test]
    fn test_dateline_and_places() {
        let recognizer = RuleBasedRecognizer::new();
        let entities = recognizer.recognize(
            "BOSTON, MA - Acme Bio today announced expansion into Japan.",
        );
        let places = texts(&entities, EntityLabel::Gpe);
        assert_eq!(places, vec!["BOSTON".to_string(), "MA".to_string(), "Japan".to_string()]);
    }

    #[test]
    fn test_products() {
        let recognizer = RuleBasedRecognizer::new();
        let entities = recognizer.recognize("Dosing of XYZ-123 began. Sales of Keytruda® grew.");
        let products = texts(&entities, EntityLabel::Product);
        assert_eq!(products, vec!["XYZ-123".to_string(), "Keytruda".to_string()]);
    }

    #[test]
    fn test_offsets_are_character_offsets() {
        let recognizer = RuleBasedRecognizer::new();
        let text = "Überraschung: Pfizer wins";
        let entities = recognizer.recognize(text);
        let pfizer = entities.iter().find(|e| e.text == "Pfizer").unwrap();

        let chars: Vec<char> = text.chars().collect();
        let slice: String = chars[pfizer.start..pfizer.end].iter().collect();
        assert_eq!(slice, "Pfizer");
        assert_eq!(pfizer.start, 14);
    }

    #[test]
    fn test_overlaps_keep_longest() {
        let recognizer = RuleBasedRecognizer::new();
        let entities = recognizer.recognize("Merck Pharma Inc. reported results.");
        let orgs = texts(&entities, EntityLabel::Org);
        assert_eq!(orgs, vec!["Merck Pharma Inc.".to_string()]);
    }

    #[test]
    fn test_plain_sentence_has_no_entities() {
        let recognizer = RuleBasedRecognizer::new();
        assert!(recognizer.recognize("results were positive across all arms.").is_empty());
        assert!(recognizer.recognize("").is_empty());
    }

    // ==========================================================================
    // Tests for CompositeRecognizer and grouping
    // ==========================================================================

    struct FixedRecognizer {
        entities: Vec<Entity>,
    }

    impl EntityRecognizer for FixedRecognizer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _text: &str) -> Vec<Entity> {
            self.entities.clone()
        }
    }

    fn entity(text: &str, label: EntityLabel, confidence: f32) -> Entity {
        Entity {
            text: text.to_string(),
            label,
            start: 0,
            end: text.chars().count(),
            confidence,
        }
    }

    #[test]
    fn test_composite_keeps_higher_confidence_in_first_position() {
        let first = FixedRecognizer {
            entities: vec![
                entity("Acme", EntityLabel::Org, 0.5),
                entity("Boston", EntityLabel::Gpe, 0.9),
            ],
        };
        let second = FixedRecognizer {
            entities: vec![
                entity("Acme", EntityLabel::Org, 0.95),
                entity("Acme", EntityLabel::Product, 0.6),
            ],
        };

        let composite = CompositeRecognizer::new()
            .with_backend(Box::new(first))
            .with_backend(Box::new(second));
        let merged = composite.recognize("ignored");

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].text, "Acme");
        assert_eq!(merged[0].confidence, 0.95);
        assert_eq!(merged[1].text, "Boston");
        assert_eq!(merged[2].label, EntityLabel::Product);
    }

    #[test]
    fn test_lexicon_recognizer_reports_only_known_organizations() {
        let recognizer = LexiconRecognizer::with_known_organizations(["Zeta Bio"]);
        let entities = recognizer.recognize("Dr. Jane Smith of Acme Therapeutics met Pfizer and Zeta Bio in Boston.");

        let orgs = texts(&entities, EntityLabel::Org);
        assert_eq!(orgs, vec!["Pfizer".to_string(), "Zeta Bio".to_string()]);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].start, 40);
    }

    #[test]
    fn test_build_recognizer_follows_config() {
        let mut config = EntityConfig::default();
        assert_eq!(build_recognizer(&config).unwrap().name(), "rule_based");

        config.backends = vec![RecognizerBackend::Lexicon];
        assert_eq!(build_recognizer(&config).unwrap().name(), "lexicon");

        config.backends = vec![RecognizerBackend::Lexicon, RecognizerBackend::RuleBased];
        let composite = build_recognizer(&config).unwrap();
        assert_eq!(composite.name(), "composite");
        let orgs = texts(&composite.recognize("Acme Therapeutics partnered with Pfizer."), EntityLabel::Org);
        assert_eq!(orgs, vec!["Pfizer".to_string(), "Acme Therapeutics".to_string()]);

        config.enabled = false;
        assert!(build_recognizer(&config).is_none());
    }

    #[test]
    fn test_empty_composite_finds_nothing() {
        let composite = CompositeRecognizer::new();
        assert!(composite.is_empty());
        assert!(composite.recognize("Pfizer").is_empty());
    }

    #[test]
    fn test_group_by_label_dedups_texts() {
        let entities = vec![
            entity("Pfizer", EntityLabel::Org, 0.9),
            entity("Boston", EntityLabel::Gpe, 0.9),
            entity("Pfizer", EntityLabel::Org, 0.9),
        ];
        let grouped = group_by_label(&entities);
        assert_eq!(grouped[&EntityLabel::Org], vec!["Pfizer".to_string()]);
        assert_eq!(grouped[&EntityLabel::Gpe], vec!["Boston".to_string()]);

        let json = serde_json::to_value(&grouped).unwrap();
        assert!(json["ORG"].is_array());
        assert!(json["GPE"].is_array());
    }
}
