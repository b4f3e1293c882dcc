//! Regex pattern extraction for clinical phases, indications and deal types
//!
//! Every pattern match is reported with a context window around the match
//! start. Secondary fields (drug code name, indication text, deal partner) are
//! pulled out of that window with simple heuristics and are best-effort only;
//! the context string is always kept so a human can verify them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::ExtractionConfig;

/// Drug-development stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PhaseLabel {
    #[serde(rename = "Pre-clinical")]
    Preclinical,
    #[serde(rename = "IND")]
    Ind,
    #[serde(rename = "Phase I")]
    PhaseI,
    #[serde(rename = "Phase II")]
    PhaseII,
    #[serde(rename = "Phase III")]
    PhaseIII,
    #[serde(rename = "Approved")]
    Approved,
}

impl PhaseLabel {
    pub const ALL: [PhaseLabel; 6] = [
        PhaseLabel::Preclinical,
        PhaseLabel::Ind,
        PhaseLabel::PhaseI,
        PhaseLabel::PhaseII,
        PhaseLabel::PhaseIII,
        PhaseLabel::Approved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseLabel::Preclinical => "Pre-clinical",
            PhaseLabel::Ind => "IND",
            PhaseLabel::PhaseI => "Phase I",
            PhaseLabel::PhaseII => "Phase II",
            PhaseLabel::PhaseIII => "Phase III",
            PhaseLabel::Approved => "Approved",
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            PhaseLabel::Preclinical => r"\bpre-?clinical\b|\bpre-IND\b",
            PhaseLabel::Ind => {
                r"\bIND[\s-]*enabl(?:ed|ing)\b|\binvestigational\s+new\s+drug\b|\bIND\s+(?:application|submission|filing)\b"
            }
            PhaseLabel::PhaseI => r"\bphase\s*(?:I|1)[ab]?(?:\s*/\s*(?:II|2)[ab]?)?\b",
            PhaseLabel::PhaseII => r"\bphase\s*(?:II|2)[ab]?(?:\s*/\s*(?:III|3)[ab]?)?\b",
            PhaseLabel::PhaseIII => r"\bphase\s*(?:III|3)[ab]?\b",
            PhaseLabel::Approved => {
                r"\bapproved\b|\b(?:FDA|EMA)\s+approval\b|\bmarketing\s+authori[sz]ation\b"
            }
        }
    }
}

impl fmt::Display for PhaseLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad disease category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicationLabel {
    Cancer,
    Autoimmune,
    Neurological,
    Infectious,
    RareDisease,
}

impl IndicationLabel {
    pub const ALL: [IndicationLabel; 5] = [
        IndicationLabel::Cancer,
        IndicationLabel::Autoimmune,
        IndicationLabel::Neurological,
        IndicationLabel::Infectious,
        IndicationLabel::RareDisease,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicationLabel::Cancer => "cancer",
            IndicationLabel::Autoimmune => "autoimmune",
            IndicationLabel::Neurological => "neurological",
            IndicationLabel::Infectious => "infectious",
            IndicationLabel::RareDisease => "rare_disease",
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            IndicationLabel::Cancer => r"\b(?:cancers?|oncology|tumou?rs?|malignan(?:t|cy|cies)|metastatic)\b",
            IndicationLabel::Autoimmune => {
                r"\b(?:autoimmune|inflammat(?:ion|ory)|rheumatoid|arthritis|lupus)\b"
            }
            IndicationLabel::Neurological => r"\b(?:neurological|CNS|brain|spinal|nerves?)\b",
            IndicationLabel::Infectious => r"\b(?:infectious|viral|bacterial|fungal|pathogens?)\b",
            IndicationLabel::RareDisease => {
                r"\brare\s+diseases?\b|\borphan\s+drugs?\b|\bgenetic\s+disorders?\b"
            }
        }
    }
}

impl fmt::Display for IndicationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of business transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealType {
    Partnership,
    License,
    Acquisition,
    Investment,
}

impl DealType {
    pub const ALL: [DealType; 4] = [
        DealType::Partnership,
        DealType::License,
        DealType::Acquisition,
        DealType::Investment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DealType::Partnership => "partnership",
            DealType::License => "license",
            DealType::Acquisition => "acquisition",
            DealType::Investment => "investment",
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            DealType::Partnership => {
                r"\bpartnerships?\b|\bcollaborat(?:ion|ions|ive)\b|\balliances?\b|\bco-?develop(?:ment)?\b|\bjoint\s+ventures?\b"
            }
            DealType::License => {
                r"\blicen[sc](?:e|es|ed|ing)\b|\broyalt(?:y|ies)\b|\bmilestones?\b|\btechnology\s+transfer\b"
            }
            DealType::Acquisition => {
                r"\bacqui(?:re|res|red|ring|sition|sitions)\b|\bmergers?\b|\btakeovers?\b|\bpurchas(?:e|es|ed)\b"
            }
            DealType::Investment => {
                r"\binvestments?\b|\bfunding\b|\bfinancing\b|\bseries\s+[A-F]\b|\bventure\s+capital\b"
            }
        }
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which table produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Phase(PhaseLabel),
    Indication(IndicationLabel),
    Deal(DealType),
}

impl MatchKind {
    pub fn category(&self) -> &'static str {
        match self {
            MatchKind::Phase(_) => "phase",
            MatchKind::Indication(_) => "indication",
            MatchKind::Deal(_) => "deal_type",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchKind::Phase(label) => label.as_str(),
            MatchKind::Indication(label) => label.as_str(),
            MatchKind::Deal(deal) => deal.as_str(),
        }
    }
}

/// Byte span of a match in the scanned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Secondary fields pulled from a context window; `None` means nothing was found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub drug_name: Option<String>,
    pub indication: Option<String>,
    pub partner: Option<String>,
}

/// One located pattern hit
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub kind: MatchKind,
    pub span: MatchSpan,
    pub context: String,
    pub fields: ExtractedFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseEntry {
    pub drug_name: Option<String>,
    pub indication: Option<String>,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicationEntry {
    /// The text that matched, as written in the document
    pub term: String,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealEntry {
    pub partner: Option<String>,
    pub context: String,
}

/// Pattern matches grouped by label. Labels without matches have no key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredExtraction {
    pub phases: BTreeMap<PhaseLabel, Vec<PhaseEntry>>,
    pub indications: BTreeMap<IndicationLabel, Vec<IndicationEntry>>,
    pub deals: BTreeMap<DealType, Vec<DealEntry>>,
}

impl StructuredExtraction {
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty() && self.indications.is_empty() && self.deals.is_empty()
    }
}

// The unwraps below are on compile-time constant patterns that are known to be valid.
static PHASE_PATTERNS: Lazy<Vec<(PhaseLabel, Regex)>> = Lazy::new(|| {
    PhaseLabel::ALL
        .iter()
        .map(|label| (*label, Regex::new(&format!("(?i){}", label.pattern())).unwrap()))
        .collect()
});

static INDICATION_PATTERNS: Lazy<Vec<(IndicationLabel, Regex)>> = Lazy::new(|| {
    IndicationLabel::ALL
        .iter()
        .map(|label| (*label, Regex::new(&format!("(?i){}", label.pattern())).unwrap()))
        .collect()
});

static DEAL_PATTERNS: Lazy<Vec<(DealType, Regex)>> = Lazy::new(|| {
    DealType::ALL
        .iter()
        .map(|deal| (*deal, Regex::new(&format!("(?i){}", deal.pattern())).unwrap()))
        .collect()
});

/// Code names such as "Abc-12", "Xyz12", "XYZ-123" or "AB1234"
static DRUG_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[A-Z][a-z]+-?[0-9]+|[A-Z]{2,}-?[0-9]+)\b").unwrap());

static FOR_INDICATION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfor\s+([^.,\n]+)").unwrap());
static IN_INDICATION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bin\s+([^.,\n]+)").unwrap());

/// Capitalized words after "with"/"by", optionally followed by a corporate suffix
static PARTNER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:[Ww]ith|[Bb]y)\s+([A-Z][\w&'-]*(?:[ \t]+(?:&[ \t]+)?[A-Z][\w&'-]*)*(?:,[ \t]+(?:Inc\.|LLC|Ltd\.|Corp\.))?)",
    )
    .unwrap()
});

/// Words that look like code names but are phase labels
const NOT_DRUG_PREFIXES: &[&str] = &["phase", "covid", "series"];

/// Abbreviated suffixes whose trailing period belongs to the partner name
const ABBREVIATED_SUFFIXES: &[&str] = &["Inc", "Ltd", "Corp", "Co"];

/// Scans text with the phase, indication and deal pattern tables
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    context_window: usize,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new(200)
    }
}

impl PatternExtractor {
    /// Create an extractor keeping `context_window` characters on each side of a match
    pub fn new(context_window: usize) -> Self {
        Self { context_window }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.context_window_chars)
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Every match of every pattern, table by table and in text order within a pattern
    pub fn find_matches(&self, text: &str) -> Vec<PatternMatch> {
        let mut matches = Vec::new();

        for (label, regex) in PHASE_PATTERNS.iter() {
            for found in regex.find_iter(text) {
                let (context, anchor) = context_window(text, found.start(), self.context_window);
                let fields = ExtractedFields {
                    drug_name: extract_drug_name(context),
                    indication: extract_indication(context, anchor),
                    partner: None,
                };
                matches.push(PatternMatch {
                    kind: MatchKind::Phase(*label),
                    span: span_of(&found),
                    context: context.to_string(),
                    fields,
                });
            }
        }

        for (label, regex) in INDICATION_PATTERNS.iter() {
            for found in regex.find_iter(text) {
                let (context, _) = context_window(text, found.start(), self.context_window);
                matches.push(PatternMatch {
                    kind: MatchKind::Indication(*label),
                    span: span_of(&found),
                    context: context.to_string(),
                    fields: ExtractedFields::default(),
                });
            }
        }

        for (deal, regex) in DEAL_PATTERNS.iter() {
            for found in regex.find_iter(text) {
                let (context, anchor) = context_window(text, found.start(), self.context_window);
                let fields = ExtractedFields {
                    partner: extract_partner(context, anchor),
                    ..ExtractedFields::default()
                };
                matches.push(PatternMatch {
                    kind: MatchKind::Deal(*deal),
                    span: span_of(&found),
                    context: context.to_string(),
                    fields,
                });
            }
        }

        matches
    }

    /// Group all matches by label
    pub fn extract_structured(&self, text: &str) -> StructuredExtraction {
        let mut result = StructuredExtraction::default();

        for found in self.find_matches(text) {
            match found.kind {
                MatchKind::Phase(label) => {
                    result.phases.entry(label).or_default().push(PhaseEntry {
                        drug_name: found.fields.drug_name,
                        indication: found.fields.indication,
                        context: found.context,
                    });
                }
                MatchKind::Indication(label) => {
                    result.indications.entry(label).or_default().push(IndicationEntry {
                        term: found.span.text,
                        context: found.context,
                    });
                }
                MatchKind::Deal(deal) => {
                    result.deals.entry(deal).or_default().push(DealEntry {
                        partner: found.fields.partner,
                        context: found.context,
                    });
                }
            }
        }

        result
    }
}

fn span_of(found: &regex::Match<'_>) -> MatchSpan {
    MatchSpan {
        start: found.start(),
        end: found.end(),
        text: found.as_str().to_string(),
    }
}

/// Slice `window` characters either side of byte offset `pos`, trimmed.
///
/// Returns the slice and the byte offset of `pos` inside it. Offsets always
/// land on char boundaries.
pub fn context_window(text: &str, pos: usize, window: usize) -> (&str, usize) {
    let pos = floor_char_boundary(text, pos.min(text.len()));

    let start = text[..pos]
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(pos);
    let end = text[pos..]
        .char_indices()
        .nth(window)
        .map(|(i, _)| pos + i)
        .unwrap_or(text.len());

    let raw = &text[start..end];
    let leading = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    let anchor = (pos - start).saturating_sub(leading).min(trimmed.len());

    (trimmed, floor_char_boundary(trimmed, anchor))
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// First code-name-looking token in the window
fn extract_drug_name(context: &str) -> Option<String> {
    DRUG_NAME_REGEX
        .find_iter(context)
        .filter(|m| {
            let prefix: String = m
                .as_str()
                .chars()
                .take_while(|c| c.is_alphabetic())
                .collect::<String>()
                .to_lowercase();
            !NOT_DRUG_PREFIXES.contains(&prefix.as_str())
        })
        .map(|m| m.as_str().to_string())
        .next()
}

/// Text after "for" (preferred) or "in", up to the next comma or period.
/// The part of the window after the match is searched before the whole window.
fn extract_indication(context: &str, anchor: usize) -> Option<String> {
    let after = &context[anchor..];
    [after, context]
        .iter()
        .find_map(|haystack| {
            capture_trimmed(&FOR_INDICATION_REGEX, haystack)
                .or_else(|| capture_trimmed(&IN_INDICATION_REGEX, haystack))
        })
}

/// Capitalized name after "with" or "by", searched after the match first
fn extract_partner(context: &str, anchor: usize) -> Option<String> {
    let after = &context[anchor..];
    [after, context].iter().find_map(|haystack| {
        let name = PARTNER_REGEX.captures(haystack)?.get(1)?;
        let mut partner = name.as_str().trim().to_string();

        let last_word = partner.rsplit(' ').next().unwrap_or_default();
        if ABBREVIATED_SUFFIXES.contains(&last_word) && haystack[name.end()..].starts_with('.') {
            partner.push('.');
        }

        Some(partner).filter(|p| !p.is_empty())
    })
}

fn capture_trimmed(regex: &Regex, haystack: &str) -> Option<String> {
    regex
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Therapeutic area detected by keyword, with the keywords that triggered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapeuticArea {
    pub area: String,
    pub keywords: Vec<String>,
}

const THERAPEUTIC_AREAS: &[(&str, &[&str])] = &[
    ("Oncology", &["cancer", "tumor", "oncology", "carcinoma", "leukemia", "lymphoma"]),
    ("Immunology", &["immune", "immunology", "autoimmune", "inflammation"]),
    ("Neurology", &["neurology", "brain", "nervous system", "cognitive", "alzheimer", "parkinson"]),
    ("Cardiovascular", &["cardiac", "heart", "vascular", "cardiovascular"]),
    ("Metabolic", &["diabetes", "obesity", "metabolic", "endocrine"]),
    ("Infectious Disease", &["infection", "viral", "bacterial", "antiviral", "antibiotic"]),
    ("Rare Disease", &["rare disease", "orphan drug", "genetic disorder"]),
];

/// Therapeutic areas mentioned in the text, in table order
pub fn identify_therapeutic_areas(text: &str) -> Vec<TherapeuticArea> {
    let lower = text.to_lowercase();

    THERAPEUTIC_AREAS
        .iter()
        .filter_map(|(area, keywords)| {
            let hits: Vec<String> = keywords
                .iter()
                .filter(|keyword| lower.contains(*keyword))
                .map(|keyword| keyword.to_string())
                .collect();
            if hits.is_empty() {
                None
            } else {
                Some(TherapeuticArea {
                    area: area.to_string(),
                    keywords: hits,
                })
            }
        })
        .collect()
}
