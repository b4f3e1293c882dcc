//! Financial amounts, percentages and dates mentioned around deals

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::patterns::context_window;

/// Characters kept on each side of a term
const TERM_CONTEXT_CHARS: usize = 50;

// The unwraps below are on compile-time constant patterns that are known to be valid.
static AMOUNT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[$€£]\s?\d+(?:,\d{3})*(?:\.\d+)?(?:\s*(?:million|billion|trillion|bn|mn|m|b)\b)?|\b\d+(?:,\d{3})*(?:\.\d+)?\s*(?:million|billion|trillion)\b(?:\s*(?:USD|EUR|GBP|dollars|euros))?|\b\d+(?:,\d{3})*(?:\.\d+)?\s*(?:USD|EUR|GBP)\b",
    )
    .unwrap()
});

static PERCENTAGE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(?:\.\d+)?\s?%").unwrap());

static DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)[a-z]*\.?\s+\d{1,2},?\s+\d{4}\b|\b\d{1,2}/\d{1,2}/\d{2,4}\b|\b\d{4}-\d{2}-\d{2}\b",
    )
    .unwrap()
});

/// One mention with its surrounding text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermMention {
    pub value: String,
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealTerms {
    pub amounts: Vec<TermMention>,
    pub percentages: Vec<TermMention>,
    pub dates: Vec<TermMention>,
}

impl DealTerms {
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty() && self.percentages.is_empty() && self.dates.is_empty()
    }
}

/// Scan text for money amounts, percentages and dates, each in text order
pub fn extract_deal_terms(text: &str) -> DealTerms {
    DealTerms {
        amounts: mentions(&AMOUNT_REGEX, text),
        percentages: mentions(&PERCENTAGE_REGEX, text),
        dates: mentions(&DATE_REGEX, text),
    }
}

fn mentions(regex: &Regex, text: &str) -> Vec<TermMention> {
    regex
        .find_iter(text)
        .map(|found| {
            let (context, _) = context_window(text, found.start(), TERM_CONTEXT_CHARS);
            TermMention {
                value: found.as_str().trim().to_string(),
                context: context.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(mentions: &[TermMention]) -> Vec<&str> {
        mentions.iter().map(|m| m.value.as_str()).collect()
    }

    #[test]
    fn test_amounts() {
        let text = "An upfront payment of $50 million, up to 1.2 billion USD in milestones, \
a $40M equity stake and 250 EUR per unit.";
        let terms = extract_deal_terms(text);
        assert_eq!(
            values(&terms.amounts),
            vec!["$50 million", "1.2 billion USD", "$40M", "250 EUR"]
        );
    }

    #[test]
    fn test_plain_numbers_are_not_amounts() {
        let terms = extract_deal_terms("The trial enrolled 120 patients across 14 sites.");
        assert!(terms.amounts.is_empty());
    }

    #[test]
    fn test_percentages() {
        let terms = extract_deal_terms("Royalties of 15% and a 7.5 % tiered rate.");
        assert_eq!(values(&terms.percentages), vec!["15%", "7.5 %"]);
    }

    #[test]
    fn test_dates_in_text_order() {
        let text = "Signed on March 3, 2024, effective 2024-04-01, closing 12/31/2024.";
        let terms = extract_deal_terms(text);
        assert_eq!(
            values(&terms.dates),
            vec!["March 3, 2024", "2024-04-01", "12/31/2024"]
        );
    }

    #[test]
    fn test_context_is_attached() {
        let terms = extract_deal_terms("Acme will receive $25 million upfront from Beta.");
        assert_eq!(terms.amounts.len(), 1);
        assert!(terms.amounts[0].context.contains("upfront"));
    }

    #[test]
    fn test_empty() {
        assert!(extract_deal_terms("").is_empty());
    }
}
