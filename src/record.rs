//! The pipeline's output record and its JSON layout

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::deal_terms::DealTerms;
use crate::entities::EntityLabel;
use crate::org_normalizer::Competitor;
use crate::patterns::{
    DealEntry, DealType, IndicationEntry, IndicationLabel, PhaseEntry, PhaseLabel, TherapeuticArea,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub phases: BTreeMap<PhaseLabel, Vec<PhaseEntry>>,
    pub indications: BTreeMap<IndicationLabel, Vec<IndicationEntry>>,
}

/// Deal matches by type. Every key is always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealInfo {
    pub partnerships: Vec<DealEntry>,
    pub licenses: Vec<DealEntry>,
    pub acquisitions: Vec<DealEntry>,
    pub investments: Vec<DealEntry>,
}

impl DealInfo {
    pub fn from_deals(mut deals: BTreeMap<DealType, Vec<DealEntry>>) -> Self {
        let mut take = |deal_type: DealType| deals.remove(&deal_type).unwrap_or_default();
        Self {
            partnerships: take(DealType::Partnership),
            licenses: take(DealType::License),
            acquisitions: take(DealType::Acquisition),
            investments: take(DealType::Investment),
        }
    }

    pub fn entries(&self, deal_type: DealType) -> &[DealEntry] {
        match deal_type {
            DealType::Partnership => &self.partnerships,
            DealType::License => &self.licenses,
            DealType::Acquisition => &self.acquisitions,
            DealType::Investment => &self.investments,
        }
    }

    pub fn is_empty(&self) -> bool {
        DealType::ALL.iter().all(|t| self.entries(*t).is_empty())
    }
}

/// Everything extracted from one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub source_url: String,
    pub pipeline_info: PipelineInfo,
    pub deal_info: DealInfo,
    pub deal_terms: DealTerms,
    pub therapeutic_areas: Vec<TherapeuticArea>,
    pub entities: BTreeMap<EntityLabel, Vec<String>>,
    pub competitors: Vec<Competitor>,
    pub raw_text: String,
}

impl StructuredRecord {
    pub fn phase_entries(&self, phase: PhaseLabel) -> &[PhaseEntry] {
        self.pipeline_info
            .phases
            .get(&phase)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn competitor_names(&self) -> Vec<&str> {
        self.competitors.iter().map(|c| c.canonical_name.as_str()).collect()
    }
}

/// What `process` returns: a full record, or a record holding only `error`.
///
/// Serializes to either the record layout or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineOutput {
    Record(Box<StructuredRecord>),
    Error { error: String },
}

impl PipelineOutput {
    pub fn record(record: StructuredRecord) -> Self {
        Self::Record(Box::new(record))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error } => Some(error.as_str()),
            Self::Record(_) => None,
        }
    }

    pub fn as_record(&self) -> Option<&StructuredRecord> {
        match self {
            Self::Record(record) => Some(record.as_ref()),
            Self::Error { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<StructuredRecord> {
        match self {
            Self::Record(record) => Some(*record),
            Self::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> StructuredRecord {
        let mut phases = BTreeMap::new();
        phases.insert(
            PhaseLabel::PhaseII,
            vec![PhaseEntry {
                drug_name: Some("XYZ-123".to_string()),
                indication: None,
                context: "XYZ-123 is in Phase II".to_string(),
            }],
        );

        let mut deals = BTreeMap::new();
        deals.insert(
            DealType::Partnership,
            vec![DealEntry {
                partner: Some("Company X".to_string()),
                context: "partnership with Company X".to_string(),
            }],
        );

        StructuredRecord {
            source_url: "https://example.com/news".to_string(),
            pipeline_info: PipelineInfo {
                phases,
                indications: BTreeMap::new(),
            },
            deal_info: DealInfo::from_deals(deals),
            deal_terms: DealTerms::default(),
            therapeutic_areas: Vec::new(),
            entities: BTreeMap::new(),
            competitors: vec![Competitor {
                canonical_name: "Company X".to_string(),
                deal_type: "partnership".to_string(),
                context: "partnership with Company X".to_string(),
                confidence: 0.75,
            }],
            raw_text: "XYZ-123 is in Phase II".to_string(),
        }
    }

    #[test]
    fn test_record_json_layout() {
        let json = serde_json::to_value(PipelineOutput::record(sample_record())).unwrap();

        assert_eq!(json["source_url"], "https://example.com/news");
        assert_eq!(json["pipeline_info"]["phases"]["Phase II"][0]["drug_name"], "XYZ-123");
        assert!(json["pipeline_info"]["phases"]["Phase II"][0]["indication"].is_null());
        assert_eq!(json["deal_info"]["partnerships"][0]["partner"], "Company X");
        for key in ["licenses", "acquisitions", "investments"] {
            assert_eq!(json["deal_info"][key], serde_json::json!([]), "{}", key);
        }
        assert_eq!(json["competitors"][0]["canonical_name"], "Company X");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_error_output_has_only_error_key() {
        let json = serde_json::to_value(PipelineOutput::error("Invalid input: empty input")).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["error"], "Invalid input: empty input");
    }

    #[test]
    fn test_output_deserializes_both_shapes() {
        let record = PipelineOutput::record(sample_record());
        let text = serde_json::to_string(&record).unwrap();
        let back: PipelineOutput = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);

        let back: PipelineOutput = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(back.error_message(), Some("boom"));
    }

    #[test]
    fn test_deal_info_entries() {
        let record = sample_record();
        assert_eq!(record.deal_info.entries(DealType::Partnership).len(), 1);
        assert!(record.deal_info.entries(DealType::Investment).is_empty());
        assert!(!record.deal_info.is_empty());
        assert!(DealInfo::default().is_empty());
        assert_eq!(record.phase_entries(PhaseLabel::PhaseII).len(), 1);
        assert!(record.phase_entries(PhaseLabel::Approved).is_empty());
    }
}
