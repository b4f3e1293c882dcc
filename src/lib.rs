// Allow dead code for public API functions that may not be used internally
// but are part of the library's exposed interface
#![allow(dead_code)]

pub mod batch;
pub mod cli;
pub mod competitors;
pub mod config;
pub mod deal_terms;
pub mod entities;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod logger;
pub mod org_normalizer;
pub mod patterns;
pub mod pipeline;
pub mod ranker;
pub mod record;
pub mod search;
pub mod text_normalizer;

pub use config::AppConfig;
pub use entities::{Entity, EntityLabel, EntityRecognizer, RuleBasedRecognizer};
pub use error::PipelineError;
pub use org_normalizer::{CompanyNormalizer, Competitor, OrgNormalizer};
pub use pipeline::Pipeline;
pub use record::{PipelineOutput, StructuredRecord};
pub use search::{SearchProvider, StaticSearch};
