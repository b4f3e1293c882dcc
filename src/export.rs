use anyhow::{Context, Result};
use csv::Writer;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

use crate::org_normalizer::Competitor;
use crate::patterns::{DealType, PhaseLabel};
use crate::record::PipelineOutput;

/// Write a record (or error record) as pretty JSON
pub fn export_json(output: &PipelineOutput, output_path: &Path) -> Result<()> {
    debug!("Exporting record to JSON: {}", output_path.display());

    let json = serde_json::to_string_pretty(output).context("Failed to serialize record")?;

    fs::write(output_path, json)
        .context(format!("Failed to write record to: {}", output_path.display()))?;

    info!("Wrote record to {}", output_path.display());
    Ok(())
}

pub fn export_competitors_csv(competitors: &[Competitor], output_path: &Path) -> Result<()> {
    debug!("Exporting {} competitors to CSV: {}", competitors.len(), output_path.display());

    let file = File::create(output_path)
        .context(format!("Failed to create CSV file: {}", output_path.display()))?;
    let mut wtr = Writer::from_writer(file);

    wtr.write_record(["canonical_name", "deal_type", "confidence", "context"])?;

    for competitor in competitors {
        let confidence = format!("{:.2}", competitor.confidence);
        wtr.write_record([
            competitor.canonical_name.as_str(),
            competitor.deal_type.as_str(),
            confidence.as_str(),
            competitor.context.as_str(),
        ])?;
    }

    wtr.flush()?;
    info!("Exported {} competitors to CSV: {}", competitors.len(), output_path.display());

    Ok(())
}

pub fn print_record_summary(output: &PipelineOutput) {
    let record = match output {
        PipelineOutput::Error { error } => {
            println!("\n=== Extraction Failed ===");
            println!("{}", error);
            println!("=========================\n");
            return;
        }
        PipelineOutput::Record(record) => record,
    };

    println!("\n=== Extraction Summary ===");
    println!("Source: {}", record.source_url);

    for phase in PhaseLabel::ALL {
        let count = record.phase_entries(phase).len();
        if count > 0 {
            println!("  {}: {} mentions", phase.as_str(), count);
        }
    }

    for deal_type in DealType::ALL {
        let count = record.deal_info.entries(deal_type).len();
        if count > 0 {
            println!("  {} deals: {}", deal_type.as_str(), count);
        }
    }

    if !record.therapeutic_areas.is_empty() {
        let areas: Vec<&str> = record.therapeutic_areas.iter().map(|a| a.area.as_str()).collect();
        println!("Therapeutic areas: {}", areas.join(", "));
    }

    if record.competitors.is_empty() {
        println!("No competitors found.");
    } else {
        println!("Competitors: {}", record.competitor_names().join(", "));
    }

    println!("==========================\n");
}
