//! Rendering resolved pattern tables.

use crate::TableFormat;
use anyhow::{Context, Result};
use lattice_quant::table::TableEntry;
use lattice_quant::{BackendPatternConfig, ObservationStrategy, PatternTable};
use serde::Serialize;

#[derive(Serialize)]
struct Row<'t> {
    pattern: String,
    generator: &'t str,
    #[serde(flatten)]
    config: &'t BackendPatternConfig,
}

/// Entries whose pattern text contains `filter`, in registration order.
pub fn select<'t>(table: &'t PatternTable, filter: Option<&str>) -> Vec<&'t TableEntry> {
    table
        .entries()
        .iter()
        .filter(|entry| filter.is_none_or(|f| entry.pattern.to_string().contains(f)))
        .collect()
}

/// Render the (filtered) table in the requested format.
pub fn render(table: &PatternTable, filter: Option<&str>, format: TableFormat) -> Result<String> {
    let entries = select(table, filter);
    match format {
        TableFormat::Text => Ok(render_text(table, &entries)),
        TableFormat::Json => {
            let rows: Vec<Row<'_>> = entries
                .iter()
                .map(|entry| Row {
                    pattern: entry.pattern.to_string(),
                    generator: &entry.generator,
                    config: &entry.config,
                })
                .collect();
            serde_json::to_string_pretty(&rows).context("Failed to serialize pattern table")
        }
    }
}

fn render_text(table: &PatternTable, entries: &[&TableEntry]) -> String {
    let mut out = format!(
        "{} pattern table: {} of {} entries\n",
        table.name(),
        entries.len(),
        table.len()
    );
    for entry in entries {
        let config = &entry.config;
        let mut line = format!(
            "  {:<58} {:<16} {}",
            entry.pattern.to_string(),
            entry.generator,
            observation_label(&config.observation)
        );
        if let Some(fuser) = &config.fuser_method {
            line.push_str(&format!(" fuse={}", fuser.fused_op()));
        }
        if let Some(root) = &config.root_module {
            line.push_str(&format!(" root={root}"));
        }
        if config.output_observer.is_some() {
            line.push_str(" fixed_qparams");
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

fn observation_label(strategy: &ObservationStrategy) -> String {
    match strategy {
        ObservationStrategy::Fixed(ty) => format!("{ty:?}"),
        ObservationStrategy::ByTensorArgCount(mapping) => {
            let parts: Vec<String> = mapping
                .iter()
                .map(|(count, ty)| format!("{count}:{ty:?}"))
                .collect();
            format!("by_tensor_args({})", parts.join(","))
        }
    }
}
