//! Printing and saving search reports.

use std::fmt::Write as _;

use anyhow::Result;
use gnames_core::{SearchReport, StrategyOutcome};
use owo_colors::OwoColorize;
use tracing::info;

use crate::commands::SearchOptions;

/// Print the report and save it when `--output` was given.
///
/// Returns whether GNames was found.
pub fn emit(report: &SearchReport, options: &SearchOptions) -> Result<bool> {
    if let Some(path) = &options.output {
        report.save(path)?;
        info!("Report saved to {}", path.display());
    }

    if options.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", summary(report));
    }
    Ok(report.result.found)
}

fn summary(report: &SearchReport) -> String {
    let result = &report.result;
    let mut out = String::new();

    match (&report.address, result.kind) {
        (Some(address), Some(kind)) => {
            let _ = writeln!(
                out,
                "{} {} at {} ({} + 0x{:X})",
                "Found".green().bold(),
                kind.bold(),
                address.cyan(),
                report.module,
                result.offset_from_base
            );
            if let Some(evidence) = result.evidence_offset {
                let _ = writeln!(out, "  evidence at {} + 0x{:X}", report.module, evidence);
            }
        }
        _ => {
            let reason = result
                .reason
                .map(|reason| reason.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let _ = writeln!(out, "{} {}", "Not found:".red().bold(), reason);
        }
    }

    for outcome in &result.strategies {
        let _ = writeln!(out, "  {}", strategy_line(outcome));
    }

    if !report.names.is_empty() {
        let _ = writeln!(out, "  names: {}", report.names.join(", "));
    }
    if let Some(sample) = &report.sample {
        let _ = writeln!(out, "  bytes: {}", sample.dimmed());
    }
    let _ = writeln!(out, "  took {} ms", report.elapsed_ms);
    out
}

fn strategy_line(outcome: &StrategyOutcome) -> String {
    let status = match outcome.failure {
        Some(failure) => failure.to_string(),
        None => "ok".to_string(),
    };
    format!(
        "{:<10} {} candidate(s), {}",
        outcome.kind.to_string(),
        outcome.candidates,
        status
    )
}
