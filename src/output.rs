//! Output formatting utilities

use crate::run::EntityOutcome;
use crate::summary::FieldSummary;

/// Pretty printer for run results
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the outcome ledger of a completed run
    pub fn print_run_summary<'a>(
        run_name: &str,
        outcomes: impl ExactSizeIterator<Item = &'a EntityOutcome>,
    ) {
        println!("📊 Run results: {}", run_name);
        let count = outcomes.len();
        for (i, outcome) in outcomes.enumerate() {
            let prefix = if i == count - 1 { "└─" } else { "├─" };
            if outcome.success {
                println!(
                    "{} ✅ {}: left={} right={} fully_matched={}",
                    prefix,
                    outcome.entity,
                    outcome.rows_left.unwrap_or(0),
                    outcome.rows_right.unwrap_or(0),
                    outcome.rows_fully_matched.unwrap_or(0),
                );
            } else {
                println!(
                    "{} ❌ {}: {}",
                    prefix,
                    outcome.entity,
                    outcome.error_text.as_deref().unwrap_or("unknown error"),
                );
            }
        }
    }

    /// Print per-field match statistics for one entity
    pub fn print_field_summaries(entity: &str, summaries: &[FieldSummary]) {
        println!("🔍 Field summary: {}", entity);
        for (i, summary) in summaries.iter().enumerate() {
            let prefix = if i == summaries.len() - 1 { "└─" } else { "├─" };
            match summary.match_percentage {
                Some(pct) => println!(
                    "{} {}: {}/{} ({}%)",
                    prefix, summary.field, summary.matches, summary.total, pct
                ),
                None => println!("{} {}: no rows on both sides", prefix, summary.field),
            }
        }
    }
}
