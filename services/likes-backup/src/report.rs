//!
//! src/report.rs  Andrew Belles  Oct 17th, 2026
//!
//! Human readable summary of what changed in a refresh
//!

use tracing::info;

use crate::reconcile::Reconciliation;
use crate::types::Track;

fn line(sign: char, track: &Track) -> String {
    format!("  {sign} {} - {}", track.artist, track.title)
}

pub fn render(outcome: &Reconciliation) -> Vec<String> {
    if !outcome.has_changes() {
        return vec!["No changes detected".to_string()];
    }

    let mut lines = Vec::with_capacity(outcome.added.len() + outcome.deleted.len() + 2);
    if !outcome.added.is_empty() {
        lines.push("Added tracks:".to_string());
        lines.extend(outcome.added.iter().map(|t| line('+', t)));
    }
    if !outcome.deleted.is_empty() {
        lines.push("Deleted tracks:".to_string());
        lines.extend(outcome.deleted.iter().map(|t| line('-', t)));
    }
    lines
}

pub fn log_report(outcome: &Reconciliation) {
    for l in render(outcome) {
        info!("{l}");
    }
}
