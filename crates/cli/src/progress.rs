//! Progress reporting and conflict rendering for sync operations.

use std::sync::Mutex;

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};

use langsync_core::conflict::ConflictSummary;
use langsync_core::events::SyncEvents;
use langsync_core::model::TranslationSet;

use crate::style;

/// Terminal event listener: drives an indicatif bar through a push and
/// prints conflict notices as they happen.
pub struct TerminalEvents {
    bar: ProgressBar,
    conflicts: Mutex<Vec<ConflictSummary>>,
}

impl TerminalEvents {
    pub fn new() -> Self {
        // Hidden until a push announces its total.
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("{bar:30.cyan/dim} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self {
            bar,
            conflicts: Mutex::new(Vec::new()),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for TerminalEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEvents for TerminalEvents {
    fn on_push_started(&self, total_pushable: usize) {
        self.bar.set_length(total_pushable as u64);
        self.bar.set_position(0);
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_message("pushing");
    }

    fn on_skipped(&self, set: &TranslationSet) {
        self.bar
            .println(style::dim(&format!("skipped {}", set.tracking_key())));
    }

    fn on_handled(&self, _set: &TranslationSet) {
        self.bar.inc(1);
    }

    fn on_conflict(&self, set: &TranslationSet, summary: &ConflictSummary) {
        self.bar.println(style::warn(&format!(
            "conflict in {} ({} line(s))",
            set.tracking_key(),
            summary.conflicting_keys.len()
        )));
        if let Ok(mut conflicts) = self.conflicts.lock() {
            conflicts.push(summary.clone());
        }
    }
}

fn key_list(keys: &[String]) -> String {
    if keys.is_empty() {
        "—".to_string()
    } else {
        keys.join("\n")
    }
}

/// Render accumulated conflict summaries as a table.
pub fn print_conflicts(conflicts: &[ConflictSummary]) {
    if conflicts.is_empty() {
        return;
    }

    println!();
    println!(
        "{}",
        style::header(&format!("Conflicts ({})", conflicts.len()))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Set", "Conflicting", "Added", "Updated", "Removed"]);

    for summary in conflicts {
        let set_label = if summary.translation_key.is_empty() {
            "(default)".to_string()
        } else {
            summary.translation_key.clone()
        };
        table.add_row(vec![
            Cell::new(set_label),
            Cell::new(key_list(&summary.conflicting_keys)).fg(comfy_table::Color::Yellow),
            Cell::new(key_list(&summary.added_keys)),
            Cell::new(key_list(&summary.updated_keys)),
            Cell::new(key_list(&summary.removed_keys)),
        ]);
    }

    println!("{table}");
    println!();
}
