//! Console rendering for scenario output.

use isodb_core::{RowId, TransactionManager, Value};

/// Print a scenario heading.
pub fn heading(title: &str) {
    println!();
    println!("=== {title} ===");
    println!();
}

/// Print one actor's step in the interleaving.
pub fn step(actor: &str, what: &str) {
    println!("  [{actor}] {what}");
}

/// Print a titled two-column table of rows.
pub fn print_table(title: &str, rows: &[(RowId, Value)]) {
    println!("{title}");
    if rows.is_empty() {
        println!("  (empty)");
        return;
    }
    let width = rows
        .iter()
        .map(|(key, _)| key.as_str().len())
        .max()
        .unwrap_or(0);
    for (key, value) in rows {
        println!("  {:<width$}  {}", key.as_str(), value);
    }
}

/// Print the version chain of one row, oldest first.
pub fn print_versions(engine: &TransactionManager, key: &RowId) {
    println!("version chain of '{key}':");
    for version in engine.versions(key) {
        let created = match version.created_seq() {
            Some(seq) => format!("committed at {seq}"),
            None => "uncommitted".to_owned(),
        };
        let fate = match (version.deleted_by(), version.deleted_seq()) {
            (Some(_), Some(seq)) => format!(", superseded at {seq}"),
            (Some(tx), None) => format!(", pending delete by {tx}"),
            _ => String::new(),
        };
        println!(
            "  {} by {} ({created}{fate})",
            version.value(),
            version.created_by()
        );
    }
}

/// Render an optional row value for narration.
pub fn show(value: &Option<Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<absent>".to_owned(),
    }
}
