/*!
 * Terminal output for the Meridian CLI
 *
 * Tables for the ledger views and the cleanup report, plus themed
 * status lines.
 */

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};
use meridian_ledger::{Node, PendingRetry};
use meridian_orchestrator::CleanupReport;

/// Brand colors for consistent styling
pub struct Theme;

impl Theme {
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }
}

pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
}

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a minimal table (no outer borders)
pub fn create_minimal_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

/// Totals of one cleanup sweep followed by any per-row errors
pub fn cleanup_report_table(report: &CleanupReport) -> Table {
    let mut table = create_minimal_table();
    let rows = [
        ("Attempted", report.total_attempted, Color::White),
        ("Successful", report.successful, Color::Green),
        ("Failed", report.failed, Color::Red),
        ("Still pending", report.still_pending, Color::Yellow),
    ];

    for (label, count, color) in rows {
        table.add_row(vec![
            Cell::new(label).fg(Color::Cyan),
            Cell::new(count).fg(color).add_attribute(Attribute::Bold),
        ]);
    }

    for error in &report.errors {
        table.add_row(vec![Cell::new("Error").fg(Color::Red), Cell::new(error)]);
    }

    table
}

pub fn pending_table(rows: &[PendingRetry]) -> Table {
    let mut table = create_table();
    table.set_header(header(&[
        "User",
        "Node",
        "Protocol",
        "Attempts",
        "Last attempt",
        "Last error",
    ]));

    for row in rows {
        table.add_row(vec![
            Cell::new(&row.key.user_id),
            Cell::new(&row.key.node),
            Cell::new(&row.key.protocol),
            Cell::new(row.attempts),
            Cell::new(row.last_attempt.format(TIME_FORMAT)),
            Cell::new(&row.last_error).fg(Color::Red),
        ]);
    }

    table
}

pub fn nodes_table(nodes: &[Node]) -> Table {
    let mut table = create_table();
    table.set_header(header(&[
        "Address", "Country", "City", "Label", "Protocol", "Active",
    ]));

    for node in nodes {
        table.add_row(vec![
            Cell::new(&node.address),
            Cell::new(&node.country_code),
            Cell::new(&node.city_name),
            Cell::new(node.label.as_deref().unwrap_or("-")),
            Cell::new(&node.protocol),
            bool_cell(node.active),
        ]);
    }

    table
}

fn bool_cell(value: bool) -> Cell {
    if value {
        Cell::new(Icons::SUCCESS).fg(Color::Green)
    } else {
        Cell::new(Icons::ERROR).fg(Color::Red)
    }
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!("{} {}", Theme::error(format!("{} Error:", Icons::ERROR)), message);

    if let Some(hint) = suggestion {
        eprintln!("  {}", Theme::muted(hint));
    }
}

pub fn print_warning(message: &str) {
    eprintln!(
        "{} {}",
        Theme::warning(Icons::WARNING.to_string()),
        Theme::warning(message)
    );
}

pub fn print_success(message: &str) {
    println!(
        "{} {}",
        Theme::success(Icons::SUCCESS.to_string()),
        Theme::success(message)
    );
}

pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO.to_string()), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use meridian_ledger::RetryKey;

    #[test]
    fn test_cleanup_report_lists_errors() {
        let report = CleanupReport {
            total_attempted: 3,
            successful: 2,
            failed: 1,
            still_pending: 1,
            errors: vec!["user=u1, endpoint=n1, inbound=vless: refused".to_string()],
        };
        let rendered = cleanup_report_table(&report).to_string();

        assert!(rendered.contains("Still pending"));
        assert!(rendered.contains("endpoint=n1"));
    }

    #[test]
    fn test_pending_table_has_row_per_retry() {
        let now = Utc::now();
        let rows = vec![PendingRetry {
            key: RetryKey::new("u1", "n1.example.net", "trojan"),
            attempts: 4,
            last_attempt: now,
            created_at: now,
            last_error: "deadline exceeded".to_string(),
        }];
        let table = pending_table(&rows);

        assert_eq!(table.row_iter().count(), 1);
        assert!(table.to_string().contains("n1.example.net"));
    }

    #[test]
    fn test_nodes_table_marks_inactive() {
        let node = Node {
            country_code: "DE".to_string(),
            city_name: "Frankfurt".to_string(),
            label: None,
            address: "de1.example.net".to_string(),
            protocol: "vless".to_string(),
            active: false,
            created_at: None,
        };
        let rendered = nodes_table(&[node]).to_string();

        assert!(rendered.contains("de1.example.net"));
        assert!(rendered.contains(Icons::ERROR));
    }
}
