//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use epubseal_common::engine::ValidationSummary;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

fn plain<T: TableDisplay>(items: &[T]) -> String {
    let headers = T::headers();
    items
        .iter()
        .map(|item| {
            headers
                .iter()
                .zip(item.row())
                .map(|(header, value)| format!("{}: {}", header, value))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Render a list of items
pub fn render_list<T: Serialize + TableDisplay>(
    items: &[T],
    format: OutputFormat,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Table => table(items).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(items)?,
        OutputFormat::Plain => plain(items),
    })
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(
    items: &[T],
    format: OutputFormat,
) -> anyhow::Result<()> {
    if items.is_empty() && format != OutputFormat::Json {
        println!("No items found.");
        return Ok(());
    }
    println!("{}", render_list(items, format)?);
    Ok(())
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print validation results grouped by status
pub fn print_validation(summary: &ValidationSummary) {
    for (status, items) in summary.groups() {
        let heading = match status {
            "success" => format!("✅ Status {}:", status).green(),
            "informational" => format!("ℹ️  Status {}:", status).cyan(),
            _ => format!("❌ Status {}:", status).red(),
        };
        println!("{}", heading.bold());
        for (i, item) in items.iter().enumerate() {
            println!(
                "   {}. {}: {}",
                i + 1,
                item.code.bold(),
                item.explanation.as_deref().unwrap_or("")
            );
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        uri: String,
        size: u64,
    }

    impl TableDisplay for Row {
        fn headers() -> Vec<&'static str> {
            vec!["URI", "Size"]
        }

        fn row(&self) -> Vec<String> {
            vec![self.uri.clone(), self.size.to_string()]
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { uri: "mimetype".into(), size: 20 },
            Row { uri: "OEBPS/a.html".into(), size: 7 },
        ]
    }

    #[test]
    fn test_plain_separates_items() {
        let out = render_list(&rows(), OutputFormat::Plain).unwrap();
        assert_eq!(out, "URI: mimetype\nSize: 20\n---\nURI: OEBPS/a.html\nSize: 7");
    }

    #[test]
    fn test_json_is_an_array() {
        let out = render_list(&rows(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[1]["uri"], "OEBPS/a.html");
    }

    #[test]
    fn test_table_has_headers() {
        let out = render_list(&rows(), OutputFormat::Table).unwrap();
        assert!(out.contains("URI"));
        assert!(out.contains("mimetype"));
    }
}
