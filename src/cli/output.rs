//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::{ChatReply, Document, FieldValue, Record};
use crate::error::Error;
use crate::ingest::IngestReport;
use crate::search::SearchHit;
use crate::storage::StorageStats;
use serde::Serialize;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a status response.
#[must_use]
pub fn format_status(stats: &StorageStats, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats),
        OutputFormat::Json => format_json(stats),
    }
}

fn format_status_text(stats: &StorageStats) -> String {
    let mut output = String::new();
    output.push_str("medchat-rs Status\n");
    output.push_str("=================\n\n");
    let _ = writeln!(output, "  Documents:     {}", stats.document_count);
    let _ = writeln!(output, "  Fragments:     {}", stats.chunk_count);
    let _ = writeln!(output, "  Embedded:      {}", stats.embedding_count);
    let _ = writeln!(output, "  Departments:   {}", stats.department_count);
    let _ = writeln!(output, "  Doctors:       {}", stats.doctor_count);
    let _ = writeln!(output, "  Reservations:  {}", stats.reservation_count);
    let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:       {}", format_size(size));
    }
    output
}

/// Formats the document list.
#[must_use]
pub fn format_document_list(documents: &[Document], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_document_list_text(documents),
        OutputFormat::Json => format_json(&documents),
    }
}

fn format_document_list_text(documents: &[Document]) -> String {
    if documents.is_empty() {
        return "No documents found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str("Documents:\n");
    let _ = writeln!(
        output,
        "{:<6} {:<24} {:<10} {:<10} Source",
        "ID", "Name", "Size", "Fragments"
    );
    output.push_str(&"-".repeat(72));
    output.push('\n');

    for doc in documents {
        let id = doc.id.map_or_else(|| "-".to_string(), |i| i.to_string());
        let fragments = doc
            .metadata
            .chunk_count
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        let source = doc
            .source
            .as_ref()
            .map_or_else(|| "-".to_string(), |p| p.to_string_lossy().to_string());
        let _ = writeln!(
            output,
            "{:<6} {:<24} {:<10} {:<10} {}",
            id,
            truncate(doc.name.as_deref().unwrap_or("-"), 24),
            format_size(doc.metadata.size as u64),
            fragments,
            truncate(&source, 30)
        );
    }
    output
}

/// Where the department listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectorySource {
    /// The departments table.
    Db,
    /// The configured department list (the table is empty).
    Fallback,
}

impl DirectorySource {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Db => "db",
            Self::Fallback => "fallback",
        }
    }
}

/// Formats the department and doctor directory.
#[must_use]
pub fn format_directory(
    departments: &[Record],
    doctors: &[Record],
    source: DirectorySource,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "Departments (source: {}):", source.as_str());
            write_records(&mut output, departments, &["location", "phone"]);
            output.push_str("Doctors:\n");
            write_records(&mut output, doctors, &["department", "title", "schedule"]);
            output
        }
        OutputFormat::Json => format_json(&serde_json::json!({
            "source": source,
            "departments": departments.iter().map(record_json).collect::<Vec<_>>(),
            "doctors": doctors.iter().map(record_json).collect::<Vec<_>>(),
        })),
    }
}

fn write_records(output: &mut String, records: &[Record], details: &[&str]) {
    if records.is_empty() {
        output.push_str("  (none)\n");
        return;
    }
    for record in records {
        let name = record.text("name").unwrap_or("-");
        let shown: Vec<&str> = details
            .iter()
            .filter_map(|field| record.text(field))
            .filter(|value| !value.is_empty())
            .collect();
        if shown.is_empty() {
            let _ = writeln!(output, "  - {name}");
        } else {
            let _ = writeln!(output, "  - {name} ({})", shown.join(", "));
        }
    }
}

/// Flat JSON object: `id` plus every field as a plain value.
fn record_json(record: &Record) -> serde_json::Value {
    let mut object = serde_json::Map::new();
    object.insert("id".to_string(), record.key.into());
    for (name, value) in &record.fields {
        let value = match value {
            FieldValue::Text(s) => serde_json::Value::from(s.as_str()),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Boolean(b) => serde_json::Value::from(*b),
            FieldValue::Null => serde_json::Value::Null,
        };
        object.insert(name.clone(), value);
    }
    serde_json::Value::Object(object)
}

/// Formats ingestion results.
#[must_use]
pub fn format_ingest(reports: &[IngestReport], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            for report in reports {
                let name = report.name.as_deref().unwrap_or("unnamed");
                if report.duplicate {
                    let _ = writeln!(
                        output,
                        "Skipped {name}: same content as document {}",
                        report.document_id
                    );
                } else {
                    let _ = writeln!(
                        output,
                        "Ingested {name} (ID: {}) with {} fragments ({} embedded)",
                        report.document_id, report.chunk_count, report.embedded_count
                    );
                }
            }
            output
        }
        OutputFormat::Json => format_json(&reports),
    }
}

/// Formats fragment search results.
#[must_use]
pub fn format_search_results(query: &str, hits: &[SearchHit], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if hits.is_empty() {
                return format!("No fragments match \"{query}\".\n");
            }
            let mut output = String::new();
            let _ = writeln!(output, "Results for \"{query}\":");
            for (rank, hit) in hits.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "{:>2}. [{:.3}] fragment {} of {}",
                    rank + 1,
                    hit.score,
                    hit.chunk_id,
                    hit.document_name.as_deref().unwrap_or("unnamed")
                );
                let _ = writeln!(output, "    {}", truncate(hit.content.trim(), 160));
            }
            output
        }
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct SearchOutput<'a> {
                query: &'a str,
                results: &'a [SearchHit],
            }
            format_json(&SearchOutput {
                query,
                results: hits,
            })
        }
    }
}

/// Formats a pipeline reply.
#[must_use]
pub fn format_reply(reply: &ChatReply, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = format!("{}\n", reply.response);
            let mut notes = vec![reply.intent.as_str()];
            if reply.cached {
                notes.push("cached");
            }
            if reply.degraded {
                notes.push("degraded");
            }
            let _ = writeln!(output, "  ({})", notes.join(", "));
            output
        }
        OutputFormat::Json => format_json(reply),
    }
}

/// Formats an error for output.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => format_json(&serde_json::json!({
            "error": error.to_string(),
        })),
    }
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a byte size as human-readable.
#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Truncates a string to `max_chars` characters with an ellipsis.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{keep}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Intent, PipelineState};

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("unknown"), OutputFormat::Text);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(100), "100 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello World", 8), "Hello...");
        assert_eq!(truncate("소아청소년과 진료 안내", 6), "소아청...");
    }

    #[test]
    fn test_format_status() {
        let stats = StorageStats {
            document_count: 2,
            chunk_count: 10,
            department_count: 4,
            schema_version: 1,
            db_size: Some(4096),
            ..StorageStats::default()
        };

        let text = format_status(&stats, OutputFormat::Text);
        assert!(text.contains("Documents:     2"));
        assert!(text.contains("Departments:   4"));
        assert!(text.contains("4.0 KB"));

        let json = format_status(&stats, OutputFormat::Json);
        assert!(json.contains("\"document_count\": 2"));
    }

    #[test]
    fn test_format_reply() {
        let reply = ChatReply {
            response: "내과는 본관 2층입니다.".to_string(),
            intent: Intent::InfoQuery,
            degraded: false,
            request_id: "r-1".to_string(),
            cached: true,
            states: vec![PipelineState::Received, PipelineState::Returned],
        };
        let text = format_reply(&reply, OutputFormat::Text);
        assert!(text.starts_with("내과는 본관 2층입니다."));
        assert!(text.contains("(info_query, cached)"));

        let json = format_reply(&reply, OutputFormat::Json);
        assert!(json.contains("\"request_id\": \"r-1\""));
    }

    #[test]
    fn test_format_directory() {
        use crate::core::Entity;

        let departments = vec![
            Record::new(Entity::Departments, 1)
                .with_field("name", "내과")
                .with_field("location", "본관 2층")
                .with_field("phone", FieldValue::Null),
        ];
        let text = format_directory(&departments, &[], DirectorySource::Db, OutputFormat::Text);
        assert_eq!(
            text,
            "Departments (source: db):\n  - 내과 (본관 2층)\nDoctors:\n  (none)\n"
        );

        let json = format_directory(
            &departments,
            &[],
            DirectorySource::Fallback,
            OutputFormat::Json,
        );
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["source"], "fallback");
        assert_eq!(value["departments"][0]["id"], 1);
        assert_eq!(value["departments"][0]["phone"], serde_json::Value::Null);
    }

    #[test]
    fn test_format_error_json() {
        let err = Error::config("bad hour");
        let json = format_error(&err, OutputFormat::Json);
        assert!(json.contains("configuration error: bad hour"));
    }
}
