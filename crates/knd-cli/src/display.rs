//! Human-readable rendering of inspection records and raw registry fields.

use std::fmt::Write;

use knd_core::{FieldMap, InspectionRecord};

const WIDTH: usize = 20;

/// One inspection as a vertical card, grouped into sections.
///
/// Empty values are skipped; a section with nothing to show is left out.
pub fn render_card(record: &InspectionRecord) -> String {
    let mut out = String::new();
    let title = record.inspection_number.as_deref().unwrap_or("(no number)");
    let _ = writeln!(out, "=== КНМ {title} ===");
    let _ = writeln!(out, "{}", record.registry_url);
    out.push('\n');

    section(
        &mut out,
        "Registry",
        &[
            ("inspection_number", record.inspection_number.clone()),
            ("status", record.status.as_ref().map(ToString::to_string)),
            ("address", record.address.clone()),
        ],
    );
    section(
        &mut out,
        "Dates",
        &[
            ("registered_at", record.registered_at.map(|d| d.format("%d.%m.%Y %H:%M").to_string())),
            ("start_date", record.start_date.map(|d| d.format("%d.%m.%Y").to_string())),
            ("end_date", record.end_date.map(|d| d.format("%d.%m.%Y").to_string())),
            ("departure_time", record.departure_time.map(|d| d.format("%d.%m.%Y %H:%M").to_string())),
        ],
    );
    section(
        &mut out,
        "Tracking",
        &[
            ("id", Some(record.id.to_string())),
            ("created", Some(record.created.format("%Y-%m-%d %H:%M:%S UTC").to_string())),
            ("inspector_ref", record.inspector_ref.as_ref().map(ToString::to_string)),
        ],
    );
    out
}

fn section(out: &mut String, header: &str, rows: &[(&str, Option<String>)]) {
    if rows.iter().all(|(_, v)| v.is_none()) {
        return;
    }
    let _ = writeln!(out, "{header}");
    for (name, value) in rows {
        if let Some(value) = value {
            let _ = writeln!(out, "  {name:<WIDTH$} {value}");
        }
    }
    out.push('\n');
}

/// One line per record: id, number, status, created.
pub fn render_table(records: &[InspectionRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>5}  {:<24} {:<14} created", "id", "number", "status");
    for r in records {
        let _ = writeln!(
            out,
            "{:>5}  {:<24} {:<14} {}",
            r.id,
            r.inspection_number.as_deref().unwrap_or("-"),
            r.status.as_ref().map_or("-", |s| s.as_str()),
            r.created.format("%Y-%m-%d %H:%M"),
        );
    }
    out
}

/// Raw scraper output, label then value.
pub fn render_fields(fields: &FieldMap) -> String {
    let mut out = String::new();
    for (label, value) in fields.iter() {
        let _ = writeln!(out, "  {label:<WIDTH$} {value}");
    }
    out
}
