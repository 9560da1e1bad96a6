// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Plain-text and JSON output for one derived page view, plus CSV and JSON
//! exports of its rows.

use anyhow::{Context, Result};
use freeflow_app::{
    Article, ArticleStats, DerivedView, FilteredSummary, Invoice, InvoiceStats, Loadable, PageKind,
    Skill, SkillStats, StatusKind, helpful_rate,
};
use freeflow_db::validation::{format_cents, format_date, format_decimal_cents, format_money};
use serde::Serialize;

const MAX_CELL_CHARS: usize = 32;

/// A record kind that knows how to lay itself out as a table row.
pub trait TableRecord: Loadable + Serialize
where
    Self::Stats: Serialize,
{
    const HEADERS: &'static [&'static str];
    const EXPORT_HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
    /// Untruncated values for spreadsheet export, one per export header.
    fn export_cells(&self) -> Vec<String>;
    fn stats_lines(stats: &Self::Stats) -> Vec<String>;
    fn measure_label(sum: i64) -> String;
}

impl TableRecord for Invoice {
    const HEADERS: &'static [&'static str] =
        &["ID", "NUMBER", "CLIENT", "TITLE", "STATUS", "AMOUNT", "DUE"];
    const EXPORT_HEADERS: &'static [&'static str] = &[
        "id",
        "invoice_number",
        "title",
        "client_name",
        "client_email",
        "status",
        "currency",
        "total_amount",
        "issue_date",
        "due_date",
        "reminder_count",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.invoice_number.clone(),
            self.client_name.clone(),
            self.title.clone(),
            status_cell(self.status.as_str(), self.deleted_at.is_some()),
            format_money(self.amount_cents, &self.currency),
            format_date(self.due_date),
        ]
    }

    fn export_cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.invoice_number.clone(),
            self.title.clone(),
            self.client_name.clone(),
            self.client_email.clone(),
            self.status.as_str().to_owned(),
            self.currency.clone(),
            format_decimal_cents(self.amount_cents),
            format_date(self.issue_date),
            format_date(self.due_date),
            self.reminder_count.to_string(),
        ]
    }

    fn stats_lines(stats: &InvoiceStats) -> Vec<String> {
        vec![
            format!(
                "total {} | {}",
                stats.total,
                breakdown(&stats.by_status)
            ),
            format!(
                "paid {} | pending {} | overdue {} | collected {}%",
                format_cents(stats.paid_cents),
                format_cents(stats.pending_cents),
                format_cents(stats.overdue_cents),
                stats.collection_rate
            ),
        ]
    }

    fn measure_label(sum: i64) -> String {
        format_cents(sum)
    }
}

impl TableRecord for Article {
    const HEADERS: &'static [&'static str] =
        &["ID", "TITLE", "CATEGORY", "STATUS", "VIEWS", "HELPFUL", "TAGS"];
    const EXPORT_HEADERS: &'static [&'static str] = &[
        "id",
        "title",
        "category",
        "author",
        "status",
        "views",
        "helpful_count",
        "not_helpful_count",
        "read_time_minutes",
        "tags",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            self.category.clone(),
            status_cell(self.status.as_str(), self.deleted_at.is_some()),
            self.views.to_string(),
            format!(
                "{}%",
                helpful_rate(self.helpful_count, self.not_helpful_count)
            ),
            self.tags.join(", "),
        ]
    }

    fn export_cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            self.category.clone(),
            self.author.clone(),
            self.status.as_str().to_owned(),
            self.views.to_string(),
            self.helpful_count.to_string(),
            self.not_helpful_count.to_string(),
            self.read_time_minutes.to_string(),
            self.tags.join(", "),
        ]
    }

    fn stats_lines(stats: &ArticleStats) -> Vec<String> {
        let mut summary = format!(
            "views {} | helpful {}% | needs attention {}",
            stats.total_views, stats.helpful_rate, stats.needs_attention
        );
        if let Some(tag) = &stats.top_tag {
            summary.push_str(&format!(" | top tag {tag}"));
        }
        vec![
            format!("total {} | {}", stats.total, breakdown(&stats.by_status)),
            summary,
        ]
    }

    fn measure_label(sum: i64) -> String {
        format!("{sum} views")
    }
}

impl TableRecord for Skill {
    const HEADERS: &'static [&'static str] =
        &["ID", "NAME", "CATEGORY", "LEVEL", "YEARS", "ENDORSEMENTS"];
    const EXPORT_HEADERS: &'static [&'static str] = &[
        "id",
        "name",
        "category",
        "level",
        "years_of_experience",
        "endorsements",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.category.clone(),
            status_cell(self.level.as_str(), self.deleted_at.is_some()),
            self.years_of_experience.to_string(),
            self.endorsements.to_string(),
        ]
    }

    fn export_cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.category.clone(),
            self.level.as_str().to_owned(),
            self.years_of_experience.to_string(),
            self.endorsements.to_string(),
        ]
    }

    fn stats_lines(stats: &SkillStats) -> Vec<String> {
        vec![
            format!("total {} | {}", stats.total, breakdown(&stats.by_level)),
            format!(
                "endorsements {} | top skills {} | categories {}",
                stats.total_endorsements,
                stats.top_skills,
                // skip the leading "all" choice
                stats
                    .categories
                    .iter()
                    .skip(1)
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ]
    }

    fn measure_label(sum: i64) -> String {
        format!("{sum} endorsements")
    }
}

pub fn render_text<R>(view: &DerivedView<'_, R>, notice: Option<&str>, limit: usize) -> String
where
    R: TableRecord,
    R::Stats: Serialize,
{
    let mut out = String::new();
    out.push_str(R::PAGE.label());
    out.push_str("\n\n");

    if view.rows.is_empty() {
        out.push_str(&format!("no {} match the current filters\n", R::PAGE.as_str()));
    } else {
        let rows: Vec<Vec<String>> = view
            .rows
            .iter()
            .take(limit)
            .map(|row| {
                row.cells()
                    .iter()
                    .map(|cell| truncate_label(cell, MAX_CELL_CHARS))
                    .collect()
            })
            .collect();
        out.push_str(&format_table(R::HEADERS, &rows));
        let hidden = view.rows.len().saturating_sub(limit);
        if hidden > 0 {
            out.push_str(&format!("… {hidden} more\n"));
        }
    }

    out.push('\n');
    out.push_str(&filtered_line::<R>(view.filtered));
    out.push('\n');
    for line in R::stats_lines(&view.stats) {
        out.push_str(&line);
        out.push('\n');
    }
    if let Some(notice) = notice {
        out.push_str(notice);
        out.push('\n');
    }
    out
}

#[derive(Serialize)]
struct JsonView<'v, R, S> {
    page: PageKind,
    rows: &'v [&'v R],
    stats: &'v S,
    filtered: FilteredSummary,
    notice: Option<&'v str>,
}

pub fn render_json<R>(view: &DerivedView<'_, R>, notice: Option<&str>) -> Result<String>
where
    R: TableRecord,
    R::Stats: Serialize,
{
    let payload = JsonView {
        page: R::PAGE,
        rows: &view.rows,
        stats: &view.stats,
        filtered: view.filtered,
        notice,
    };
    serde_json::to_string_pretty(&payload)
        .with_context(|| format!("encode {} view as JSON", R::PAGE.as_str()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// The filtered, sorted rows only. Stats and notices stay out of exports.
pub fn render_export<R>(view: &DerivedView<'_, R>, format: ExportFormat) -> Result<String>
where
    R: TableRecord,
    R::Stats: Serialize,
{
    match format {
        ExportFormat::Json => serde_json::to_string_pretty(&view.rows)
            .map(|mut json| {
                json.push('\n');
                json
            })
            .with_context(|| format!("export {} as JSON", R::PAGE.as_str())),
        ExportFormat::Csv => {
            let mut out = csv_line(R::EXPORT_HEADERS.iter().copied());
            for row in &view.rows {
                let cells = row.export_cells();
                out.push_str(&csv_line(cells.iter().map(String::as_str)));
            }
            Ok(out)
        }
    }
}

fn csv_line<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let mut line = fields.map(escape_csv).collect::<Vec<_>>().join(",");
    line.push_str("\r\n");
    line
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn filtered_line<R>(filtered: FilteredSummary) -> String
where
    R: TableRecord,
    R::Stats: Serialize,
{
    format!(
        "showing {} | sum {}",
        filtered.count,
        R::measure_label(filtered.measure_sum)
    )
}

fn status_cell(status: &str, deleted: bool) -> String {
    if deleted {
        format!("{status} (deleted)")
    } else {
        status.to_owned()
    }
}

fn breakdown(counts: &std::collections::BTreeMap<&'static str, usize>) -> String {
    counts
        .iter()
        .map(|(status, count)| format!("{status} {count}"))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header_cells: Vec<String> = headers.iter().map(|header| (*header).to_owned()).collect();
    push_row(&mut out, &header_cells, &widths);
    for row in rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String], widths: &[usize]) {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(line.trim_end());
    out.push('\n');
}

fn truncate_label(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}…")
    } else {
        truncated
    }
}
