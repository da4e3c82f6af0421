//! Change report aggregation and rendering.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diff::{DiffResult, LineTag};
use crate::model::{EntryStatus, ReportEntry};
use crate::util::write_atomic;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output document format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Markdown,
    Html,
}

/// Accumulates [`ReportEntry`]s and renders them into one document.
#[derive(Debug, Clone)]
pub struct Reporter {
    format: ReportFormat,
    entries: Vec<ReportEntry>,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    /// Entries in recording order.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn change_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Changed)
            .count()
    }

    /// Renders the document. Depends only on the recorded entries and `generated_at`.
    pub fn render(&self, generated_at: DateTime<Utc>) -> String {
        let stats = Stats::of(&self.entries);
        match self.format {
            ReportFormat::Markdown => render_markdown(&self.entries, &stats, generated_at),
            ReportFormat::Html => render_html(&self.entries, &stats, generated_at),
        }
    }

    /// Renders and replaces the file at `path`.
    pub fn write(&self, path: &Path, generated_at: DateTime<Utc>) -> std::io::Result<()> {
        write_atomic(path, self.render(generated_at).as_bytes())
    }
}

struct Stats {
    targets: usize,
    changes: usize,
    last_check: Option<DateTime<Utc>>,
}

impl Stats {
    fn of(entries: &[ReportEntry]) -> Self {
        let targets: HashSet<&str> = entries.iter().map(|e| e.target_id.as_str()).collect();
        Self {
            targets: targets.len(),
            changes: entries
                .iter()
                .filter(|e| e.status == EntryStatus::Changed)
                .count(),
            last_check: entries.iter().map(|e| e.timestamp).max(),
        }
    }

    fn last_check(&self) -> String {
        self.last_check
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// `+ `, `- ` or two spaces, then the text.
pub fn diff_block_lines(diff: &DiffResult) -> Vec<String> {
    diff.context_window_lines
        .iter()
        .map(|w| format!("{} {}", w.tag.marker(), w.text))
        .collect()
}

fn render_markdown(entries: &[ReportEntry], stats: &Stats, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# JSWatch Report");
    let _ = writeln!(out, "Generated on: {}", generated_at.format(TIME_FORMAT));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Targets monitored: {} | Changes detected: {} | Last check: {}",
        stats.targets,
        stats.changes,
        stats.last_check()
    );
    let _ = writeln!(out);

    for entry in entries.iter().rev() {
        let _ = writeln!(out, "## {}", entry.target_id);
        let _ = writeln!(out, "URL: {}", entry.source_url);
        let _ = writeln!(out, "Status: {}", entry.status.label());
        let _ = writeln!(out, "Time: {}", entry.timestamp.format(TIME_FORMAT));
        if let Some(diff) = &entry.diff {
            let _ = writeln!(out, "\n```diff");
            for line in diff_block_lines(diff) {
                let _ = writeln!(out, "{line}");
            }
            let _ = writeln!(out, "```");
        }
        let _ = writeln!(out, "\n---\n");
    }
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn diff_html(diff: Option<&DiffResult>) -> String {
    let Some(diff) = diff else {
        return r#"<div class="no-changes">No changes detected</div>"#.to_string();
    };
    let mut out = String::from(r#"<div class="diff-container"><code class="diff">"#);
    for w in &diff.context_window_lines {
        let class = match w.tag {
            LineTag::Added => "diff-add",
            LineTag::Removed => "diff-remove",
            LineTag::Context => "diff-context",
        };
        let _ = write!(
            out,
            r#"<div class="diff-line {class}">{} {}</div>"#,
            w.tag.marker(),
            escape_html(&w.text)
        );
    }
    out.push_str("</code></div>");
    out
}

const STYLE: &str = r#"
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; margin: 0; padding: 20px; background: #f5f5f5; color: #333; }
        .container { max-width: 1200px; margin: 0 auto; background: white; padding: 20px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
        .header { margin-bottom: 30px; padding-bottom: 20px; border-bottom: 1px solid #eee; }
        .stats { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 20px; margin-bottom: 30px; }
        .stat-card { background: #f8fafc; padding: 15px; border-radius: 6px; border: 1px solid #e2e8f0; }
        .stat-card h3 { margin: 0 0 10px 0; font-size: 14px; text-transform: uppercase; color: #64748b; }
        .stat-card p { margin: 0; font-size: 24px; font-weight: 600; color: #1e293b; }
        .report-item { border: 1px solid #e2e8f0; border-radius: 6px; margin-bottom: 20px; overflow: hidden; }
        .report-header { background: #f8fafc; padding: 15px; display: flex; justify-content: space-between; align-items: center; border-bottom: 1px solid #e2e8f0; }
        .report-header h3 { margin: 0; font-size: 16px; color: #1e293b; }
        .report-meta { padding: 10px 15px; color: #64748b; font-size: 14px; border-bottom: 1px solid #e2e8f0; }
        .badge { padding: 4px 8px; border-radius: 4px; font-size: 12px; font-weight: 500; }
        .badge-changed { background: #fff7ed; color: #c2410c; }
        .badge-unchanged { background: #f0fdf4; color: #15803d; }
        .badge-initial { background: #eff6ff; color: #1d4ed8; }
        .diff-container { padding: 15px; background: #f8fafc; overflow-x: auto; }
        .diff { font-family: monospace; white-space: pre; margin: 0; font-size: 14px; }
        .diff-line { padding: 2px 0; }
        .diff-add { background: #dcfce7; color: #166534; }
        .diff-remove { background: #fee2e2; color: #991b1b; }
        .diff-context { color: #64748b; }
        .no-changes { padding: 20px; text-align: center; color: #64748b; }
"#;

fn render_html(entries: &[ReportEntry], stats: &Stats, generated_at: DateTime<Utc>) -> String {
    let mut items = String::new();
    for entry in entries.iter().rev() {
        let _ = write!(
            items,
            r#"
            <div class="report-item">
                <div class="report-header">
                    <h3>{id}</h3>
                    <span class="badge badge-{class}">{label}</span>
                </div>
                <div class="report-meta">
                    <span>{url}</span><br>
                    <span>{time}</span>
                </div>
                {diff}
            </div>"#,
            id = escape_html(&entry.target_id),
            class = entry.status.css_class(),
            label = entry.status.label(),
            url = escape_html(&entry.source_url),
            time = entry.timestamp.format(TIME_FORMAT),
            diff = diff_html(entry.diff.as_ref()),
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>JSWatch Report</title>
    <style>{STYLE}    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>JSWatch Report</h1>
            <p>Generated on: {generated}</p>
        </div>
        <div class="stats">
            <div class="stat-card"><h3>Targets Monitored</h3><p>{targets}</p></div>
            <div class="stat-card"><h3>Changes Detected</h3><p>{changes}</p></div>
            <div class="stat-card"><h3>Last Check</h3><p>{last}</p></div>
        </div>
        <div class="reports">{items}
        </div>
    </div>
</body>
</html>
"#,
        generated = generated_at.format(TIME_FORMAT),
        targets = stats.targets,
        changes = stats.changes,
        last = stats.last_check(),
    )
}
