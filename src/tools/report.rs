//! Text report rendering for tool results.
//!
//! Reports are Markdown-ish: a title, the query context, a count line and one
//! `###` section per displayed row. Row headings and labelled field lines are
//! small templates where `{a|b}` expands to the first non-empty of the record
//! fields `a`, `b`.

use std::fmt::Write as _;

use serde_json::Value;

use super::{QueryArgs, SourceChoice};
use crate::tushare::Record;

/// Layout of one tool's report.
#[derive(Debug, Clone)]
pub struct ReportTemplate {
    /// Report title, without the leading marker.
    pub title: &'static str,
    /// How the query context and counts are presented.
    pub conditions: Conditions,
    /// Heading template for each row.
    pub heading: &'static str,
    /// Which fields of each row are printed.
    pub body: Body,
}

/// Query-context block printed above the rows.
#[derive(Debug, Clone)]
pub enum Conditions {
    /// Only the count line.
    Plain,
    /// `查询条件：<subject> <period>` followed by extra argument notes.
    Query {
        /// Arguments tried in order for the subject.
        subject: &'static [&'static str],
        /// Subject shown when none of them is given.
        fallback: &'static str,
        /// Further arguments echoed on their own line when given.
        notes: &'static [ArgLabel],
    },
    /// Echo the first given lookup key with a key-specific count label.
    Lookup {
        /// Keys tried in order.
        keys: &'static [LookupKey],
        /// Description and count label when no key is given.
        otherwise: (&'static str, &'static str),
    },
    /// Echo every given argument, then a single count line.
    Echo {
        /// Arguments echoed when given.
        args: &'static [ArgLabel],
        /// Count label.
        count_label: &'static str,
    },
}

/// An argument name with its display label.
#[derive(Debug, Clone, Copy)]
pub struct ArgLabel {
    /// Argument name.
    pub arg: &'static str,
    /// Display label.
    pub label: &'static str,
}

/// A membership lookup direction.
#[derive(Debug, Clone, Copy)]
pub struct LookupKey {
    /// Argument name.
    pub arg: &'static str,
    /// Display label for the argument value.
    pub label: &'static str,
    /// Label for the row count in this direction.
    pub count_label: &'static str,
}

/// Row body layout.
#[derive(Debug, Clone)]
pub enum Body {
    /// Every field in upstream column order.
    AllFields,
    /// A fixed list of labelled template lines.
    Lines(&'static [Line]),
}

/// One labelled line of a row body.
#[derive(Debug, Clone, Copy)]
pub struct Line {
    /// Display label.
    pub label: &'static str,
    /// Value template.
    pub template: &'static str,
    /// Skip the line when none of its fields has a value.
    pub optional: bool,
}

impl Line {
    /// A line that is always printed.
    #[must_use]
    pub const fn new(label: &'static str, template: &'static str) -> Self {
        Self {
            label,
            template,
            optional: false,
        }
    }

    /// A line printed only when one of its fields has a value.
    #[must_use]
    pub const fn optional(label: &'static str, template: &'static str) -> Self {
        Self {
            label,
            template,
            optional: true,
        }
    }
}

/// Renders a successful query as report text.
///
/// At most `cap` rows are rendered; the count lines always state the full
/// number of rows returned.
#[must_use]
pub fn render(
    template: &ReportTemplate,
    args: &QueryArgs,
    source: Option<&SourceChoice>,
    rows: &[Record],
    cap: usize,
) -> String {
    let mut out = format!("📊 {}\n\n", template.title);

    if let Some(source) = source {
        let _ = writeln!(out, "数据源：{}", source.label);
    }

    if rows.is_empty() {
        if source.is_some() {
            out.push('\n');
        }
        out.push_str("暂无数据");
        return out;
    }

    let total = rows.len();
    let shown = total.min(cap);

    match &template.conditions {
        Conditions::Plain => {
            if source.is_some() {
                out.push('\n');
            }
            push_total_line(&mut out, total, shown);
        }
        Conditions::Query {
            subject,
            fallback,
            notes,
        } => {
            let subject = first_arg(args, subject).unwrap_or(*fallback);
            let condition = format!("{subject} {}", period(args));
            let _ = writeln!(out, "查询条件：{}", condition.trim_end());
            for note in *notes {
                if let Some(value) = args.get(note.arg) {
                    let _ = writeln!(out, "{}：{value}", note.label);
                }
            }
            out.push('\n');
            push_total_line(&mut out, total, shown);
        }
        Conditions::Lookup { keys, otherwise } => {
            match keys
                .iter()
                .find_map(|key| args.get(key.arg).map(|value| (key, value)))
            {
                Some((key, value)) => {
                    let _ = writeln!(out, "{}：{value}", key.label);
                    let _ = write!(out, "{}：{total}\n\n", key.count_label);
                }
                None => {
                    let _ = writeln!(out, "{}", otherwise.0);
                    let _ = write!(out, "{}：{total}\n\n", otherwise.1);
                }
            }
            let _ = write!(out, "显示前 {shown} 条：\n\n");
        }
        Conditions::Echo { args: echoed, count_label } => {
            for echo in *echoed {
                if let Some(value) = args.get(echo.arg) {
                    let _ = writeln!(out, "{}：{value}", echo.label);
                }
            }
            let _ = write!(out, "{count_label}：{total}\n\n显示前 {shown} 条：\n\n");
        }
    }

    for (index, row) in rows.iter().take(cap).enumerate() {
        let (heading, _) = fill(template.heading, row, "");
        let _ = writeln!(out, "### {}. {}", index + 1, heading.trim());

        match &template.body {
            Body::AllFields => {
                for (key, value) in row {
                    let value = scalar_text(value).unwrap_or_else(|| "-".to_string());
                    let _ = writeln!(out, "- **{key}**: {value}");
                }
            }
            Body::Lines(lines) => {
                for line in *lines {
                    let (text, found) = fill(line.template, row, "-");
                    if line.optional && !found {
                        continue;
                    }
                    let _ = writeln!(out, "- **{}**: {text}", line.label);
                }
            }
        }
        out.push('\n');
    }

    out
}

/// Renders a failed query as diagnostic text with a checklist.
#[must_use]
pub fn render_failure(message: &str, hints: &[&str]) -> String {
    let mut out = format!("❌ 查询失败\n\n错误信息：{message}");
    if !hints.is_empty() {
        out.push_str("\n\n请检查：");
        for (index, hint) in hints.iter().enumerate() {
            let _ = write!(out, "\n{}. {hint}", index + 1);
        }
    }
    out
}

fn push_total_line(out: &mut String, total: usize, shown: usize) {
    let _ = write!(out, "共 {total} 条数据，显示前 {shown} 条：\n\n");
}

fn first_arg<'a>(args: &'a QueryArgs, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| args.get(*name).map(String::as_str))
}

/// A single trade date, else a `start~end` range, else nothing.
fn period(args: &QueryArgs) -> String {
    if let Some(date) = args.get("trade_date") {
        return date.clone();
    }
    let start = args.get("start_date").map_or("", String::as_str);
    let end = args.get("end_date").map_or("", String::as_str);
    if start.is_empty() && end.is_empty() {
        String::new()
    } else {
        format!("{start}~{end}")
    }
}

/// Expands `{a|b}` placeholders from `record`.
///
/// Returns the text and whether any placeholder found a value.
fn fill(template: &str, record: &Record, missing: &str) -> (String, bool) {
    let mut out = String::with_capacity(template.len());
    let mut found = false;
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return (out, found);
        };

        let value = after[..end]
            .split('|')
            .find_map(|key| record.get(key).and_then(scalar_text));
        match value {
            Some(value) => {
                found = true;
                out.push_str(&value);
            }
            None => out.push_str(missing),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    (out, found)
}

/// Display text of a scalar; `None` for null and empty strings.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
