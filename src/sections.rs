//! Markdown body sections of a work-effort document.
//!
//! A document body is organized under fixed `## ` headings. The `Tasks`
//! section holds checklist items; the `Linked Items` section holds
//! `[[Title]]` references consumed by the relationship tracer.

use regex::Regex;
use std::collections::BTreeMap;

pub const OBJECTIVES: &str = "Objectives";
pub const TASKS: &str = "Tasks";
pub const NOTES: &str = "Notes";
pub const ISSUES: &str = "Issues Encountered";
pub const OUTCOMES: &str = "Outcomes & Results";
pub const LINKED_ITEMS: &str = "Linked Items";
pub const TIMELINE: &str = "Timeline & Progress";

/// The standard sections of a work-effort document, in document order.
pub const STANDARD: [&str; 7] = [
    OBJECTIVES,
    TASKS,
    NOTES,
    ISSUES,
    OUTCOMES,
    LINKED_ITEMS,
    TIMELINE,
];

/// A single `- [ ]` / `- [x]` checklist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub text: String,
    pub done: bool,
}

/// Split a body into `## `-headed sections. Content before the first heading
/// is ignored; heading names are keys, trimmed content is the value.
pub fn parse_sections(body: &str) -> BTreeMap<String, String> {
    let mut sections = BTreeMap::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in body.lines() {
        if let Some(name) = line.strip_prefix("## ") {
            if let Some((key, lines)) = current.take() {
                sections.insert(key, lines.join("\n").trim().to_string());
            }
            current = Some((name.trim().to_string(), Vec::new()));
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }

    if let Some((key, lines)) = current {
        sections.insert(key, lines.join("\n").trim().to_string());
    }

    sections
}

/// Replace the content of one `## ` section, leaving the rest of the body
/// untouched. A missing section leaves the body unchanged.
pub fn with_section(body: &str, name: &str, content: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut in_target = false;
    let mut replaced = false;

    for line in body.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if in_target {
                in_target = false;
            }
            if heading.trim() == name {
                in_target = true;
                replaced = true;
                out.push(line.to_string());
                out.push(String::new());
                out.push(content.trim_end().to_string());
                out.push(String::new());
                continue;
            }
        }
        if !in_target {
            out.push(line.to_string());
        }
    }

    if !replaced {
        return body.to_string();
    }

    let mut result = out.join("\n");
    if body.ends_with('\n') && !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Parse checklist items from a section's content.
pub fn parse_checklist(content: &str) -> Vec<ChecklistItem> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (done, rest) = if let Some(rest) = line.strip_prefix("- [ ]") {
                (false, rest)
            } else if let Some(rest) = line.strip_prefix("- [x]") {
                (true, rest)
            } else if let Some(rest) = line.strip_prefix("- [X]") {
                (true, rest)
            } else {
                return None;
            };
            Some(ChecklistItem {
                text: rest.trim().to_string(),
                done,
            })
        })
        .collect()
}

/// Extract `[[Title]]` references, in order of first occurrence, de-duplicated.
pub fn linked_titles(text: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"\[\[([^\[\]]+)\]\]") else {
        return Vec::new();
    };

    let mut seen = Vec::new();
    for caps in re.captures_iter(text) {
        let title = caps[1].trim().to_string();
        if !title.is_empty() && !seen.contains(&title) {
            seen.push(title);
        }
    }
    seen
}
