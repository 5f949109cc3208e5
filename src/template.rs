//! Document template rendering.
//!
//! New work efforts are rendered from a template containing `{{field}}`
//! placeholders. An external template file can be configured; when it is
//! absent or unreadable the built-in default below is used instead.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_TEMPLATE: &str = r#"---
title: "{{title}}"
status: "{{status}}" # options: active, paused, completed, archived
priority: "{{priority}}" # options: low, medium, high, critical
assignee: "{{assignee}}"
created: "{{created}}" # YYYY-MM-DD HH:mm
last_updated: "{{last_updated}}" # YYYY-MM-DD HH:mm
due_date: "{{due_date}}" # YYYY-MM-DD
tags: {{tags}}
---

# {{title}}

## Objectives
- Clearly define goals for this work effort.

## Tasks
- [ ] Outline the first concrete step
- [ ] Document any blockers

## Notes
- Context, links to relevant code, and decisions go here.

## Issues Encountered

## Outcomes & Results

## Linked Items

## Timeline & Progress
- Started: {{created}}
- Target completion: {{due_date}}
"#;

/// Substitute every `{{key}}` placeholder. Unknown placeholders are left
/// in place; substitution is a plain string replace, values are not escaped.
pub fn render(template: &str, values: &BTreeMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        out = out.replace(&format!("{{{{{}}}}}", key), value);
    }
    out
}

/// Bracket-list rendering of tags, matching what the frontmatter parser
/// accepts: `[a, b, c]`, or `[]` when empty.
pub fn render_tags(tags: &[String]) -> String {
    format!("[{}]", tags.join(", "))
}

/// Load the template from `path` when configured and readable, falling back
/// to the built-in default otherwise.
pub fn load(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return DEFAULT_TEMPLATE.to_string();
    };

    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(
                "Failed to read template {}, using built-in default: {}",
                path.display(),
                e
            );
            DEFAULT_TEMPLATE.to_string()
        }
    }
}
