//! Frontmatter parsing with graceful degradation.
//!
//! Work-effort documents start with a `---`-delimited block of `key: value`
//! lines. Documents in the wild are messy, so parsing runs through a chain of
//! strategies and never fails outright:
//!
//! 1. strict: a leading delimited block with one `key: value` pair per line
//!    (trailing `# comment` stripped, quotes stripped, bracket-list `tags`);
//! 2. permissive: regex extraction of well-known fields scattered anywhere in
//!    the text, used when the strict pass yields neither `id` nor `title`;
//! 3. derivation: a missing title is taken from the first top-level heading,
//!    else from the filename.
//!
//! The returned document always carries `id`, `title`, `status`, `created_at`
//! and `updated_at`. Unknown keys are preserved verbatim; malformed date
//! values are kept as raw strings (validation is a caller concern).

use regex::Regex;
use std::collections::BTreeMap;

pub const DELIMITER: &str = "---";

/// A parsed document: flat metadata plus the markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub fields: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub body: String,
}

/// Parse `raw` into metadata and body. `filename` (if known) feeds title
/// derivation; `now` supplies defaults for missing timestamps.
pub fn parse(raw: &str, filename: Option<&str>, now: &str) -> Document {
    let mut fields = BTreeMap::new();
    let mut tags = Vec::new();

    let body = match parse_strict(raw, &mut fields, &mut tags) {
        Some(body) => body,
        None => raw.to_string(),
    };

    if !fields.contains_key("id") && !fields.contains_key("title") {
        extract_scattered_fields(raw, &mut fields);

        if tags.is_empty()
            && let Some(list) = fields.remove("tags")
        {
            tags = parse_bracket_list(&list);
        }
    }

    if !fields.contains_key("title") {
        let title = title_from_heading(&body)
            .or_else(|| filename.map(title_from_filename))
            .unwrap_or_else(|| "Untitled".to_string());
        fields.insert("title".to_string(), title);
    }

    if !fields.contains_key("id") {
        // Ids derive from the filename when one is known; a filename-less
        // parse falls back to timestamp + slug, anchored on the document's
        // creation time where available so the id is stable across parses.
        let id = filename
            .map(|name| name.strip_suffix(".md").unwrap_or(name).to_string())
            .unwrap_or_else(|| {
                let stamp = fields
                    .get("created")
                    .or_else(|| fields.get("created_at"))
                    .map(String::as_str)
                    .unwrap_or(now);
                generate_id(stamp, &fields["title"])
            });
        fields.insert("id".to_string(), id);
    }

    fields
        .entry("status".to_string())
        .or_insert_with(|| "active".to_string());
    fields
        .entry("created_at".to_string())
        .or_insert_with(|| now.to_string());
    fields
        .entry("updated_at".to_string())
        .or_insert_with(|| now.to_string());

    Document { fields, tags, body }
}

/// Strategy 1: a leading `---` block with a matching closing delimiter.
/// Returns the body on success, populating `fields`/`tags` in place.
fn parse_strict(
    raw: &str,
    fields: &mut BTreeMap<String, String>,
    tags: &mut Vec<String>,
) -> Option<String> {
    let mut lines = raw.lines();

    if lines.next().map(str::trim_end) != Some(DELIMITER) {
        return None;
    }

    let mut block = Vec::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if line.trim_end() == DELIMITER {
            closed = true;
            break;
        }
        block.push(line);
    }
    if !closed {
        return None;
    }

    for line in block {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.starts_with('#') {
            continue;
        }

        let value = strip_quotes(strip_comment(value).trim());
        if key == "tags" && value.starts_with('[') {
            *tags = parse_bracket_list(&value);
        } else {
            fields.insert(key.to_string(), value);
        }
    }

    let body: String = lines.collect::<Vec<_>>().join("\n");
    Some(body.trim_start_matches('\n').to_string())
}

/// Strategy 2: regex extraction of well-known fields from anywhere in the
/// text. Only fills keys the strict pass did not produce.
fn extract_scattered_fields(raw: &str, fields: &mut BTreeMap<String, String>) {
    let patterns: [(&str, &str); 6] = [
        ("status", r#"(?m)^\s*status:\s*["']?([A-Za-z_-]+)"#),
        ("priority", r#"(?m)^\s*priority:\s*["']?([A-Za-z_-]+)"#),
        ("assignee", r#"(?m)^\s*assignee:\s*["']?([^"'#\n]+)"#),
        (
            "due_date",
            r#"(?m)^\s*(?:due|due_date):\s*["']?(\d{4}-\d{2}-\d{2}|None)"#,
        ),
        ("tags", r#"(?m)^\s*tags:\s*(\[[^\]]*\])"#),
        ("depends_on", r#"(?m)^\s*depends_on:\s*["']?([^"'#\n]+)"#),
    ];

    for (key, pattern) in patterns {
        if fields.contains_key(key) {
            continue;
        }
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(caps) = re.captures(raw)
            && let Some(m) = caps.get(1)
        {
            fields.insert(key.to_string(), m.as_str().trim().to_string());
        }
    }
}

/// Strip a trailing `# comment` that is not inside quotes.
fn strip_comment(value: &str) -> &str {
    let mut in_quotes = false;
    let mut prev_is_space = true;
    for (i, c) in value.char_indices() {
        match c {
            '"' | '\'' => in_quotes = !in_quotes,
            '#' if !in_quotes && prev_is_space => return &value[..i],
            _ => {}
        }
        prev_is_space = c.is_whitespace();
    }
    value
}

fn strip_quotes(value: &str) -> String {
    let v = value.trim();
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        v[1..v.len() - 1].to_string()
    } else {
        v.to_string()
    }
}

fn parse_bracket_list(value: &str) -> Vec<String> {
    value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|t| strip_quotes(t.trim()))
        .filter(|t| !t.is_empty())
        .collect()
}

fn title_from_heading(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        line.strip_prefix("# ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

/// Derive a title from a filename: extension and numeric prefix stripped,
/// separators converted to spaces, words title-cased.
fn title_from_filename(name: &str) -> String {
    let stem = name.strip_suffix(".md").unwrap_or(name);
    let stem = stem.trim_start_matches(|c: char| c.is_ascii_digit());
    let stem = stem.trim_start_matches(['_', '-']);

    stem.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generated ids follow the legacy timestamp numbering plus a title slug.
fn generate_id(stamp: &str, title: &str) -> String {
    let stamp = crate::timefmt::compact(stamp);
    let slug = slugify(title);
    if slug.is_empty() {
        stamp
    } else {
        format!("{}_{}", stamp, slug)
    }
}

/// Lowercased, underscore-separated, ascii-alphanumeric rendering of a title.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut last_was_sep = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    slug.trim_end_matches('_').to_string()
}
